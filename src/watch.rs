//! Completion watchers.
//!
//! Both watchers consume a [`Subscription`] until a condition holds and then
//! drop it, which stops the backend from polling.

use futures_util::StreamExt;
use tracing::debug;

use crate::config::{CompletionStrategy, EmbedConfig};
use crate::error::TerminalError;
use crate::terminal::{SessionId, Subscription};

/// Decides from a stream of foreground job names when the work in a
/// session is done.
pub trait CompletionDetector: Send {
    /// Feed the next observed job name; `true` means done.
    fn observe(&mut self, job_name: &str) -> bool;
}

/// Done as soon as the foreground job is an interactive shell.
#[derive(Debug, Clone)]
pub struct ShellPrompt {
    shells: Vec<String>,
}

impl ShellPrompt {
    pub fn new<I, S>(shells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            shells: shells.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_shell(&self, job_name: &str) -> bool {
        // Login shells show up as "-zsh".
        let name = job_name.strip_prefix('-').unwrap_or(job_name);
        self.shells.iter().any(|shell| shell == name)
    }
}

impl Default for ShellPrompt {
    fn default() -> Self {
        Self::new(["bash", "zsh"])
    }
}

impl CompletionDetector for ShellPrompt {
    fn observe(&mut self, job_name: &str) -> bool {
        self.is_shell(job_name)
    }
}

/// macOS reports process names cut to 16 bytes (`MAXCOMLEN` in `p_comm`).
/// tmux on Linux reads the full command line, so names arrive whole there.
const COMM_LEN: usize = 16;

/// Done when the shell comes back after `program` was seen running.
///
/// Short-lived commands typed before the program (`clear`) cannot end the
/// wait early.
#[derive(Debug, Clone)]
pub struct ProgramExit {
    program: String,
    prompt: ShellPrompt,
    seen_program: bool,
}

impl ProgramExit {
    pub fn new(program: impl Into<String>, prompt: ShellPrompt) -> Self {
        Self {
            program: program.into(),
            prompt,
            seen_program: false,
        }
    }

    fn is_program(&self, job_name: &str) -> bool {
        job_name == self.program
            || (job_name.len() == COMM_LEN && self.program.starts_with(job_name))
    }
}

impl CompletionDetector for ProgramExit {
    fn observe(&mut self, job_name: &str) -> bool {
        if self.is_program(job_name) {
            self.seen_program = true;
            return false;
        }
        self.seen_program && self.prompt.is_shell(job_name)
    }
}

/// Build the configured detector. `program` is the name the re-invoked tool
/// runs under.
pub fn detector_for(config: &EmbedConfig, program: &str) -> Box<dyn CompletionDetector> {
    let prompt = ShellPrompt::new(config.shells.iter().cloned());
    match config.completion {
        CompletionStrategy::ShellPrompt => Box::new(prompt),
        CompletionStrategy::ProgramExit => Box::new(ProgramExit::new(program, prompt)),
    }
}

/// Wait until `detector` accepts a job name; returns that name.
pub async fn wait_for_job_completion(
    mut jobs: Subscription<String>,
    detector: &mut dyn CompletionDetector,
) -> Result<String, TerminalError> {
    while let Some(job) = jobs.next().await {
        let job = job?;
        debug!(%job, "foreground job changed");
        if detector.observe(&job) {
            return Ok(job);
        }
    }
    Err(TerminalError::SubscriptionClosed("job name"))
}

/// Wait until `session` is reported as terminated.
pub async fn wait_for_termination(
    mut terminations: Subscription<SessionId>,
    session: &SessionId,
) -> Result<(), TerminalError> {
    while let Some(terminated) = terminations.next().await {
        let terminated = terminated?;
        debug!(%terminated, target = %session, "session terminated");
        if &terminated == session {
            return Ok(());
        }
    }
    Err(TerminalError::SubscriptionClosed("termination"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_job_watcher_resolves_on_shell() {
        let jobs = Subscription::from_values(["node", "myscript", "bash"].map(String::from));
        let mut detector = ShellPrompt::default();
        let job = wait_for_job_completion(jobs, &mut detector).await.unwrap();
        assert_eq!(job, "bash");
    }

    #[tokio::test]
    async fn test_job_watcher_ignores_non_shells() {
        let jobs = Subscription::from_values(["node", "myscript"].map(String::from));
        let mut detector = ShellPrompt::default();
        let err = wait_for_job_completion(jobs, &mut detector)
            .await
            .unwrap_err();
        assert!(matches!(err, TerminalError::SubscriptionClosed(_)));
    }

    #[tokio::test]
    async fn test_job_watcher_propagates_errors() {
        let (tx, jobs) = Subscription::channel(2);
        tx.send(Ok("vim".to_string())).await.unwrap();
        tx.send(Err(TerminalError::NotAttached("tmux"))).await.unwrap();
        let mut detector = ShellPrompt::default();
        let err = wait_for_job_completion(jobs, &mut detector)
            .await
            .unwrap_err();
        assert!(matches!(err, TerminalError::NotAttached(_)));
    }

    #[tokio::test]
    async fn test_termination_watcher_waits_for_target() {
        let (tx, terminations) = Subscription::channel(4);
        tx.send(Ok(SessionId::from("sess-A"))).await.unwrap();
        let target = SessionId::from("sess-B");

        let waiter =
            tokio::spawn(async move { wait_for_termination(terminations, &target).await });
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert!(!waiter.is_finished());

        tx.send(Ok(SessionId::from("sess-B"))).await.unwrap();
        waiter.await.unwrap().unwrap();
    }

    #[test]
    fn test_shell_prompt_accepts_login_shells() {
        let prompt = ShellPrompt::default();
        assert!(prompt.is_shell("zsh"));
        assert!(prompt.is_shell("-bash"));
        assert!(!prompt.is_shell("fish"));
        assert!(!prompt.is_shell("clear"));
    }

    #[test]
    fn test_program_exit_requires_program_first() {
        let mut detector = ProgramExit::new("cz-pane", ShellPrompt::default());
        assert!(!detector.observe("clear"));
        assert!(!detector.observe("bash"));
        assert!(!detector.observe("cz-pane"));
        assert!(detector.observe("bash"));
    }

    #[test]
    fn test_program_exit_matches_truncated_names() {
        let mut detector = ProgramExit::new("commit-questionnaire", ShellPrompt::default());
        assert!(!detector.observe("commit-questionn"));
        assert!(detector.observe("zsh"));
    }

    #[test]
    fn test_program_exit_ignores_shorter_prefixes() {
        let mut detector = ProgramExit::new("commit-questionnaire", ShellPrompt::default());
        assert!(!detector.observe("commit-question"));
        assert!(!detector.observe("zsh"));
    }

    #[test]
    fn test_detector_for_config() {
        let mut config = EmbedConfig::default();
        let mut detector = detector_for(&config, "cz-pane");
        assert!(detector.observe("zsh"));

        config.completion = CompletionStrategy::ProgramExit;
        let mut detector = detector_for(&config, "cz-pane");
        assert!(!detector.observe("zsh"));
    }
}
