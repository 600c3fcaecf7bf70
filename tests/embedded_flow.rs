//! Embedded mode against a recording terminal.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::{Arc, Mutex};

use cz_pane::config::EmbedConfig;
use cz_pane::driver::{drive_session, SessionPlan};
use cz_pane::embedded::run_embedded;
use cz_pane::error::TerminalError;
use cz_pane::terminal::{SessionId, Subscription, TerminalController};
use cz_pane::watch::{ProgramExit, ShellPrompt};

const CURRENT: &str = "%0";
const SPLIT: &str = "%7";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    CurrentSession,
    Split(String),
    Activate(String),
    Send(String, String),
    SubscribeJobName(String),
    SubscribeTerminations,
}

fn send(text: &str) -> Call {
    Call::Send(SPLIT.to_string(), text.to_string())
}

struct MockTerminal {
    calls: Mutex<Vec<Call>>,
    jobs: Mutex<Option<Subscription<String>>>,
    terminations: Mutex<Option<Subscription<SessionId>>>,
}

impl MockTerminal {
    fn new(jobs: Subscription<String>, terminations: Subscription<SessionId>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            jobs: Mutex::new(Some(jobs)),
            terminations: Mutex::new(Some(terminations)),
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn exit_sent(&self) -> bool {
        self.calls().contains(&send("exit\n"))
    }
}

#[async_trait]
impl TerminalController for MockTerminal {
    async fn current_session(&self) -> Result<SessionId, TerminalError> {
        self.record(Call::CurrentSession);
        Ok(SessionId::from(CURRENT))
    }

    async fn split_pane(&self, session: &SessionId) -> Result<SessionId, TerminalError> {
        self.record(Call::Split(session.to_string()));
        Ok(SessionId::from(SPLIT))
    }

    async fn activate(&self, session: &SessionId) -> Result<(), TerminalError> {
        self.record(Call::Activate(session.to_string()));
        Ok(())
    }

    async fn send_text(&self, session: &SessionId, text: &str) -> Result<(), TerminalError> {
        self.record(Call::Send(session.to_string(), text.to_string()));
        Ok(())
    }

    async fn subscribe_job_name(
        &self,
        session: &SessionId,
    ) -> Result<Subscription<String>, TerminalError> {
        self.record(Call::SubscribeJobName(session.to_string()));
        self.jobs
            .lock()
            .unwrap()
            .take()
            .ok_or(TerminalError::SubscriptionClosed("job name"))
    }

    async fn subscribe_terminations(&self) -> Result<Subscription<SessionId>, TerminalError> {
        self.record(Call::SubscribeTerminations);
        self.terminations
            .lock()
            .unwrap()
            .take()
            .ok_or(TerminalError::SubscriptionClosed("termination"))
    }
}

fn plan() -> SessionPlan {
    SessionPlan::new(Path::new("/repo"), &EmbedConfig::default(), "cz-pane")
}

/// Let spawned tasks run until they block.
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_driver_sends_lines_in_order() {
    let terminal = MockTerminal::new(
        Subscription::from_values(Vec::<String>::new()),
        Subscription::from_values(Vec::<SessionId>::new()),
    );

    drive_session(&terminal, &SessionId::from(SPLIT), &plan())
        .await
        .unwrap();

    assert_eq!(
        terminal.calls(),
        vec![
            Call::Activate(SPLIT.to_string()),
            send("cd '/repo'\n"),
            send(". '/repo/venv/bin/activate'\n"),
            send("clear\n"),
            send("'/repo/scripts/cz-pane' -n\n"),
        ]
    );
}

#[tokio::test]
async fn test_full_flow_call_order() {
    let terminal = MockTerminal::new(
        Subscription::from_values(["node", "myscript", "bash"].map(String::from)),
        Subscription::from_values([SessionId::from("%3"), SessionId::from(SPLIT)]),
    );

    let session = run_embedded(&terminal, &plan(), &mut ShellPrompt::default())
        .await
        .unwrap();

    assert_eq!(session, SessionId::from(SPLIT));
    assert_eq!(
        terminal.calls(),
        vec![
            Call::CurrentSession,
            Call::Split(CURRENT.to_string()),
            Call::Activate(SPLIT.to_string()),
            send("cd '/repo'\n"),
            send(". '/repo/venv/bin/activate'\n"),
            send("clear\n"),
            send("'/repo/scripts/cz-pane' -n\n"),
            Call::SubscribeJobName(SPLIT.to_string()),
            Call::SubscribeTerminations,
            send("exit\n"),
        ]
    );
}

#[tokio::test]
async fn test_exit_waits_for_job_completion() {
    let (job_tx, jobs) = Subscription::channel(4);
    let (term_tx, terminations) = Subscription::channel(4);
    let terminal = Arc::new(MockTerminal::new(jobs, terminations));

    let flow = {
        let terminal = Arc::clone(&terminal);
        tokio::spawn(async move {
            let mut detector = ShellPrompt::default();
            run_embedded(terminal.as_ref(), &plan(), &mut detector).await
        })
    };

    settle().await;
    assert!(terminal
        .calls()
        .contains(&Call::SubscribeJobName(SPLIT.to_string())));
    assert!(!terminal.exit_sent());

    job_tx.send(Ok("cz-pane".to_string())).await.unwrap();
    settle().await;
    assert!(!terminal.exit_sent());

    job_tx.send(Ok("zsh".to_string())).await.unwrap();
    settle().await;
    assert!(terminal.exit_sent());
    assert_eq!(terminal.calls().last(), Some(&send("exit\n")));

    term_tx.send(Ok(SessionId::from("%2"))).await.unwrap();
    settle().await;
    assert!(!flow.is_finished());

    term_tx.send(Ok(SessionId::from(SPLIT))).await.unwrap();
    let session = flow.await.unwrap().unwrap();
    assert_eq!(session, SessionId::from(SPLIT));
}

#[tokio::test]
async fn test_program_exit_ignores_early_prompt() {
    let terminal = MockTerminal::new(
        Subscription::from_values(["clear", "bash", "cz-pane", "bash"].map(String::from)),
        Subscription::from_values([SessionId::from(SPLIT)]),
    );
    let mut detector = ProgramExit::new("cz-pane", ShellPrompt::default());

    run_embedded(&terminal, &plan(), &mut detector).await.unwrap();

    assert_eq!(terminal.calls().last(), Some(&send("exit\n")));
}

#[tokio::test]
async fn test_job_stream_error_aborts_before_exit() {
    let (job_tx, jobs) = Subscription::channel(1);
    job_tx
        .send(Err(TerminalError::CommandFailed {
            command: "tmux display-message".to_string(),
            stderr: "can't find pane: %7".to_string(),
        }))
        .await
        .unwrap();
    let terminal = MockTerminal::new(jobs, Subscription::from_values([SessionId::from(SPLIT)]));

    let err = run_embedded(&terminal, &plan(), &mut ShellPrompt::default())
        .await
        .unwrap_err();

    assert!(format!("{:#}", err).contains("can't find pane"));
    assert!(!terminal.exit_sent());
    assert!(!terminal.calls().contains(&Call::SubscribeTerminations));
}

#[tokio::test]
async fn test_termination_stream_ending_is_an_error() {
    let terminal = MockTerminal::new(
        Subscription::from_values(["bash".to_string()]),
        Subscription::from_values([SessionId::from("%1")]),
    );

    let err = run_embedded(&terminal, &plan(), &mut ShellPrompt::default())
        .await
        .unwrap_err();

    assert!(format!("{:#}", err).contains("close"));
    assert!(terminal.exit_sent());
}
