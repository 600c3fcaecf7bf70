//! Session driver: prepares a freshly split pane and starts the questionnaire
//! in it.
//!
//! The lines are typed into the pane's shell one by one instead of as a
//! single compound command, so the working directory and activated
//! environment are still in effect when the tool re-invokes itself.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::EmbedConfig;
use crate::error::TerminalError;
use crate::terminal::{SessionId, TerminalController};

/// Flag that selects direct mode on re-invocation.
pub const DIRECT_FLAG: &str = "-n";

/// What to type into the new pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPlan {
    /// Working tree to `cd` into.
    pub workdir: PathBuf,
    /// Script sourced with `.`, if any.
    pub activate: Option<PathBuf>,
    /// This tool, at the location the new pane should run it from.
    pub self_invocation: PathBuf,
}

impl SessionPlan {
    /// Plan for `workdir`: `<workdir>/<activate>` and
    /// `<workdir>/<scripts_dir>/<program>`.
    pub fn new(workdir: &Path, config: &EmbedConfig, program: &str) -> Self {
        let activate = if config.activate.is_empty() {
            None
        } else {
            Some(workdir.join(&config.activate))
        };
        Self {
            workdir: workdir.to_path_buf(),
            activate,
            self_invocation: workdir.join(&config.scripts_dir).join(program),
        }
    }

    /// The input lines, in the order they must be sent.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![format!("cd {}\n", shell_escape_path(&self.workdir))];
        if let Some(activate) = &self.activate {
            lines.push(format!(". {}\n", shell_escape_path(activate)));
        }
        lines.push("clear\n".to_string());
        lines.push(format!(
            "{} {}\n",
            shell_escape_path(&self.self_invocation),
            DIRECT_FLAG
        ));
        lines
    }
}

/// Focus `session` and type the plan's lines into it, each one acknowledged
/// before the next is sent. Does not wait for the commands to run.
pub async fn drive_session<T>(
    terminal: &T,
    session: &SessionId,
    plan: &SessionPlan,
) -> Result<(), TerminalError>
where
    T: TerminalController + ?Sized,
{
    terminal.activate(session).await?;
    for line in plan.lines() {
        debug!(pane = %session, line = %line.trim_end(), "sending");
        terminal.send_text(session, &line).await?;
    }
    Ok(())
}

/// Single-quote `s` for a POSIX shell.
pub fn shell_escape(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

fn shell_escape_path(path: &Path) -> String {
    shell_escape(&path.to_string_lossy())
}
