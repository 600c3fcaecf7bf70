//! Embedded mode: run the questionnaire in a new pane next to the current
//! one and wait until that pane is gone again.

use anyhow::{Context, Result};
use tracing::info;

use crate::driver::{drive_session, SessionPlan};
use crate::terminal::{SessionId, TerminalController};
use crate::watch::{wait_for_job_completion, wait_for_termination, CompletionDetector};

/// Split the current pane, run the plan in the new pane, wait for the
/// questionnaire to finish, close the pane and wait for it to disappear.
///
/// There is no timeout: if the pane never returns to a shell prompt this
/// waits forever. The pane is not cleaned up on error.
pub async fn run_embedded<T>(
    terminal: &T,
    plan: &SessionPlan,
    detector: &mut dyn CompletionDetector,
) -> Result<SessionId>
where
    T: TerminalController + ?Sized,
{
    let current = terminal
        .current_session()
        .await
        .context("find the current pane")?;
    let session = terminal
        .split_pane(&current)
        .await
        .with_context(|| format!("split pane {}", current))?;

    drive_session(terminal, &session, plan)
        .await
        .with_context(|| format!("start the questionnaire in pane {}", session))?;

    let jobs = terminal.subscribe_job_name(&session).await?;
    let job = wait_for_job_completion(jobs, detector)
        .await
        .with_context(|| format!("wait for the questionnaire in pane {}", session))?;
    info!(pane = %session, %job, "questionnaire finished");

    // Subscribe before asking the pane to exit so a fast exit is not missed.
    let terminations = terminal.subscribe_terminations().await?;
    terminal.send_text(&session, "exit\n").await?;
    wait_for_termination(terminations, &session)
        .await
        .with_context(|| format!("wait for pane {} to close", session))?;
    info!(pane = %session, "pane closed");

    Ok(session)
}
