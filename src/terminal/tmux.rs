//! tmux backend for [`TerminalController`].
//!
//! Panes are addressed by their `%N` pane id. tmux has no push notifications
//! for job names or pane exits, so both subscriptions poll on a spawned task
//! and only report changes relative to what was seen when they were opened.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::env;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{SessionId, Subscription, TerminalController};
use crate::config::SplitDirection;
use crate::error::TerminalError;

const TMUX: &str = "tmux";
const PANE_ID_FORMAT: &str = "#{pane_id}";
const JOB_NAME_FORMAT: &str = "#{pane_current_command}";

/// Variables the re-invoked tool reads. A new pane starts from the tmux
/// server's environment, so these are passed along explicitly.
const FORWARDED_ENV: [&str; 3] = ["CZ_PANE_CONFIG", "CZ_PANE_LOG_DIR", "RUST_LOG"];

/// Connection to the tmux server this process is running under.
#[derive(Debug, Clone)]
pub struct Tmux {
    split: SplitDirection,
    poll_interval: Duration,
}

impl Tmux {
    /// Check that we are inside tmux and that the server answers.
    pub async fn connect(
        split: SplitDirection,
        poll_interval: Duration,
    ) -> Result<Self, TerminalError> {
        if env::var_os("TMUX").is_none() {
            return Err(TerminalError::NotAttached(TMUX));
        }
        which::which(TMUX).map_err(|_| TerminalError::NotInstalled(TMUX))?;

        let version = run_tmux(&["-V"]).await?;
        info!(%version, "connected to tmux");

        Ok(Self {
            split,
            poll_interval,
        })
    }
}

#[async_trait]
impl TerminalController for Tmux {
    async fn current_session(&self) -> Result<SessionId, TerminalError> {
        if let Ok(pane) = env::var("TMUX_PANE") {
            if !pane.is_empty() {
                return Ok(SessionId::new(pane));
            }
        }
        let output = run_tmux(&["display-message", "-p", PANE_ID_FORMAT]).await?;
        parse_pane_id("display-message", &output)
    }

    async fn split_pane(&self, session: &SessionId) -> Result<SessionId, TerminalError> {
        let env = forwarded_env(|name| env::var(name).ok());
        let args = split_args(session, self.split, &env);
        let output = run_tmux(args.as_slice()).await?;
        let pane = parse_pane_id("split-window", &output)?;
        info!(from = %session, pane = %pane, "split pane");
        Ok(pane)
    }

    async fn activate(&self, session: &SessionId) -> Result<(), TerminalError> {
        run_tmux(&["select-pane", "-t", session.as_str()]).await?;
        Ok(())
    }

    async fn send_text(&self, session: &SessionId, text: &str) -> Result<(), TerminalError> {
        for key in keystrokes(text) {
            match key {
                Keystroke::Literal(chunk) => {
                    let args = ["send-keys", "-t", session.as_str(), "-l", "--", chunk.as_str()];
                    run_tmux(&args).await?;
                }
                Keystroke::Enter => {
                    run_tmux(&["send-keys", "-t", session.as_str(), "Enter"]).await?;
                }
            }
        }
        Ok(())
    }

    async fn subscribe_job_name(
        &self,
        session: &SessionId,
    ) -> Result<Subscription<String>, TerminalError> {
        let mut last = current_command(session).await?;
        debug!(pane = %session, job = %last, "watching job name");

        let (tx, rx) = mpsc::channel(16);
        let pane = session.clone();
        let mut ticker = tokio::time::interval(self.poll_interval);

        let task = tokio::spawn(async move {
            loop {
                ticker.tick().await;
                match current_command(&pane).await {
                    Ok(job) => {
                        if let Some(job) = job_change(&mut last, job) {
                            if tx.send(Ok(job)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(pane = %pane, error = %e, "job name poll failed");
                        let _ = tx.send(Err(e)).await;
                        break;
                    }
                }
            }
        });

        Ok(Subscription::new(rx, task))
    }

    async fn subscribe_terminations(&self) -> Result<Subscription<SessionId>, TerminalError> {
        let mut known = list_panes().await?;
        debug!(panes = known.len(), "watching for pane exits");

        let (tx, rx) = mpsc::channel(16);
        let mut ticker = tokio::time::interval(self.poll_interval);

        let task = tokio::spawn(async move {
            loop {
                ticker.tick().await;
                let current = match list_panes().await {
                    Ok(panes) => panes,
                    Err(e) => {
                        warn!(error = %e, "pane list poll failed");
                        let _ = tx.send(Err(e)).await;
                        break;
                    }
                };
                for pane in pane_exits(&mut known, current) {
                    if tx.send(Ok(pane)).await.is_err() {
                        return;
                    }
                }
            }
        });

        Ok(Subscription::new(rx, task))
    }
}

/// Run a tmux command and return its trimmed stdout.
async fn run_tmux<S: AsRef<str>>(args: &[S]) -> Result<String, TerminalError> {
    let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
    let output = Command::new(TMUX)
        .args(&args)
        .stdin(Stdio::null())
        .output()
        .await?;

    if !output.status.success() {
        return Err(TerminalError::CommandFailed {
            command: format!("{} {}", TMUX, args.join(" ")),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
}

async fn current_command(pane: &SessionId) -> Result<String, TerminalError> {
    run_tmux(&["display-message", "-p", "-t", pane.as_str(), JOB_NAME_FORMAT]).await
}

async fn list_panes() -> Result<BTreeSet<SessionId>, TerminalError> {
    let output = run_tmux(&["list-panes", "-a", "-F", PANE_ID_FORMAT]).await?;
    Ok(parse_pane_list(&output))
}

/// The forwarded variables that are set and non-empty, as `(name, value)` pairs.
fn forwarded_env<F>(lookup: F) -> Vec<(String, String)>
where
    F: Fn(&str) -> Option<String>,
{
    FORWARDED_ENV
        .iter()
        .filter_map(|name| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .map(|value| (name.to_string(), value))
        })
        .collect()
}

/// `split-window` arguments. A vertical divider (panes side by side) is
/// tmux's `-h`. Each `env` pair becomes `-e NAME=value` (tmux 3.0+).
fn split_args(
    target: &SessionId,
    direction: SplitDirection,
    env: &[(String, String)],
) -> Vec<String> {
    let flag = match direction {
        SplitDirection::Vertical => "-h",
        SplitDirection::Horizontal => "-v",
    };
    let mut args: Vec<String> = ["split-window", "-d", flag, "-t", target.as_str()]
        .iter()
        .map(|s| s.to_string())
        .collect();
    for (name, value) in env {
        args.push("-e".to_string());
        args.push(format!("{}={}", name, value));
    }
    args.extend(["-P", "-F", PANE_ID_FORMAT].iter().map(|s| s.to_string()));
    args
}

/// Record a polled job name; returns it only if it differs from the last one.
fn job_change(last: &mut String, job: String) -> Option<String> {
    if *last == job {
        return None;
    }
    *last = job.clone();
    Some(job)
}

/// Replace the known pane set with `current`; returns the panes that left.
fn pane_exits(known: &mut BTreeSet<SessionId>, current: BTreeSet<SessionId>) -> Vec<SessionId> {
    let exits = vanished(known, &current);
    *known = current;
    exits
}

fn parse_pane_id(command: &str, output: &str) -> Result<SessionId, TerminalError> {
    let id = output.trim();
    if id.starts_with('%') && id.len() > 1 && !id.contains(char::is_whitespace) {
        Ok(SessionId::new(id))
    } else {
        Err(TerminalError::UnexpectedOutput {
            command: format!("{} {}", TMUX, command),
            output: output.to_string(),
        })
    }
}

fn parse_pane_list(output: &str) -> BTreeSet<SessionId> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(SessionId::new)
        .collect()
}

/// Panes present in `before` but gone from `after`.
fn vanished(before: &BTreeSet<SessionId>, after: &BTreeSet<SessionId>) -> Vec<SessionId> {
    before.difference(after).cloned().collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Keystroke {
    Literal(String),
    Enter,
}

/// Break text into literal chunks and Enter presses.
fn keystrokes(text: &str) -> Vec<Keystroke> {
    let mut keys = Vec::new();
    let mut lines = text.split('\n').peekable();
    while let Some(line) = lines.next() {
        if !line.is_empty() {
            keys.push(Keystroke::Literal(line.to_string()));
        }
        if lines.peek().is_some() {
            keys.push(Keystroke::Enter);
        }
    }
    keys
}
