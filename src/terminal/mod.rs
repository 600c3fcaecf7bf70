//! Remote control of a terminal application.
//!
//! The orchestration code only talks to [`TerminalController`]; the tmux
//! backend lives in [`tmux`] and tests substitute a recording mock.

pub mod tmux;

use async_trait::async_trait;
use futures_util::Stream;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::TerminalError;

pub use tmux::Tmux;

/// Opaque identifier of a pane/session inside the terminal application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Operations the orchestration needs from a terminal application.
///
/// Every method resolves once the application has acknowledged the request,
/// not once the shell inside the session has acted on it.
#[async_trait]
pub trait TerminalController: Send + Sync {
    /// The session this process is running in.
    async fn current_session(&self) -> Result<SessionId, TerminalError>;

    /// Split `session` and return the new session. Focus is not moved.
    async fn split_pane(&self, session: &SessionId) -> Result<SessionId, TerminalError>;

    /// Bring `session` to the front.
    async fn activate(&self, session: &SessionId) -> Result<(), TerminalError>;

    /// Type `text` into the session; `\n` presses Enter.
    async fn send_text(&self, session: &SessionId, text: &str) -> Result<(), TerminalError>;

    /// Stream of changes to the session's foreground job name.
    async fn subscribe_job_name(
        &self,
        session: &SessionId,
    ) -> Result<Subscription<String>, TerminalError>;

    /// Stream of identifiers of sessions that have terminated, across the
    /// whole application.
    async fn subscribe_terminations(&self) -> Result<Subscription<SessionId>, TerminalError>;
}

/// A stream of values pushed by the terminal application.
///
/// Dropping the subscription stops the task feeding it.
pub struct Subscription<T> {
    rx: mpsc::Receiver<Result<T, TerminalError>>,
    task: Option<JoinHandle<()>>,
}

impl<T> Subscription<T> {
    /// Wrap a receiver fed by `task`; the task is aborted on drop.
    pub fn new(rx: mpsc::Receiver<Result<T, TerminalError>>, task: JoinHandle<()>) -> Self {
        Self {
            rx,
            task: Some(task),
        }
    }

    /// A subscription fed by the returned sender.
    pub fn channel(buffer: usize) -> (mpsc::Sender<Result<T, TerminalError>>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self { rx, task: None })
    }

    /// A subscription that yields `values` and then ends.
    pub fn from_values(values: impl IntoIterator<Item = T>) -> Self {
        let values: Vec<T> = values.into_iter().collect();
        let (tx, sub) = Self::channel(values.len());
        for value in values {
            // Capacity matches the number of values, so this cannot be full.
            let _ = tx.try_send(Ok(value));
        }
        sub
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Result<T, TerminalError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
