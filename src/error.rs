//! Error types for the two external seams: the terminal backend and the
//! commit questionnaire.

use std::process::ExitStatus;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("not running inside a {0} session")]
    NotAttached(&'static str),

    #[error("{0} is not installed or not on PATH")]
    NotInstalled(&'static str),

    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("unexpected output from `{command}`: {output:?}")]
    UnexpectedOutput { command: String, output: String },

    #[error("{0} subscription closed before its condition was met")]
    SubscriptionClosed(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum QuestionnaireError {
    #[error("could not find questionnaire program '{0}'")]
    ProgramNotFound(String),

    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("questionnaire '{program}' did not complete ({status})")]
    Aborted { program: String, status: ExitStatus },

    #[error("failed to read the commit message: {0}")]
    ReadMessage(#[source] std::io::Error),

    #[error("commit message from '{program}' is not valid UTF-8")]
    InvalidUtf8 {
        program: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
}
