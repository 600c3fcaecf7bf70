//! Answer capture: run the commit questionnaire and collect the message it
//! produces.

use anyhow::Result;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::{QuestionnaireConfig, MESSAGE_FILE_PLACEHOLDER};
use crate::error::QuestionnaireError;

/// Something that can ask the user for a commit message.
pub trait QuestionnaireProvider {
    /// Run the questionnaire and return the message text, untouched.
    fn capture_answers(&self) -> Result<String>;
}

impl<F> QuestionnaireProvider for F
where
    F: Fn() -> Result<String>,
{
    fn capture_answers(&self) -> Result<String> {
        self()
    }
}

/// Runs the commitizen CLI (or any compatible program) attached to the
/// current terminal.
///
/// When an argument contains `{message_file}` the program is expected to
/// write the message to that file; otherwise its stdout is the message.
#[derive(Debug, Clone)]
pub struct CommitizenCli {
    program: String,
    args: Vec<String>,
    workdir: PathBuf,
}

impl CommitizenCli {
    pub fn new(config: &QuestionnaireConfig, workdir: &Path) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            workdir: workdir.to_path_buf(),
        }
    }

    fn writes_message_file(&self) -> bool {
        self.args
            .iter()
            .any(|arg| arg.contains(MESSAGE_FILE_PLACEHOLDER))
    }

    fn command(&self, program: &Path, message_file: Option<&Path>) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(substitute_message_file(&self.args, message_file))
            .current_dir(&self.workdir)
            .stdin(Stdio::inherit())
            .stderr(Stdio::inherit());
        cmd
    }

    fn capture_via_file(&self, program: &Path) -> Result<String, QuestionnaireError> {
        let message_file = tempfile::Builder::new()
            .prefix("cz-pane-")
            .suffix(".txt")
            .tempfile()
            .map_err(QuestionnaireError::ReadMessage)?;

        let status = self
            .command(program, Some(message_file.path()))
            .stdout(Stdio::inherit())
            .status()
            .map_err(|source| self.spawn_error(source))?;

        if !status.success() {
            return Err(QuestionnaireError::Aborted {
                program: self.program.clone(),
                status,
            });
        }

        let bytes = fs::read(message_file.path()).map_err(QuestionnaireError::ReadMessage)?;
        self.decode(bytes)
    }

    fn capture_via_stdout(&self, program: &Path) -> Result<String, QuestionnaireError> {
        let output = self
            .command(program, None)
            .stdout(Stdio::piped())
            .output()
            .map_err(|source| self.spawn_error(source))?;

        if !output.status.success() {
            return Err(QuestionnaireError::Aborted {
                program: self.program.clone(),
                status: output.status,
            });
        }

        self.decode(output.stdout)
    }

    /// The message must pass through unchanged, so bytes that are not UTF-8
    /// are rejected rather than replaced.
    fn decode(&self, bytes: Vec<u8>) -> Result<String, QuestionnaireError> {
        String::from_utf8(bytes).map_err(|source| QuestionnaireError::InvalidUtf8 {
            program: self.program.clone(),
            source,
        })
    }

    fn spawn_error(&self, source: io::Error) -> QuestionnaireError {
        if source.kind() == io::ErrorKind::NotFound {
            QuestionnaireError::ProgramNotFound(self.program.clone())
        } else {
            QuestionnaireError::Spawn {
                program: self.program.clone(),
                source,
            }
        }
    }
}

impl QuestionnaireProvider for CommitizenCli {
    fn capture_answers(&self) -> Result<String> {
        let program = resolve_program(&self.program);
        tracing::info!(program = %program.display(), "starting questionnaire");

        let text = if self.writes_message_file() {
            self.capture_via_file(&program)?
        } else {
            self.capture_via_stdout(&program)?
        };

        tracing::debug!(bytes = text.len(), "questionnaire finished");
        Ok(text)
    }
}

/// Full path of `program` on PATH, or the bare name when `which` cannot find
/// it and the OS lookup gets the final say.
fn resolve_program(program: &str) -> PathBuf {
    which::which(program).unwrap_or_else(|err| {
        tracing::debug!(program, error = %err, "which lookup failed, using bare name");
        PathBuf::from(program)
    })
}

fn substitute_message_file(args: &[String], message_file: Option<&Path>) -> Vec<String> {
    match message_file {
        Some(path) => {
            let path = path.to_string_lossy();
            args.iter()
                .map(|arg| arg.replace(MESSAGE_FILE_PLACEHOLDER, &path))
                .collect()
        }
        None => args.to_vec(),
    }
}
