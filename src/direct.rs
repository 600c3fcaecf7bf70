//! Direct mode: ask for the message in this process and save it.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::message;
use crate::questionnaire::QuestionnaireProvider;

/// Run the questionnaire, then write its answer to the message file.
///
/// Nothing is written if the questionnaire fails.
pub fn run_direct(provider: &dyn QuestionnaireProvider, workdir: &Path) -> Result<PathBuf> {
    let answers = provider.capture_answers()?;
    message::persist(workdir, &answers)
}
