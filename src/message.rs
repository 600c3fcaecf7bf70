//! The commit message file read by the `prepare-commit-msg` hook.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// `<workdir>/.git/.gitmessage`
pub fn message_file_path(workdir: &Path) -> PathBuf {
    workdir.join(".git").join(".gitmessage")
}

/// Write `text` verbatim to the message file, replacing any previous content.
pub fn persist(workdir: &Path, text: &str) -> Result<PathBuf> {
    let path = message_file_path(workdir);
    let mut file =
        File::create(&path).with_context(|| format!("open {} for writing", path.display()))?;
    file.write_all(text.as_bytes())
        .with_context(|| format!("write {}", path.display()))?;
    file.flush()
        .with_context(|| format!("flush {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = text.len(), "saved commit message");
    Ok(path)
}
