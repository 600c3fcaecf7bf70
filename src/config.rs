//! Configuration loading.
//!
//! Everything has a default, so running without a config file behaves like the
//! plain `cz` questionnaire inside a vertical tmux split. Lookup order:
//!
//! 1. the file named by `CZ_PANE_CONFIG`
//! 2. `.cz-pane.toml` in the working tree
//! 3. `$XDG_CONFIG_HOME/cz-pane/config.toml` (platform config dir)

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "CZ_PANE_CONFIG";
const LOCAL_CONFIG: &str = ".cz-pane.toml";

/// Placeholder in questionnaire arguments replaced by the temporary message file path.
pub const MESSAGE_FILE_PLACEHOLDER: &str = "{message_file}";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub questionnaire: QuestionnaireConfig,
    pub embed: EmbedConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct QuestionnaireConfig {
    /// Program to run; looked up on PATH.
    pub program: String,
    /// Arguments; `{message_file}` is substituted with a temp file path.
    pub args: Vec<String>,
}

impl Default for QuestionnaireConfig {
    fn default() -> Self {
        Self {
            program: "cz".to_string(),
            args: vec![
                "commit".to_string(),
                "--dry-run".to_string(),
                "--write-message-to-file".to_string(),
                MESSAGE_FILE_PLACEHOLDER.to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SplitDirection {
    /// Side by side.
    #[default]
    Vertical,
    /// One above the other.
    Horizontal,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionStrategy {
    #[default]
    ShellPrompt,
    ProgramExit,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbedConfig {
    /// Environment activation script, relative to the working tree. Empty skips it.
    pub activate: String,
    /// Directory (relative to the working tree) holding this tool for re-invocation.
    pub scripts_dir: String,
    pub split: SplitDirection,
    /// Foreground job names that mean "back at the shell prompt".
    pub shells: Vec<String>,
    pub completion: CompletionStrategy,
    pub poll_interval_ms: u64,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            activate: "venv/bin/activate".to_string(),
            scripts_dir: "scripts".to_string(),
            split: SplitDirection::default(),
            shells: vec!["bash".to_string(), "zsh".to_string()],
            completion: CompletionStrategy::default(),
            poll_interval_ms: 100,
        }
    }
}

impl EmbedConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Config {
    /// Load the first config file found for `workdir`, or defaults if there is none.
    pub fn load(workdir: &Path) -> Result<Self> {
        match find_config_file(workdir) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::from_file(&path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

fn find_config_file(workdir: &Path) -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_ENV) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let local = workdir.join(LOCAL_CONFIG);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("cz-pane").join("config.toml"))
        .filter(|path| path.is_file())
}
