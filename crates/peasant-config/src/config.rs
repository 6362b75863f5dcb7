//! `.peasant.toml` loading: find-by-walking-up, parse with defaults, and a
//! single environment-variable-first token resolution function.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = ".peasant.toml";

/// The account-level token environment variable, checked before any config
/// file.
const TOKEN_ENV_VAR: &str = "PEASANT_TOKEN";

pub fn config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE)
}

/// Runtime configuration for the queue engine and its collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// `C6`'s `max_concurrency`.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Where the durable blob cache (`C2`'s backing store) lives.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// The default workspace root when neither a per-build override nor
    /// `PEASANT_BUILD_DIR` is set. `None` means "use the OS temp directory".
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,
    /// The account this engine authenticates as, for the same-owner
    /// shortcut in build-URL validation.
    #[serde(default)]
    pub own_account: String,
    /// Base URL of the source-hosting API the `SourceHostClient` talks to.
    #[serde(default = "default_source_host_base_url")]
    pub source_host_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            state_dir: default_state_dir(),
            workspace_root: None,
            own_account: String::new(),
            source_host_base_url: default_source_host_base_url(),
        }
    }
}

fn default_max_concurrency() -> usize {
    2
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".peasant")
}

fn default_source_host_base_url() -> String {
    "https://api.github.com".to_string()
}

/// Load configuration from a directory, returning defaults if no config
/// file is present.
pub fn load_config(dir: &Path) -> Result<Config> {
    let path = config_path(dir);
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("failed to parse config file: {}", path.display()))
}

/// Walk up from `start_dir` looking for `.peasant.toml`.
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir;
    loop {
        let candidate = current.join(CONFIG_FILE);
        if candidate.exists() {
            return Some(candidate);
        }
        current = current.parent()?;
    }
}

/// Resolve the source-hosting token: `PEASANT_TOKEN` env var, never the
/// config file (so it can't end up committed alongside `.peasant.toml`).
pub fn resolve_token() -> Option<String> {
    token_from_raw(env::var(TOKEN_ENV_VAR).ok())
}

fn token_from_raw(raw: Option<String>) -> Option<String> {
    raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
