//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.dashvite/config.json`).
//! Missing file means defaults; the backend origin is configuration, never a
//! hard-coded constant in the session core.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Backend service settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Chat UI behavior knobs consumed by the session core.
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Backend origin for the profile, history, assistant, and login endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// Base URL of the local backend (default "http://127.0.0.1:8000").
    #[serde(default = "default_backend_origin")]
    pub origin: String,
}

fn default_backend_origin() -> String {
    "http://127.0.0.1:8000".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            origin: default_backend_origin(),
        }
    }
}

/// Session-core behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfig {
    /// How long a jump-to-message highlight stays active, in milliseconds
    /// (default 2000).
    #[serde(default = "default_highlight_ms")]
    pub highlight_ms: u64,
}

fn default_highlight_ms() -> u64 {
    2000
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            highlight_ms: default_highlight_ms(),
        }
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("DASHVITE_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".dashvite").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the default path (or DASHVITE_CONFIG_PATH). Missing file
/// => default config. Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
