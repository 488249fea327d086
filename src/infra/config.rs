// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::infra::paths;
use crate::stream::decoder::Utf8Mode;

/// Environment override for the answer service base URL.
pub const BASE_URL_ENV: &str = "DOCCHAT_API_BASE_URL";

pub const DEFAULT_WELCOME: &str = "# 👋 Welcome to **docchat**!\n\n\
Ask questions about your uploaded PDF documents.\n\n\
- 📄 **Summarize** lengthy documents\n\
- 🔍 **Answer** specific questions\n\
- 📊 **Extract** key information";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub base_url: String,
    pub connect_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:10000".into(),
            connect_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Minimum time between two visible updates.
    pub min_flush_interval_ms: u64,
    /// Flush unbroken text once the buffer holds more than this many chars.
    pub max_buffer_chars: usize,
    /// Pause after each flush so the renderer can paint. 0 = just yield.
    pub paint_pause_ms: u64,
    #[serde(default)]
    pub utf8: Utf8Mode,
    pub cancel_marker: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            min_flush_interval_ms: 30,
            max_buffer_chars: 15,
            paint_pause_ms: 5,
            utf8: Utf8Mode::Lossy,
            cancel_marker: "\n\n_Generation stopped_".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Static assistant turn shown before the first question. Empty = none.
    pub welcome: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            welcome: DEFAULT_WELCOME.into(),
        }
    }
}

impl Config {
    /// Load config from file, falling back to defaults, then apply env overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.server.base_url = url;
            }
        }
    }
}
