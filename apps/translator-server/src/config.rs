//! Server configuration.
//!
//! Supports loading from a YAML file with environment variable overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use translator_core::config::{CompatConfig, HistoryMode, SegmenterConfig, WorkerConfig};

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind the HTTP/WebSocket server to.
    /// Override: `TRANSLATOR_BIND_PORT`
    pub bind_port: u16,

    /// Path to the Vietnamese transcript history file. `None` disables persistence.
    /// Override: `TRANSLATOR_HISTORY_PATH`
    pub history_path: Option<PathBuf>,

    /// History persistence mode: `line_per_sentence` or `byte_exact_mirror`.
    pub history_mode: HistoryMode,

    /// Whether a `reset` upstream message clears the history file.
    pub history_clear_on_reset: bool,

    pub segmenter: SegmenterConfig,
    pub worker: WorkerConfig,
    pub compat: CompatConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_port: 8421,
            history_path: None,
            history_mode: HistoryMode::LinePerSentence,
            history_clear_on_reset: false,
            segmenter: SegmenterConfig::default(),
            worker: WorkerConfig::default(),
            compat: CompatConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TRANSLATOR_BIND_PORT") {
            if let Ok(port) = val.parse() {
                self.bind_port = port;
            }
        }

        if let Ok(val) = std::env::var("TRANSLATOR_HISTORY_PATH") {
            if !val.is_empty() {
                self.history_path = Some(PathBuf::from(val));
            }
        }
    }

    /// Converts to translator-core's `Config` type.
    pub fn to_core_config(&self) -> translator_core::Config {
        translator_core::Config {
            segmenter: self.segmenter,
            worker: self.worker,
            history: translator_core::config::HistoryConfig {
                path: self.history_path.clone(),
                mode: self.history_mode,
                clear_on_reset: self.history_clear_on_reset,
            },
            compat: self.compat,
        }
    }
}
