//! Server configuration.
//!
//! Supports loading from a YAML file with environment variable overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use stt_core::config::{
    AgcConfig, AuthConfig, FeederConfig, HistoryConfig, HistoryMode, IngressConfig,
    StabilizerConfig,
};

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind the HTTP/WebSocket server to.
    /// Override: `STT_BIND_PORT`
    pub bind_port: u16,

    /// HS256 shared secret. `None` disables authentication.
    /// Override: `STT_AUTH_SECRET`
    pub auth_secret: Option<String>,

    /// Path to the transcript history file. `None` disables persistence.
    /// Override: `STT_HISTORY_PATH`
    pub history_path: Option<PathBuf>,

    /// History persistence mode: `line_per_sentence` or `byte_exact_mirror`.
    pub history_mode: HistoryMode,

    pub ingress: IngressConfig,
    pub agc: AgcConfig,
    pub feeder: FeederConfig,
    pub stabilizer: StabilizerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_port: 8420,
            auth_secret: None,
            history_path: None,
            history_mode: HistoryMode::LinePerSentence,
            ingress: IngressConfig::default(),
            agc: AgcConfig::default(),
            feeder: FeederConfig::default(),
            stabilizer: StabilizerConfig::default(),
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
        if let Ok(val) = std::env::var("STT_BIND_PORT") {
            if let Ok(port) = val.parse() {
                self.bind_port = port;
            }
        }

        if let Ok(val) = std::env::var("STT_AUTH_SECRET") {
            if !val.is_empty() {
                self.auth_secret = Some(val);
            }
        }

        if let Ok(val) = std::env::var("STT_HISTORY_PATH") {
            if !val.is_empty() {
                self.history_path = Some(PathBuf::from(val));
            }
        }
    }

    /// Converts to stt-core's `Config` type.
    pub fn to_core_config(&self) -> stt_core::Config {
        stt_core::Config {
            ingress: self.ingress,
            agc: self.agc,
            feeder: self.feeder,
            stabilizer: self.stabilizer,
            history: HistoryConfig {
                path: self.history_path.clone(),
                mode: self.history_mode,
            },
            auth: AuthConfig {
                secret: self.auth_secret.clone(),
            },
        }
    }
}
