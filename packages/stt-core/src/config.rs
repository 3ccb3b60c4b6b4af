//! Core tunables for the STT streaming pipeline.
//!
//! These are deployment-tunable (unlike [`crate::constants`], which are fixed
//! by protocol/frame math). The binary loads a YAML file into its own
//! `ServerConfig` and converts into this type; library consumers can also
//! construct it directly (e.g. in tests) via [`Config::default`].

use serde::{Deserialize, Serialize};

/// Ingress queue and backpressure tunables (§4.2).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct IngressConfig {
    /// Maximum number of queued `AudioItem`s before oldest-drop kicks in.
    pub queue_max: usize,
    /// Queue occupancy at/above which the oldest item is dropped before enqueuing.
    pub drop_guard_q: usize,
    /// Hard byte-total cap; oldest items are dropped until under this.
    pub qbytes_hard_cap: usize,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            queue_max: 16,
            drop_guard_q: 12,
            qbytes_hard_cap: 48 * 1024,
        }
    }
}

/// Resample + AGC tunables (§4.3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AgcConfig {
    /// Target peak amplitude after gain (0.0-1.0).
    pub target_peak: f32,
    /// Maximum multiplicative gain applied.
    pub max_gain: f32,
}

impl Default for AgcConfig {
    fn default() -> Self {
        Self {
            target_peak: 0.95,
            max_gain: 6.0,
        }
    }
}

/// Feeder/pacer tunables (§4.4).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FeederConfig {
    /// Backlog threshold (ms at 16 kHz) above which oldest samples are dropped.
    pub max_buf_ms: u64,
    /// Backlog target (ms at 16 kHz) to drop down to once `max_buf_ms` is exceeded.
    pub drop_buf_to_ms: u64,
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            max_buf_ms: 4_000,
            drop_buf_to_ms: 1_500,
        }
    }
}

/// Stabilizer tunables (§4.5).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    /// Maximum characters a rewrite may delete from the tail of `shown`.
    pub max_rollback_chars: usize,
    /// Minimum milliseconds between two accepted rewrites.
    pub min_rewrite_interval_ms: u64,
    /// Number of consecutive identical rewrite candidates required before acceptance.
    pub rewrite_confirm_n: u32,
    /// Maximum patches emitted per second.
    pub patch_max_hz: f64,
    /// Ignore hypotheses that are a strict prefix of `shown` (treat as shrink).
    pub ignore_shrink: bool,
    /// Micro-delta chunking: sub-patches longer than this are not split further up to this bound.
    pub micro_max_chars: usize,
    /// Micro-delta chunking: a trailing slice shorter than this merges into the previous chunk.
    pub micro_min_slice_chars: usize,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            max_rollback_chars: 40,
            min_rewrite_interval_ms: 300,
            rewrite_confirm_n: 2,
            patch_max_hz: 10.0,
            ignore_shrink: true,
            micro_max_chars: 48,
            micro_min_slice_chars: 12,
        }
    }
}

/// History persistence mode (§4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMode {
    /// Append completed sentences as newline-terminated lines.
    LinePerSentence,
    /// Truncate and rewrite the file to exactly match the current shown text.
    ByteExactMirror,
}

/// History persistence tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Path to the history file. `None` disables persistence.
    pub path: Option<std::path::PathBuf>,
    /// Persistence mode.
    pub mode: HistoryMode,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: None,
            mode: HistoryMode::LinePerSentence,
        }
    }
}

/// Authentication tunables (§4.9).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared HS256 secret. `None` disables authentication entirely.
    pub secret: Option<String>,
}

/// Aggregate core configuration for Service A.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ingress: IngressConfig,
    pub agc: AgcConfig,
    pub feeder: FeederConfig,
    pub stabilizer: StabilizerConfig,
    pub history: HistoryConfig,
    pub auth: AuthConfig,
}
