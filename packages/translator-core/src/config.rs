//! Core tunables for the EN->VI translation streaming pipeline.
//!
//! Deployment-tunable (unlike [`crate::constants`], which are fixed by
//! protocol/timing math). The binary loads a YAML file into its own
//! `ServerConfig` and converts into this type.

use serde::{Deserialize, Serialize};

/// Segmenter re-anchoring and commit-trigger tunables (§4.6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Tail length (chars) of committed text tried against new text when re-anchoring.
    pub reanchor_max_tail_chars: usize,
    /// Tail length (chars) used for a hard rewrite when no anchor is found.
    pub hard_rewrite_tail_chars: usize,
    /// Number of identical consecutive receptions required before committing on punctuation.
    pub punct_stable_count: u32,
    /// Maximum wait (ms) before committing on punctuation regardless of stability.
    pub punct_max_wait_ms: u64,
    /// Silence (ms) since the last reception before a pause-triggered commit.
    pub seg_pause_ms: u64,
    /// Minimum words buffered before a pause-triggered commit may fire.
    pub seg_min_words: usize,
    /// Buffered word count above which a max-triggered commit fires.
    pub seg_max_words: usize,
    /// Buffered char count above which a max-triggered commit fires.
    pub seg_max_chars: usize,
    /// Receptions a safe prefix must stay identical for before a beat-commit fires.
    pub beat_stable_count: u32,
    /// Minimum length (chars) a beat-commit candidate must reach.
    pub beat_min_chars: usize,
    /// Word tokens withheld from the segmenter's view of upstream text (translate-lag).
    pub translate_lag_words: usize,
    /// Silence (ms) after which the held tail is released via a full re-segmentation.
    pub release_after_silence_ms: u64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            reanchor_max_tail_chars: 24,
            hard_rewrite_tail_chars: 64,
            punct_stable_count: 2,
            punct_max_wait_ms: 900,
            seg_pause_ms: 600,
            seg_min_words: 3,
            seg_max_words: 12,
            seg_max_chars: 90,
            beat_stable_count: 3,
            beat_min_chars: 8,
            translate_lag_words: 2,
            release_after_silence_ms: 1_200,
        }
    }
}

/// Commit/draft worker tunables (§4.7).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Maximum segments batched into a single commit-translation call.
    pub commit_batch_max: usize,
    /// Minimum unique-token ratio a draft must have to avoid the garbage filter.
    pub draft_min_unique_ratio: f32,
    /// Maximum consecutive repeated tokens tolerated before a draft is suppressed.
    pub draft_max_repeat_run: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            commit_batch_max: 4,
            draft_min_unique_ratio: 0.4,
            draft_max_repeat_run: 3,
        }
    }
}

/// History persistence mode (§4.10), shared shape with Service A.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMode {
    /// Append completed sentences as newline-terminated lines.
    LinePerSentence,
    /// Truncate and rewrite the file to exactly match the current `vi_full` text.
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
    /// Whether a `reset` message clears the history file.
    pub clear_on_reset: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: None,
            mode: HistoryMode::LinePerSentence,
            clear_on_reset: false,
        }
    }
}

/// Compatibility tunables for legacy clients.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompatConfig {
    /// Also emit `vi-delta` mirroring `vi-commit`, for clients expecting the
    /// original translator's wire shape.
    pub emit_vi_delta: bool,
}

/// Aggregate core configuration for Service B.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub segmenter: SegmenterConfig,
    pub worker: WorkerConfig,
    pub history: HistoryConfig,
    pub compat: CompatConfig,
}
