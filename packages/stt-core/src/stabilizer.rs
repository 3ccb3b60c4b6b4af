//! Rewrite stabilization and patch generation (§4.5).
//!
//! The recognizer's hypothesis is the ENTIRE current best guess, not a
//! delta, and it can be revised non-monotonically (a later hypothesis can
//! diverge from an earlier one anywhere, not just at the end). The
//! stabilizer turns that into a sequence of append/replace patches the
//! client can apply cheaply, while refusing large or unconfirmed rewrites
//! so the visible transcript doesn't visibly flicker.
//!
//! Gating, in order: shrink-ignore, rollback-size reject, rewrite
//! confirmation (N consecutive identical candidates), minimum rewrite
//! interval, then an overall patch emission rate cap. A patch whose insert
//! exceeds the micro-delta size is split into several same-`seq` chunks so
//! the client never has to apply one enormous replace.

use std::time::{Duration, Instant};

use crate::config::StabilizerConfig;

/// One unit of transcript delta sent to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub delete: usize,
    pub insert: String,
    pub seq: u64,
    pub t_ms: u64,
    /// `true` if another patch with the same `seq` immediately follows.
    pub continuation: bool,
}

/// Running stabilizer state for one session.
pub struct StabilizerState {
    config: StabilizerConfig,
    shown: String,
    seq: u64,
    stable_seq: u64,
    start: Instant,
    pending_candidate: Option<String>,
    pending_count: u32,
    last_rewrite_at: Option<Instant>,
    last_patch_at: Option<Instant>,
}

impl StabilizerState {
    #[must_use]
    pub fn new(config: StabilizerConfig, start: Instant) -> Self {
        Self {
            config,
            shown: String::new(),
            seq: 0,
            stable_seq: 0,
            start,
            pending_candidate: None,
            pending_count: 0,
            last_rewrite_at: None,
            last_patch_at: None,
        }
    }

    /// Text currently shown to the client.
    #[must_use]
    pub fn shown(&self) -> &str {
        &self.shown
    }

    /// Increments and returns the next monotonic `Stable` snapshot sequence
    /// number for this session.
    pub fn next_stable_seq(&mut self) -> u64 {
        self.stable_seq += 1;
        self.stable_seq
    }

    /// Feeds the latest full hypothesis and returns zero or more patches to
    /// emit. Empty means: ignored, gated, or identical to what's shown.
    pub fn process(&mut self, hypothesis: &str, now: Instant) -> Vec<Patch> {
        if hypothesis == self.shown {
            self.pending_candidate = None;
            self.pending_count = 0;
            return Vec::new();
        }

        let shown_chars: Vec<char> = self.shown.chars().collect();
        let hyp_chars: Vec<char> = hypothesis.chars().collect();
        let common = common_prefix_len(&shown_chars, &hyp_chars);

        let is_strict_shrink = common == hyp_chars.len() && hyp_chars.len() <= shown_chars.len();
        if is_strict_shrink && self.config.ignore_shrink {
            return Vec::new();
        }

        let is_pure_append = common == shown_chars.len();
        let deleted_chars = shown_chars.len() - common;

        // A hypothesis that only disagrees with `shown` on trailing
        // punctuation (e.g. "hello," -> "hello world") extends cleanly
        // rather than being treated as an unconfirmed rewrite.
        let is_punct_tolerant_append =
            !is_pure_append && shown_chars[common..].iter().copied().all(is_punct);

        if !is_pure_append && !is_punct_tolerant_append {
            if deleted_chars > self.config.max_rollback_chars {
                return Vec::new();
            }

            if self.pending_candidate.as_deref() == Some(hypothesis) {
                self.pending_count += 1;
            } else {
                self.pending_candidate = Some(hypothesis.to_string());
                self.pending_count = 1;
            }

            if self.pending_count < self.config.rewrite_confirm_n {
                return Vec::new();
            }

            if let Some(last) = self.last_rewrite_at {
                let min_gap = Duration::from_millis(self.config.min_rewrite_interval_ms);
                if now.duration_since(last) < min_gap {
                    return Vec::new();
                }
            }
            self.last_rewrite_at = Some(now);
        }

        if let Some(last) = self.last_patch_at {
            let min_gap = Duration::from_secs_f64(1.0 / self.config.patch_max_hz.max(0.001));
            if now.duration_since(last) < min_gap {
                return Vec::new();
            }
        }

        let insert: String = hyp_chars[common..].iter().collect();
        self.last_patch_at = Some(now);
        self.pending_candidate = None;
        self.pending_count = 0;
        self.shown = hypothesis.to_string();
        self.seq += 1;

        self.chunk_patch(deleted_chars, &insert, now)
    }

    fn chunk_patch(&self, delete: usize, insert: &str, now: Instant) -> Vec<Patch> {
        let t_ms = now.duration_since(self.start).as_millis() as u64;
        let chars: Vec<char> = insert.chars().collect();

        if chars.len() <= self.config.micro_max_chars {
            return vec![Patch {
                delete,
                insert: insert.to_string(),
                seq: self.seq,
                t_ms,
                continuation: false,
            }];
        }

        let mut slices = Vec::new();
        let mut i = 0;
        while i < chars.len() {
            let mut end = (i + self.config.micro_max_chars).min(chars.len());
            if chars.len() - end < self.config.micro_min_slice_chars {
                end = chars.len();
            }
            slices.push(chars[i..end].iter().collect::<String>());
            i = end;
        }

        let last_idx = slices.len() - 1;
        slices
            .into_iter()
            .enumerate()
            .map(|(idx, text)| Patch {
                delete: if idx == 0 { delete } else { 0 },
                insert: text,
                seq: self.seq,
                t_ms,
                continuation: idx != last_idx,
            })
            .collect()
    }
}

fn common_prefix_len(a: &[char], b: &[char]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

fn is_punct(c: char) -> bool {
    matches!(c, '.' | ',' | '!' | '?' | ';' | ':')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> StabilizerConfig {
        StabilizerConfig {
            max_rollback_chars: 10,
            min_rewrite_interval_ms: 0,
            rewrite_confirm_n: 2,
            patch_max_hz: 1_000_000.0,
            ignore_shrink: true,
            micro_max_chars: 48,
            micro_min_slice_chars: 12,
        }
    }

    #[test]
    fn pure_append_emits_immediately() {
        let mut s = StabilizerState::new(config(), Instant::now());
        let patches = s.process("hello", Instant::now());
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].delete, 0);
        assert_eq!(patches[0].insert, "hello");

        let patches = s.process("hello world", Instant::now());
        assert_eq!(patches[0].delete, 0);
        assert_eq!(patches[0].insert, " world");
    }

    #[test]
    fn shrink_is_ignored_by_default() {
        let mut s = StabilizerState::new(config(), Instant::now());
        s.process("hello world", Instant::now());
        let patches = s.process("hello", Instant::now());
        assert!(patches.is_empty());
        assert_eq!(s.shown(), "hello world");
    }

    #[test]
    fn rewrite_requires_confirm_n_identical_candidates() {
        let mut s = StabilizerState::new(config(), Instant::now());
        s.process("hello therx", Instant::now());
        // first rewrite candidate: not yet confirmed
        let patches = s.process("hello there", Instant::now());
        assert!(patches.is_empty());
        assert_eq!(s.shown(), "hello therx");
        // same candidate repeated: confirmed
        let patches = s.process("hello there", Instant::now());
        assert_eq!(patches.len(), 1);
        assert_eq!(s.shown(), "hello there");
    }

    #[test]
    fn rewrite_beyond_max_rollback_is_rejected() {
        let mut s = StabilizerState::new(config(), Instant::now());
        s.process("this is a long stable sentence", Instant::now());
        let patches = s.process("completely different text entirely", Instant::now());
        assert!(patches.is_empty());
        assert_eq!(s.shown(), "this is a long stable sentence");
    }

    #[test]
    fn large_insert_is_chunked_with_continuation() {
        let mut cfg = config();
        cfg.micro_max_chars = 5;
        cfg.micro_min_slice_chars = 2;
        let mut s = StabilizerState::new(cfg, Instant::now());
        let patches = s.process("abcdefghijklmno", Instant::now());
        assert!(patches.len() > 1);
        assert!(patches.iter().take(patches.len() - 1).all(|p| p.continuation));
        assert!(!patches.last().unwrap().continuation);
        let rebuilt: String = patches.iter().map(|p| p.insert.as_str()).collect();
        assert_eq!(rebuilt, "abcdefghijklmno");
    }

    #[test]
    fn identical_hypothesis_produces_no_patch() {
        let mut s = StabilizerState::new(config(), Instant::now());
        s.process("same", Instant::now());
        assert!(s.process("same", Instant::now()).is_empty());
    }

    #[test]
    fn trailing_punctuation_swap_appends_immediately() {
        let mut s = StabilizerState::new(config(), Instant::now());
        s.process("hello there,", Instant::now());
        assert_eq!(s.shown(), "hello there,");
        // Diverges from `shown` only in the trailing comma; should not need
        // rewrite_confirm_n repeats to land.
        let patches = s.process("hello there and more", Instant::now());
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].delete, 1);
        assert_eq!(patches[0].insert, " and more");
        assert_eq!(s.shown(), "hello there and more");
    }

    #[test]
    fn next_stable_seq_is_monotonic() {
        let mut s = StabilizerState::new(config(), Instant::now());
        assert_eq!(s.next_stable_seq(), 1);
        assert_eq!(s.next_stable_seq(), 2);
        assert_eq!(s.next_stable_seq(), 3);
    }
}
