//! Commit/draft segmenter for the incoming (English) text stream (§4.6).
//!
//! Unlike the stabilizer on the producing side, the segmenter's input can be
//! rewritten non-monotonically anywhere, not just at the tail: an upstream
//! re-decision can change words that were already committed to. The
//! committed boundary `buf_start` (a char offset into the rolling
//! `base_full`) must never retreat, so a non-prefix rewrite has to be
//! reconciled against it via re-anchoring before any new commit can fire.

use std::time::{Duration, Instant};

use crate::config::SegmenterConfig;

const SENTENCE_PUNCT: &[char] = &['.', '!', '?', '…', ';', ':'];

/// One committed English segment, popped left-to-right out of the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSegment {
    pub en_seq: u64,
    pub text: String,
}

/// Output of feeding one upstream update through the segmenter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentResult {
    pub commits: Vec<CommitSegment>,
    /// A safe preview of the still-uncommitted tail, or `None` if nothing
    /// new and draft-worthy is available.
    pub draft: Option<String>,
}

/// Running segmenter state for one session.
pub struct SegmenterState {
    config: SegmenterConfig,
    base_full: String,
    buf_start: usize,
    en_seq: u64,
    punct_candidate: Option<(usize, Instant)>,
    punct_hits: u32,
    beat_candidate: Option<String>,
    beat_hits: u32,
    last_rx: Instant,
}

impl SegmenterState {
    #[must_use]
    pub fn new(config: SegmenterConfig, now: Instant) -> Self {
        Self {
            config,
            base_full: String::new(),
            buf_start: 0,
            en_seq: 0,
            punct_candidate: None,
            punct_hits: 0,
            beat_candidate: None,
            beat_hits: 0,
            last_rx: now,
        }
    }

    /// Clears all session state, as if the connection had just opened.
    pub fn reset(&mut self, now: Instant) {
        self.base_full.clear();
        self.buf_start = 0;
        self.en_seq = 0;
        self.punct_candidate = None;
        self.punct_hits = 0;
        self.beat_candidate = None;
        self.beat_hits = 0;
        self.last_rx = now;
    }

    /// Applies a patch (delete from tail, then append) to `base_full`, then
    /// re-anchors and runs commit triggers.
    pub fn apply_patch(&mut self, delete: usize, insert: &str, now: Instant) -> SegmentResult {
        let mut chars: Vec<char> = self.base_full.chars().collect();
        let new_len = chars.len().saturating_sub(delete);
        chars.truncate(new_len);
        chars.extend(insert.chars());
        let new_full: String = chars.into_iter().collect();
        self.ingest(new_full, now)
    }

    /// Applies a full snapshot (`stable` or `baseline`) to `base_full`, then
    /// re-anchors and runs commit triggers.
    pub fn apply_full(&mut self, full: &str, now: Instant) -> SegmentResult {
        self.ingest(full.to_string(), now)
    }

    /// Character length of the upstream text received so far.
    #[must_use]
    pub fn full_len(&self) -> usize {
        self.base_full.chars().count()
    }

    /// Re-runs commit triggers against the undelayed text after a period of
    /// silence, flushing whatever translate-lag was withholding.
    pub fn release_if_idle(&mut self, now: Instant) -> SegmentResult {
        let idle = now.duration_since(self.last_rx);
        if idle < Duration::from_millis(self.config.release_after_silence_ms) {
            return SegmentResult::default();
        }
        self.run_commit_triggers(&self.base_full.clone(), now, true)
    }

    fn ingest(&mut self, new_full: String, now: Instant) -> SegmentResult {
        self.last_rx = now;
        self.reconcile_buf_start(&new_full);
        self.base_full = new_full;

        let view = drop_last_n_words(&self.base_full, self.config.translate_lag_words);
        self.run_commit_triggers(&view, now, false)
    }

    /// Ensures `buf_start` still points at a valid, never-retreating boundary
    /// in `new_full`, re-anchoring on the committed tail if the rewrite
    /// reached into already-committed text.
    fn reconcile_buf_start(&mut self, new_full: &str) {
        let old_chars: Vec<char> = self.base_full.chars().collect();
        let new_chars: Vec<char> = new_full.chars().collect();
        let lcp = common_prefix_len(&old_chars, &new_chars);

        if lcp >= self.buf_start {
            // Rewrite only touched the uncommitted tail; boundary unaffected.
            return;
        }

        let committed: String = old_chars[..self.buf_start].iter().collect();

        if let Some(new_start) = reanchor_by_tail(&committed, new_full, self.config.reanchor_max_tail_chars) {
            self.buf_start = new_start;
            return;
        }

        if let Some(new_start) = reanchor_by_words(&committed, new_full) {
            self.buf_start = new_start;
            return;
        }

        if let Some(new_start) = suffix_prefix_overlap(&committed, new_full, self.buf_start) {
            self.buf_start = new_start;
            return;
        }

        // Hard rewrite: keep only the tail, but never retreat the boundary.
        let hard_start = new_chars
            .len()
            .saturating_sub(self.config.hard_rewrite_tail_chars);
        self.buf_start = hard_start.max(self.buf_start.min(new_chars.len()));
    }

    fn run_commit_triggers(&mut self, view: &str, now: Instant, is_release: bool) -> SegmentResult {
        let mut commits = Vec::new();
        let view_chars: Vec<char> = view.chars().collect();

        loop {
            let buf_start = self.buf_start.min(view_chars.len());
            let buf: String = view_chars[buf_start..].iter().collect();
            if buf.is_empty() {
                break;
            }

            if let Some(end) = self.try_punctuation_commit(&buf, now) {
                commits.push(self.commit(&buf[..end], buf_start));
                continue;
            }

            let word_count = buf.split_whitespace().count();
            let pause_elapsed = now.duration_since(self.last_rx);
            let pause_ready = is_release
                || (pause_elapsed >= Duration::from_millis(self.config.seg_pause_ms)
                    && word_count >= self.config.seg_min_words);

            if pause_ready && word_count >= self.config.seg_min_words {
                let cut = word_boundary_cut(&buf, buf.chars().count());
                if cut > 0 {
                    commits.push(self.commit(&buf[..cut], buf_start));
                    continue;
                }
            }

            if word_count > self.config.seg_max_words || buf.chars().count() > self.config.seg_max_chars {
                let target = self
                    .config
                    .seg_max_chars
                    .min(buf.chars().count().saturating_sub(1).max(1));
                let cut = word_boundary_cut(&buf, target);
                if cut > 0 {
                    commits.push(self.commit(&buf[..cut], buf_start));
                    continue;
                }
            }

            if let Some(cut) = self.try_beat_commit(&buf) {
                commits.push(self.commit(&buf[..cut], buf_start));
                continue;
            }

            break;
        }

        let draft = self.safe_draft(&view_chars);
        SegmentResult { commits, draft }
    }

    fn commit(&mut self, text: &str, buf_start_before: usize) -> CommitSegment {
        self.buf_start = buf_start_before + text.chars().count();
        self.en_seq += 1;
        self.punct_candidate = None;
        self.punct_hits = 0;
        self.beat_candidate = None;
        self.beat_hits = 0;
        CommitSegment {
            en_seq: self.en_seq,
            text: text.to_string(),
        }
    }

    fn try_punctuation_commit(&mut self, buf: &str, now: Instant) -> Option<usize> {
        let idx = buf.find(SENTENCE_PUNCT)?;
        let end = idx + buf[idx..].chars().next().map(char::len_utf8).unwrap_or(1);

        match self.punct_candidate {
            Some((prev_end, first_seen)) if prev_end == end => {
                self.punct_hits += 1;
                let waited = now.duration_since(first_seen);
                if self.punct_hits >= self.config.punct_stable_count
                    || waited >= Duration::from_millis(self.config.punct_max_wait_ms)
                {
                    return Some(end);
                }
            }
            _ => {
                self.punct_candidate = Some((end, now));
                self.punct_hits = 1;
                if self.config.punct_stable_count <= 1 {
                    return Some(end);
                }
            }
        }
        None
    }

    fn try_beat_commit(&mut self, buf: &str) -> Option<usize> {
        let cut = word_boundary_cut(buf, buf.chars().count().saturating_sub(1));
        if cut < self.config.beat_min_chars {
            return None;
        }
        let candidate = buf[..cut].to_string();

        if self.beat_candidate.as_deref() == Some(candidate.as_str()) {
            self.beat_hits += 1;
        } else {
            self.beat_candidate = Some(candidate.clone());
            self.beat_hits = 1;
        }

        if self.beat_hits >= self.config.beat_stable_count {
            Some(cut)
        } else {
            None
        }
    }

    fn safe_draft(&self, view_chars: &[char]) -> Option<String> {
        let buf_start = self.buf_start.min(view_chars.len());
        let tail: String = view_chars[buf_start..].iter().collect();
        let trimmed = tail.trim();
        if trimmed.chars().count() < 2 {
            return None;
        }
        if trimmed.chars().all(|c| !c.is_alphanumeric()) {
            return None;
        }
        let lower = trimmed.to_lowercase();
        let last_word = lower.split_whitespace().last().unwrap_or("");
        if matches!(
            last_word,
            "a" | "an" | "the" | "and" | "or" | "but" | "of" | "to" | "in" | "on" | "at" | "for"
        ) {
            return None;
        }
        Some(trimmed.to_string())
    }
}

/// Cuts `s` at the nearest whitespace boundary at or before `target_chars`.
fn word_boundary_cut(s: &str, target_chars: usize) -> usize {
    let chars: Vec<char> = s.chars().collect();
    if chars.is_empty() {
        return 0;
    }
    let target = target_chars.min(chars.len());
    if target == chars.len() && chars.last().is_some_and(|c| c.is_whitespace()) {
        return byte_len_of(&chars, target);
    }
    let mut cut = target;
    while cut > 0 && !chars[cut - 1].is_whitespace() {
        cut -= 1;
    }
    if cut == 0 {
        // No boundary before target; don't cut mid-word unless we must.
        if target == chars.len() {
            return byte_len_of(&chars, target);
        }
        return 0;
    }
    byte_len_of(&chars, cut)
}

fn byte_len_of(chars: &[char], n: usize) -> usize {
    chars[..n].iter().map(|c| c.len_utf8()).sum()
}

fn common_prefix_len(a: &[char], b: &[char]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

/// Finds the last occurrence of `committed`'s trailing `max_tail_chars` as a
/// substring of `new_full`, returning the char offset just past the match.
fn reanchor_by_tail(committed: &str, new_full: &str, max_tail_chars: usize) -> Option<usize> {
    let committed_chars: Vec<char> = committed.chars().collect();
    if committed_chars.is_empty() {
        return None;
    }
    let start = committed_chars.len().saturating_sub(max_tail_chars);
    let tail: String = committed_chars[start..].iter().collect();
    if tail.trim().is_empty() {
        return None;
    }

    let new_chars: Vec<char> = new_full.chars().collect();
    let tail_chars: Vec<char> = tail.chars().collect();
    let match_start = find_char_subslice(&new_chars, &tail_chars)?;
    Some(match_start + tail_chars.len())
}

/// Word-sequence re-anchor: matches the committed tail's last few
/// punctuation-stripped words against `new_full`'s tokens.
fn reanchor_by_words(committed: &str, new_full: &str) -> Option<usize> {
    const TAIL_WORDS: usize = 4;
    let committed_words: Vec<String> = clean_words(committed);
    if committed_words.is_empty() {
        return None;
    }
    let take = TAIL_WORDS.min(committed_words.len());
    let needle = &committed_words[committed_words.len() - take..];

    let new_words: Vec<(usize, String)> = word_spans(new_full);
    if new_words.len() < take {
        return None;
    }

    for window_start in 0..=(new_words.len() - take) {
        let window = &new_words[window_start..window_start + take];
        if window.iter().map(|(_, w)| w.as_str()).eq(needle.iter().map(String::as_str)) {
            let (end_idx, _) = &window[take - 1];
            return Some(*end_idx);
        }
    }
    None
}

/// Longest suffix-of-committed / prefix-of-new overlap at a whitespace
/// boundary, clamped to never retreat before `min_start`.
fn suffix_prefix_overlap(committed: &str, new_full: &str, min_start: usize) -> Option<usize> {
    let committed_chars: Vec<char> = committed.chars().collect();
    let new_chars: Vec<char> = new_full.chars().collect();

    let max_len = committed_chars.len().min(new_chars.len());
    for len in (1..=max_len).rev() {
        let suffix = &committed_chars[committed_chars.len() - len..];
        let prefix = &new_chars[..len];
        if suffix == prefix {
            return Some(len.max(min_start));
        }
    }
    None
}

fn find_char_subslice(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).rev().find(|&i| haystack[i..i + needle.len()] == *needle)
}

fn clean_words(s: &str) -> Vec<String> {
    s.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Word tokens of `s` paired with the char offset just past each token.
fn word_spans(s: &str) -> Vec<(usize, String)> {
    let chars: Vec<char> = s.chars().collect();
    let mut spans = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        let start = i;
        while i < chars.len() && !chars[i].is_whitespace() {
            i += 1;
        }
        if i > start {
            let cleaned: String = chars[start..i]
                .iter()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            if !cleaned.is_empty() {
                spans.push((i, cleaned));
            }
        }
    }
    spans
}

/// Drops the trailing `n` word tokens from `s`, returning the remaining
/// prefix (translate-lag-by-N-words).
fn drop_last_n_words(s: &str, n: usize) -> String {
    if n == 0 {
        return s.to_string();
    }
    let spans = word_spans(s);
    if spans.len() <= n {
        return String::new();
    }
    let (end_idx, _) = spans[spans.len() - n - 1];
    s.chars().take(end_idx).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SegmenterConfig {
        SegmenterConfig {
            reanchor_max_tail_chars: 24,
            hard_rewrite_tail_chars: 64,
            punct_stable_count: 1,
            punct_max_wait_ms: 900,
            seg_pause_ms: 600,
            seg_min_words: 3,
            seg_max_words: 12,
            seg_max_chars: 90,
            beat_stable_count: 3,
            beat_min_chars: 8,
            translate_lag_words: 0,
            release_after_silence_ms: 1_200,
        }
    }

    #[test]
    fn punctuation_commits_a_sentence() {
        let mut seg = SegmenterState::new(config(), Instant::now());
        let result = seg.apply_full("Hello there.", Instant::now());
        assert_eq!(result.commits.len(), 1);
        assert_eq!(result.commits[0].text, "Hello there.");
        assert_eq!(result.commits[0].en_seq, 1);
    }

    #[test]
    fn no_recommit_of_the_same_range() {
        let mut seg = SegmenterState::new(config(), Instant::now());
        seg.apply_full("Hello there.", Instant::now());
        let result = seg.apply_full("Hello there. And more.", Instant::now());
        assert_eq!(result.commits.len(), 1);
        assert_eq!(result.commits[0].text, " And more.");
    }

    #[test]
    fn buf_start_never_retreats_on_reset_free_session() {
        let mut seg = SegmenterState::new(config(), Instant::now());
        seg.apply_full("one two three.", Instant::now());
        let before = seg.buf_start;
        seg.apply_full("one two three. four five six", Instant::now());
        assert!(seg.buf_start >= before);
    }

    #[test]
    fn reset_clears_committed_boundary() {
        let mut seg = SegmenterState::new(config(), Instant::now());
        seg.apply_full("Hello there.", Instant::now());
        assert!(seg.buf_start > 0);
        seg.reset(Instant::now());
        assert_eq!(seg.buf_start, 0);
        assert_eq!(seg.base_full, "");
    }

    #[test]
    fn reanchor_on_mid_text_rewrite_does_not_recommit() {
        let mut seg = SegmenterState::new(config(), Instant::now());
        let first = seg.apply_full("I went to the store.", Instant::now());
        assert_eq!(first.commits.len(), 1);
        let before = seg.buf_start;

        // Upstream retroactively corrects an already-committed word.
        let result = seg.apply_full(
            "I went to the shop. And then I came home.",
            Instant::now(),
        );
        assert!(seg.buf_start >= before);
        assert!(!result
            .commits
            .iter()
            .any(|c| c.text.contains("I went to the shop")));
    }

    #[test]
    fn max_chars_trigger_chunks_a_long_buffer() {
        let mut cfg = config();
        cfg.seg_max_chars = 20;
        cfg.seg_max_words = 3;
        let mut seg = SegmenterState::new(cfg, Instant::now());
        let result = seg.apply_full(
            "one two three four five six seven eight nine ten",
            Instant::now(),
        );
        assert!(!result.commits.is_empty());
    }

    #[test]
    fn draft_is_none_when_buffer_ends_in_preposition() {
        let mut cfg = config();
        cfg.punct_stable_count = 100;
        let mut seg = SegmenterState::new(cfg, Instant::now());
        let result = seg.apply_full("I am going to", Instant::now());
        assert!(result.draft.is_none());
    }

    #[test]
    fn translate_lag_withholds_trailing_words_until_release() {
        let mut cfg = config();
        cfg.translate_lag_words = 2;
        cfg.punct_stable_count = 100;
        cfg.seg_min_words = 100;
        let mut seg = SegmenterState::new(cfg, Instant::now());
        let result = seg.apply_full("hello there friend", Instant::now());
        assert_eq!(result.draft.as_deref(), Some("hello"));
    }
}
