//! Commit and draft translation workers (§4.7).
//!
//! The commit worker drains a bounded FIFO of committed English segments in
//! batches and appends the result to `vi_full` append-only. The draft worker
//! instead holds a single slot: newer drafts simply overwrite older,
//! unsent ones, and every result is epoch-gated against the session's
//! current `draft_req_id` so a slow draft translation can never clobber a
//! newer one (or one invalidated by an intervening commit).

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::WorkerConfig;
use crate::segmenter::CommitSegment;
use crate::translator::{Quality, Translator};

/// Appends `piece` to `vi_full` with a separating space unless `vi_full` is
/// empty or `piece` starts with punctuation that shouldn't be space-led.
pub fn append_vi(vi_full: &mut String, piece: &str) {
    if piece.is_empty() {
        return;
    }
    if !vi_full.is_empty()
        && !vi_full.ends_with(char::is_whitespace)
        && !piece.starts_with(['.', ',', '!', '?', ';', ':'])
    {
        vi_full.push(' ');
    }
    vi_full.push_str(piece);
}

/// One translated commit ready to go out on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutput {
    pub append: String,
    pub seq: u64,
    pub en_seq: u64,
}

/// Batches and translates committed English segments, maintaining the
/// append-only Vietnamese transcript.
pub struct CommitWorker {
    config: WorkerConfig,
    vi_full: String,
    vi_seq: u64,
}

impl CommitWorker {
    #[must_use]
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            vi_full: String::new(),
            vi_seq: 0,
        }
    }

    #[must_use]
    pub fn vi_full(&self) -> &str {
        &self.vi_full
    }

    /// Translates `segments` in batches of up to `commit_batch_max`,
    /// appending each result to `vi_full` in order.
    pub async fn process(
        &mut self,
        translator: &dyn Translator,
        segments: &[CommitSegment],
    ) -> Result<Vec<CommitOutput>, crate::error::TranslatorError> {
        let mut outputs = Vec::with_capacity(segments.len());

        for batch in segments.chunks(self.config.commit_batch_max.max(1)) {
            let en_texts: Vec<String> = batch.iter().map(|s| s.text.clone()).collect();
            let vi_texts = translator.translate(&en_texts, Quality::Commit).await?;

            for (segment, vi_text) in batch.iter().zip(vi_texts) {
                append_vi(&mut self.vi_full, &vi_text);
                self.vi_seq += 1;
                outputs.push(CommitOutput {
                    append: vi_text,
                    seq: self.vi_seq,
                    en_seq: segment.en_seq,
                });
            }
        }

        Ok(outputs)
    }

    pub fn reset(&mut self) {
        self.vi_full.clear();
        self.vi_seq = 0;
    }
}

/// Monotonic draft epoch: bumped whenever a pending draft is invalidated
/// (e.g. a new commit arrives). Cheaply shared across the draft worker's
/// submit site and its eventual send site.
#[derive(Debug, Default)]
pub struct DraftEpoch {
    current: AtomicU64,
}

impl DraftEpoch {
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: AtomicU64::new(0),
        }
    }

    /// Allocates a new request id and makes it current, invalidating any
    /// prior pending draft.
    pub fn next(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Whether `req_id` is still the current (un-invalidated) draft request.
    #[must_use]
    pub fn is_current(&self, req_id: u64) -> bool {
        self.current.load(Ordering::SeqCst) == req_id
    }
}

/// Returns `true` if `text` looks like a degenerate MT output (near-empty
/// vocabulary, runaway repetition) and should be suppressed rather than
/// shown as a draft.
#[must_use]
pub fn is_garbage_draft(text: &str, config: &WorkerConfig) -> bool {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return true;
    }

    let unique: std::collections::HashSet<&str> = tokens.iter().copied().collect();
    let unique_ratio = unique.len() as f32 / tokens.len() as f32;
    if tokens.len() >= 4 && unique_ratio < config.draft_min_unique_ratio {
        return true;
    }

    let mut run = 1usize;
    let mut max_run = 1usize;
    for pair in tokens.windows(2) {
        if pair[0] == pair[1] {
            run += 1;
            max_run = max_run.max(run);
        } else {
            run = 1;
        }
    }
    if max_run > config.draft_max_repeat_run {
        return true;
    }

    let mostly_single_char = tokens.iter().filter(|t| t.chars().count() <= 1).count() as f32
        / tokens.len() as f32
        > 0.7;
    mostly_single_char && tokens.len() > 2
}

/// Translates a single draft candidate and returns the text to show, or
/// `None` if the garbage filter suppressed it (caller should send a clear).
pub async fn translate_draft(
    translator: &dyn Translator,
    config: &WorkerConfig,
    candidate: &str,
) -> Result<Option<String>, crate::error::TranslatorError> {
    if candidate.trim().is_empty() {
        return Ok(None);
    }
    let out = translator
        .translate(&[candidate.to_string()], Quality::Draft)
        .await?;
    let text = out.into_iter().next().unwrap_or_default();
    if is_garbage_draft(&text, config) {
        Ok(None)
    } else {
        Ok(Some(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translator::MockTranslator;

    fn config() -> WorkerConfig {
        WorkerConfig {
            commit_batch_max: 2,
            draft_min_unique_ratio: 0.4,
            draft_max_repeat_run: 3,
        }
    }

    #[test]
    fn append_vi_spaces_between_words() {
        let mut full = String::new();
        append_vi(&mut full, "xin chao");
        append_vi(&mut full, "ban");
        assert_eq!(full, "xin chao ban");
    }

    #[test]
    fn append_vi_no_space_before_punctuation() {
        let mut full = "xin chao".to_string();
        append_vi(&mut full, ".");
        assert_eq!(full, "xin chao.");
    }

    #[tokio::test]
    async fn commit_worker_batches_and_appends_in_order() {
        let mut worker = CommitWorker::new(config());
        let translator = MockTranslator::new();
        let segments = vec![
            CommitSegment {
                en_seq: 1,
                text: "hello".to_string(),
            },
            CommitSegment {
                en_seq: 2,
                text: "world".to_string(),
            },
            CommitSegment {
                en_seq: 3,
                text: "again".to_string(),
            },
        ];
        let outputs = worker.process(&translator, &segments).await.unwrap();
        assert_eq!(outputs.len(), 3);
        assert_eq!(outputs[0].en_seq, 1);
        assert_eq!(outputs[0].seq, 1);
        assert!(worker.vi_full().contains("hello"));
        assert!(worker.vi_full().contains("again"));
    }

    #[test]
    fn draft_epoch_invalidates_previous_request() {
        let epoch = DraftEpoch::new();
        let first = epoch.next();
        assert!(epoch.is_current(first));
        let second = epoch.next();
        assert!(!epoch.is_current(first));
        assert!(epoch.is_current(second));
    }

    #[test]
    fn garbage_filter_suppresses_repetition() {
        let cfg = config();
        assert!(is_garbage_draft("the the the the", &cfg));
        assert!(!is_garbage_draft("xin chao ban", &cfg));
    }

    #[test]
    fn garbage_filter_suppresses_empty() {
        let cfg = config();
        assert!(is_garbage_draft("", &cfg));
    }

    #[tokio::test]
    async fn translate_draft_suppresses_garbage_as_none() {
        let cfg = config();
        let translator = MockTranslator::new();
        let result = translate_draft(&translator, &cfg, "hello").await.unwrap();
        assert!(result.is_some());
        let empty = translate_draft(&translator, &cfg, "   ").await.unwrap();
        assert!(empty.is_none());
    }
}
