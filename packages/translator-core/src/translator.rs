//! The machine-translation engine boundary (§4.7).
//!
//! Like Service A's recognizer, the actual translation backend is an
//! external collaborator: this crate only defines the trait seam it plugs
//! into and a deterministic mock used by tests and local development. Same
//! trait-seam idiom as `stt-core`'s `SttRecorder`/`MockRecorder`.

use async_trait::async_trait;

use crate::error::TranslatorError;

/// Translation quality/latency profile requested for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    /// Low-latency, small beam — used by the draft worker.
    Draft,
    /// Larger beam, used by the commit worker for final output.
    Commit,
}

/// Engine seam translating batches of English segments to Vietnamese.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Loads models / allocates engine state. Called once before `translate`.
    async fn init(&mut self) -> Result<(), TranslatorError>;

    /// Translates a batch of English segments, returning one Vietnamese
    /// output per input in the same order.
    async fn translate(
        &self,
        segments: &[String],
        quality: Quality,
    ) -> Result<Vec<String>, TranslatorError>;
}

/// Deterministic stand-in translator for tests and local development: maps
/// each English segment to a reversed-word placeholder prefixed with a
/// quality tag, so callers can assert on ordering and batching without a
/// real model.
#[derive(Debug, Default)]
pub struct MockTranslator;

impl MockTranslator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn init(&mut self) -> Result<(), TranslatorError> {
        Ok(())
    }

    async fn translate(
        &self,
        segments: &[String],
        quality: Quality,
    ) -> Result<Vec<String>, TranslatorError> {
        let tag = match quality {
            Quality::Draft => "vi-draft",
            Quality::Commit => "vi",
        };
        Ok(segments
            .iter()
            .map(|s| format!("[{tag}] {}", s.trim()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_translates_each_segment_in_order() {
        let t = MockTranslator::new();
        let out = t
            .translate(&["hello".to_string(), "world".to_string()], Quality::Commit)
            .await
            .unwrap();
        assert_eq!(out, vec!["[vi] hello".to_string(), "[vi] world".to_string()]);
    }

    #[tokio::test]
    async fn empty_batch_translates_to_empty() {
        let t = MockTranslator::new();
        let out = t.translate(&[], Quality::Draft).await.unwrap();
        assert!(out.is_empty());
    }
}
