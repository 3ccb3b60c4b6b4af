//! The speech-to-text engine boundary (§4.3-§4.5).
//!
//! The actual recognition engine is an external collaborator (spec §1): this
//! crate only defines the trait seam it plugs into and a deterministic mock
//! used by tests and local development. Decoupling behind a trait rather
//! than a concrete engine type mirrors the teacher's `EventEmitter` seam in
//! `events/emitter.rs`.

use async_trait::async_trait;

use crate::error::SttError;

/// One recognition update. `text` is the ENTIRE current hypothesis, not a
/// delta — the stabilizer (§4.5) is responsible for diffing it against what
/// was last shown. `is_final` marks a stable segment boundary (e.g. an
/// endpointed utterance) after which `text` will not be revised further.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hypothesis {
    pub text: String,
    pub is_final: bool,
}

/// Engine seam fed 20 ms mono `f32` frames at 16 kHz.
#[async_trait]
pub trait SttRecorder: Send {
    /// Loads models / allocates engine state. Called once before `feed`.
    async fn init(&mut self) -> Result<(), SttError>;

    /// Feeds one frame and returns the engine's current hypothesis, if it
    /// changed.
    fn feed(&mut self, frame: &[f32]) -> Option<Hypothesis>;

    /// Flushes any buffered audio (e.g. on EOS) and returns the final
    /// hypothesis, if any.
    fn flush(&mut self) -> Option<Hypothesis>;
}

/// Deterministic stand-in recognizer for tests and local development: it
/// accumulates frame energy and emits a fixed vocabulary token every time a
/// configurable number of non-silent frames has been seen, without ever
/// revising previously emitted words. Useful for exercising the ingress,
/// resample, and stabilizer layers without a real model.
pub struct MockRecorder {
    frames_per_word: usize,
    vocabulary: Vec<&'static str>,
    silence_threshold: f32,
    voiced_frames: usize,
    words: Vec<&'static str>,
}

impl MockRecorder {
    #[must_use]
    pub fn new(frames_per_word: usize) -> Self {
        Self {
            frames_per_word: frames_per_word.max(1),
            vocabulary: vec!["testing", "one", "two", "three", "speech", "stream"],
            silence_threshold: 0.01,
            voiced_frames: 0,
            words: Vec::new(),
        }
    }

    fn current_text(&self) -> String {
        self.words.join(" ")
    }
}

#[async_trait]
impl SttRecorder for MockRecorder {
    async fn init(&mut self) -> Result<(), SttError> {
        Ok(())
    }

    fn feed(&mut self, frame: &[f32]) -> Option<Hypothesis> {
        let energy = frame.iter().map(|s| s.abs()).sum::<f32>() / frame.len().max(1) as f32;
        if energy < self.silence_threshold {
            return None;
        }
        self.voiced_frames += 1;
        if self.voiced_frames % self.frames_per_word != 0 {
            return None;
        }
        let next = self.vocabulary[self.words.len() % self.vocabulary.len()];
        self.words.push(next);
        Some(Hypothesis {
            text: self.current_text(),
            is_final: false,
        })
    }

    fn flush(&mut self) -> Option<Hypothesis> {
        if self.words.is_empty() {
            return None;
        }
        Some(Hypothesis {
            text: self.current_text(),
            is_final: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voiced_frame() -> Vec<f32> {
        vec![0.5; 320]
    }

    fn silent_frame() -> Vec<f32> {
        vec![0.0; 320]
    }

    #[tokio::test]
    async fn mock_emits_a_word_every_n_voiced_frames() {
        let mut rec = MockRecorder::new(3);
        rec.init().await.unwrap();
        assert!(rec.feed(&voiced_frame()).is_none());
        assert!(rec.feed(&voiced_frame()).is_none());
        let hyp = rec.feed(&voiced_frame()).unwrap();
        assert_eq!(hyp.text, "testing");
        assert!(!hyp.is_final);
    }

    #[tokio::test]
    async fn mock_ignores_silence() {
        let mut rec = MockRecorder::new(1);
        rec.init().await.unwrap();
        assert!(rec.feed(&silent_frame()).is_none());
        assert_eq!(rec.flush(), None);
    }

    #[tokio::test]
    async fn flush_marks_final() {
        let mut rec = MockRecorder::new(1);
        rec.init().await.unwrap();
        rec.feed(&voiced_frame());
        let hyp = rec.flush().unwrap();
        assert!(hyp.is_final);
        assert_eq!(hyp.text, "testing");
    }
}
