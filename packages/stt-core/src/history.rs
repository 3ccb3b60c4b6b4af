//! Transcript history persistence (§4.10).
//!
//! Two modes, selected by [`crate::config::HistoryMode`]:
//! - `LinePerSentence` appends each newly completed sentence as its own
//!   line, so the file only ever grows and can be tailed.
//! - `ByteExactMirror` truncates and rewrites the file to exactly match the
//!   current shown transcript on every stable update — simpler to reason
//!   about, more I/O.
//!
//! Persistence is disabled entirely when no path is configured.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use regex::Regex;

use crate::config::{HistoryConfig, HistoryMode};
use crate::error::SttError;

fn sentence_boundary_re() -> Regex {
    Regex::new(r"[.!?]+\s+").expect("static sentence-boundary regex is valid")
}

/// Writes session transcript history to disk.
pub struct HistoryWriter {
    file: File,
    mode: HistoryMode,
    boundary_re: Regex,
    sentences_written: usize,
}

impl HistoryWriter {
    /// Opens (or creates) the history file at `config.path`. Returns `None`
    /// if history persistence is disabled (no path configured).
    pub fn open(config: &HistoryConfig) -> Result<Option<Self>, SttError> {
        let Some(path) = &config.path else {
            return Ok(None);
        };
        let file = open_for_mode(path, config.mode)?;
        Ok(Some(Self {
            file,
            mode: config.mode,
            boundary_re: sentence_boundary_re(),
            sentences_written: 0,
        }))
    }

    /// Call on every stable-text update with the full current shown text.
    pub fn on_stable(&mut self, full_text: &str) -> Result<(), SttError> {
        match self.mode {
            HistoryMode::ByteExactMirror => self.mirror(full_text),
            HistoryMode::LinePerSentence => self.append_new_sentences(full_text),
        }
    }

    /// Resets persisted history, honoring `history_clear_on_reset`'s config
    /// surface (the caller decides whether to invoke this at all).
    pub fn clear(&mut self) -> Result<(), SttError> {
        self.file
            .set_len(0)
            .and_then(|()| self.file.seek(SeekFrom::Start(0)))
            .map_err(|err| SttError::Internal(err.to_string()))?;
        self.sentences_written = 0;
        Ok(())
    }

    fn mirror(&mut self, full_text: &str) -> Result<(), SttError> {
        self.file
            .set_len(0)
            .and_then(|()| self.file.seek(SeekFrom::Start(0)))
            .and_then(|_| self.file.write_all(full_text.as_bytes()))
            .and_then(|()| self.file.sync_data())
            .map_err(|err| SttError::Internal(err.to_string()))
    }

    fn append_new_sentences(&mut self, full_text: &str) -> Result<(), SttError> {
        let mut ends: Vec<usize> = self
            .boundary_re
            .find_iter(full_text)
            .map(|m| m.end())
            .collect();
        ends.push(full_text.len());

        let sentences: Vec<&str> = {
            let mut start = 0;
            let mut out = Vec::new();
            for end in &ends {
                let slice = full_text[start..*end].trim();
                if !slice.is_empty() {
                    out.push(slice);
                }
                start = *end;
            }
            out
        };

        // The final entry may be an incomplete trailing fragment (no
        // terminal punctuation yet); only persist it once a later call
        // shows it followed by more text, i.e. once it's no longer last.
        let complete_count = if full_text.ends_with(['.', '!', '?'])
            || full_text.trim().is_empty()
        {
            sentences.len()
        } else {
            sentences.len().saturating_sub(1)
        };

        if complete_count <= self.sentences_written {
            return Ok(());
        }

        let mut buf = String::new();
        for sentence in &sentences[self.sentences_written..complete_count] {
            buf.push_str(sentence);
            buf.push('\n');
        }
        self.file
            .write_all(buf.as_bytes())
            .and_then(|()| self.file.sync_data())
            .map_err(|err| SttError::Internal(err.to_string()))?;
        self.sentences_written = complete_count;
        Ok(())
    }
}

fn open_for_mode(path: &Path, mode: HistoryMode) -> Result<File, SttError> {
    let mut options = OpenOptions::new();
    options.create(true).read(true).write(true);
    match mode {
        HistoryMode::LinePerSentence => options.append(true),
        HistoryMode::ByteExactMirror => options.truncate(false),
    };
    options
        .open(path)
        .map_err(|err| SttError::Internal(format!("opening history file: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read as _;

    fn read_all(path: &Path) -> String {
        let mut s = String::new();
        File::open(path).unwrap().read_to_string(&mut s).unwrap();
        s
    }

    #[test]
    fn disabled_when_no_path_configured() {
        let config = HistoryConfig::default();
        assert!(HistoryWriter::open(&config).unwrap().is_none());
    }

    #[test]
    fn line_per_sentence_appends_only_complete_sentences() {
        let dir = tempfile_dir();
        let path = dir.join("history.txt");
        let config = HistoryConfig {
            path: Some(path.clone()),
            mode: HistoryMode::LinePerSentence,
        };
        let mut writer = HistoryWriter::open(&config).unwrap().unwrap();

        writer.on_stable("Hello there. How are").unwrap();
        let contents = read_all(&path);
        assert_eq!(contents, "Hello there.\n");

        writer.on_stable("Hello there. How are you?").unwrap();
        let contents = read_all(&path);
        assert_eq!(contents, "Hello there.\nHow are you?\n");
    }

    #[test]
    fn byte_exact_mirror_rewrites_whole_file() {
        let dir = tempfile_dir();
        let path = dir.join("history.txt");
        let config = HistoryConfig {
            path: Some(path.clone()),
            mode: HistoryMode::ByteExactMirror,
        };
        let mut writer = HistoryWriter::open(&config).unwrap().unwrap();

        writer.on_stable("hello").unwrap();
        assert_eq!(read_all(&path), "hello");
        writer.on_stable("hello world").unwrap();
        assert_eq!(read_all(&path), "hello world");
    }

    #[test]
    fn clear_truncates_file_and_resets_counters() {
        let dir = tempfile_dir();
        let path = dir.join("history.txt");
        let config = HistoryConfig {
            path: Some(path.clone()),
            mode: HistoryMode::LinePerSentence,
        };
        let mut writer = HistoryWriter::open(&config).unwrap().unwrap();
        writer.on_stable("Done.").unwrap();
        writer.clear().unwrap();
        assert_eq!(read_all(&path), "");
        writer.on_stable("Done.").unwrap();
        assert_eq!(read_all(&path), "Done.\n");
    }

    fn tempfile_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "stt-core-history-test-{}-{}",
            std::process::id(),
            uuid::Uuid::new_v4()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
