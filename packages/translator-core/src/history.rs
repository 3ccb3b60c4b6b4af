//! Vietnamese transcript history persistence (§4.10).
//!
//! Same two modes as Service A's history writer (line-per-sentence,
//! byte-exact mirror), applied here to the session's `vi_full` text instead
//! of the STT `shown` text. Whether a `reset` message clears the file is a
//! config toggle (`history_clear_on_reset`), not automatic.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use regex::Regex;

use crate::config::{HistoryConfig, HistoryMode};
use crate::error::TranslatorError;

fn sentence_boundary_re() -> Regex {
    Regex::new(r"[.!?]+\s+").expect("static sentence-boundary regex is valid")
}

/// Writes session translation history to disk.
pub struct HistoryWriter {
    file: File,
    mode: HistoryMode,
    boundary_re: Regex,
    sentences_written: usize,
    clear_on_reset: bool,
}

impl HistoryWriter {
    /// Opens (or creates) the history file at `config.path`. Returns `None`
    /// if history persistence is disabled (no path configured).
    pub fn open(config: &HistoryConfig) -> Result<Option<Self>, TranslatorError> {
        let Some(path) = &config.path else {
            return Ok(None);
        };
        let file = open_for_mode(path, config.mode)?;
        Ok(Some(Self {
            file,
            mode: config.mode,
            boundary_re: sentence_boundary_re(),
            sentences_written: 0,
            clear_on_reset: config.clear_on_reset,
        }))
    }

    /// Call on every `vi_full` update (a new commit appended).
    pub fn on_update(&mut self, vi_full: &str) -> Result<(), TranslatorError> {
        match self.mode {
            HistoryMode::ByteExactMirror => self.mirror(vi_full),
            HistoryMode::LinePerSentence => self.append_new_sentences(vi_full),
        }
    }

    /// Clears persisted history, if `clear_on_reset` is configured.
    pub fn on_reset(&mut self) -> Result<(), TranslatorError> {
        if self.clear_on_reset {
            self.clear()?;
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<(), TranslatorError> {
        self.file
            .set_len(0)
            .and_then(|()| self.file.seek(SeekFrom::Start(0)))
            .map_err(|err| TranslatorError::Internal(err.to_string()))?;
        self.sentences_written = 0;
        Ok(())
    }

    fn mirror(&mut self, full_text: &str) -> Result<(), TranslatorError> {
        self.file
            .set_len(0)
            .and_then(|()| self.file.seek(SeekFrom::Start(0)))
            .and_then(|_| self.file.write_all(full_text.as_bytes()))
            .and_then(|()| self.file.sync_data())
            .map_err(|err| TranslatorError::Internal(err.to_string()))
    }

    fn append_new_sentences(&mut self, full_text: &str) -> Result<(), TranslatorError> {
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

        let complete_count = if full_text.ends_with(['.', '!', '?']) || full_text.trim().is_empty()
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
            .map_err(|err| TranslatorError::Internal(err.to_string()))?;
        self.sentences_written = complete_count;
        Ok(())
    }
}

fn open_for_mode(path: &Path, mode: HistoryMode) -> Result<File, TranslatorError> {
    let mut options = OpenOptions::new();
    options.create(true).read(true).write(true);
    match mode {
        HistoryMode::LinePerSentence => options.append(true),
        HistoryMode::ByteExactMirror => options.truncate(false),
    };
    options
        .open(path)
        .map_err(|err| TranslatorError::Internal(format!("opening history file: {err}")))
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
            clear_on_reset: false,
        };
        let mut writer = HistoryWriter::open(&config).unwrap().unwrap();

        writer.on_update("Xin chao. Ban khoe").unwrap();
        let contents = read_all(&path);
        assert_eq!(contents, "Xin chao.\n");

        writer.on_update("Xin chao. Ban khoe khong?").unwrap();
        let contents = read_all(&path);
        assert_eq!(contents, "Xin chao.\nBan khoe khong?\n");
    }

    #[test]
    fn byte_exact_mirror_rewrites_whole_file() {
        let dir = tempfile_dir();
        let path = dir.join("history.txt");
        let config = HistoryConfig {
            path: Some(path.clone()),
            mode: HistoryMode::ByteExactMirror,
            clear_on_reset: false,
        };
        let mut writer = HistoryWriter::open(&config).unwrap().unwrap();

        writer.on_update("hello").unwrap();
        assert_eq!(read_all(&path), "hello");
        writer.on_update("hello world").unwrap();
        assert_eq!(read_all(&path), "hello world");
    }

    #[test]
    fn reset_clears_only_when_configured() {
        let dir = tempfile_dir();
        let path = dir.join("history.txt");
        let config = HistoryConfig {
            path: Some(path.clone()),
            mode: HistoryMode::LinePerSentence,
            clear_on_reset: true,
        };
        let mut writer = HistoryWriter::open(&config).unwrap().unwrap();
        writer.on_update("Done.").unwrap();
        writer.on_reset().unwrap();
        assert_eq!(read_all(&path), "");
    }

    #[test]
    fn reset_is_a_noop_when_not_configured() {
        let dir = tempfile_dir();
        let path = dir.join("history.txt");
        let config = HistoryConfig {
            path: Some(path.clone()),
            mode: HistoryMode::LinePerSentence,
            clear_on_reset: false,
        };
        let mut writer = HistoryWriter::open(&config).unwrap().unwrap();
        writer.on_update("Done.").unwrap();
        writer.on_reset().unwrap();
        assert_eq!(read_all(&path), "Done.\n");
    }

    fn tempfile_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "translator-core-history-test-{}-{}",
            std::process::id(),
            uuid::Uuid::new_v4()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
