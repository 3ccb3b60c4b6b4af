//! Wire protocol for the translation streaming session (§4.6, §6).
//!
//! Upstream messages (from Service A or an equivalent producer) use
//! inconsistent field names across versions — `full` vs `stableText`,
//! `delta` vs `append`, `event` vs `type`. Rather than a single clean
//! `#[serde(tag)]` enum, `parse_upstream_message` classifies a generic JSON
//! object by a fixed field precedence, the same tolerant-parsing idiom used
//! for Service A's incoming client messages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A classified upstream message, independent of the field names it arrived with.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamMessage {
    /// A full authoritative snapshot of the upstream English text.
    Stable { full: String },
    /// An incremental patch to apply to the upstream's tail.
    Patch { delete: usize, insert: String },
    /// An initial or resynchronizing baseline, treated like `Stable`.
    Baseline { full: String },
    /// Clears all session state.
    Reset,
}

#[derive(Debug, Error)]
pub enum ParseUpstreamError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("message did not match a known shape")]
    Unrecognized,
}

/// Classifies a raw text frame into an [`UpstreamMessage`], tolerating the
/// field-name drift real upstream producers exhibit.
///
/// Precedence: `reset` > `baseline` > `stable` > `patch`, decided by
/// whichever recognized field/type marker is present, not by a single tag.
pub fn parse_upstream_message(text: &str) -> Result<UpstreamMessage, ParseUpstreamError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let obj = value.as_object().ok_or(ParseUpstreamError::Unrecognized)?;

    let kind = obj
        .get("type")
        .or_else(|| obj.get("event"))
        .and_then(|v| v.as_str())
        .map(str::to_lowercase);

    if kind.as_deref() == Some("reset") {
        return Ok(UpstreamMessage::Reset);
    }

    if kind.as_deref() == Some("baseline") {
        let full = text_field(obj, &["full", "text", "stableText"]).unwrap_or_default();
        return Ok(UpstreamMessage::Baseline { full });
    }

    if kind.as_deref() == Some("patch") || obj.contains_key("delete") || obj.contains_key("insert")
    {
        let delete = obj.get("delete").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
        let insert = text_field(obj, &["insert", "delta", "append"]).unwrap_or_default();
        return Ok(UpstreamMessage::Patch { delete, insert });
    }

    if kind.as_deref() == Some("stable")
        || obj.contains_key("full")
        || obj.contains_key("stableText")
    {
        let full = text_field(obj, &["full", "text", "stableText"]).unwrap_or_default();
        return Ok(UpstreamMessage::Stable { full });
    }

    Err(ParseUpstreamError::Unrecognized)
}

fn text_field(obj: &serde_json::Map<String, serde_json::Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| obj.get(*k))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// Outgoing server->client messages (§6).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    Hello {
        detail: HelloDetail,
    },
    #[serde(rename = "vi-commit")]
    ViCommit {
        append: String,
        seq: u64,
        en_seq: u64,
    },
    #[serde(rename = "vi-draft")]
    ViDraft {
        text: String,
        seq: u64,
        en_seq: u64,
        req_id: u64,
    },
    /// Compatibility mirror of `vi-commit`, emitted only when configured.
    #[serde(rename = "vi-delta")]
    ViDelta {
        append: String,
    },
    Status {
        detail: StatusDetail,
    },
    Error {
        error: String,
        code: &'static str,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloDetail {
    pub lang_src: &'static str,
    pub lang_tgt: &'static str,
    pub idle_timeout_sec: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusDetail {
    pub en_len: usize,
    pub units_committed: u64,
    pub vi_len: usize,
}

impl ServerMessage {
    /// Serializes to a JSON text frame, or `None` on a (never-expected) encode failure.
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reset() {
        assert_eq!(
            parse_upstream_message(r#"{"type":"reset"}"#).unwrap(),
            UpstreamMessage::Reset
        );
    }

    #[test]
    fn parses_stable_full() {
        let msg = parse_upstream_message(r#"{"type":"stable","full":"hello world"}"#).unwrap();
        assert_eq!(
            msg,
            UpstreamMessage::Stable {
                full: "hello world".to_string()
            }
        );
    }

    #[test]
    fn parses_stable_by_field_presence_alone() {
        let msg = parse_upstream_message(r#"{"full":"no type tag"}"#).unwrap();
        assert_eq!(
            msg,
            UpstreamMessage::Stable {
                full: "no type tag".to_string()
            }
        );
    }

    #[test]
    fn parses_patch_with_delta_alias() {
        let msg = parse_upstream_message(r#"{"type":"patch","delete":2,"delta":"lo!"}"#).unwrap();
        assert_eq!(
            msg,
            UpstreamMessage::Patch {
                delete: 2,
                insert: "lo!".to_string()
            }
        );
    }

    #[test]
    fn parses_baseline() {
        let msg = parse_upstream_message(r#"{"type":"baseline","full":"start"}"#).unwrap();
        assert_eq!(
            msg,
            UpstreamMessage::Baseline {
                full: "start".to_string()
            }
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_upstream_message("not json").is_err());
        assert!(parse_upstream_message("{}").is_err());
    }

    #[test]
    fn vi_commit_serializes_with_expected_shape() {
        let msg = ServerMessage::ViCommit {
            append: "xin chao".to_string(),
            seq: 1,
            en_seq: 1,
        };
        let text = msg.to_text().unwrap();
        assert!(text.contains(r#""type":"vi-commit""#));
        assert!(text.contains(r#""append":"xin chao""#));
    }
}
