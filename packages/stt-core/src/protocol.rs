//! Wire protocol types for Service A (§6).
//!
//! Outgoing messages use a single `#[serde(tag = "type")]` enum, mirroring the
//! teacher's `WsOutgoing` pattern in `api/ws.rs`. Incoming messages are NOT a
//! clean single-tag enum on the wire (clients send `{event:...}`,
//! `{audio:...}` or `{type:"auth",...}` shapes interchangeably), so parsing
//! goes through a small precedence-based classifier instead of `#[serde(tag)]`,
//! the same tolerant-parsing idiom used for Service B's upstream messages.

use serde::{Deserialize, Serialize};

/// Sample element encoding declared by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    I16,
    F32,
}

impl Dtype {
    /// Bytes occupied by one sample of this dtype.
    #[must_use]
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::I16 => 2,
            Self::F32 => 4,
        }
    }
}

/// A parsed client→server JSON control/audio message.
#[derive(Debug, Clone)]
pub enum ClientMessage {
    /// `{event:"start", sample_rate, dtype}` — sets session format.
    Start { sample_rate: u32, dtype: Dtype },
    /// `{event:"stop"|"eos"|"end"}` — drain and terminate.
    Stop,
    /// `{audio:"<base64>", sr, dtype}` — base64-wrapped PCM frame.
    AudioJson {
        audio: String,
        sr: u32,
        dtype: Dtype,
    },
    /// `{type:"auth", token}` — optional authentication ticket.
    Auth { token: String },
}

/// Error returned when a client text frame cannot be classified or parsed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unrecognized or malformed client message")]
pub struct ParseClientMessageError;

/// Parses a client text frame into a [`ClientMessage`].
///
/// Classification follows a fixed field-presence precedence (auth > event >
/// audio) rather than a single serde tag, since real clients mix shapes on
/// one socket.
pub fn parse_client_message(text: &str) -> Result<ClientMessage, ParseClientMessageError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|_| ParseClientMessageError)?;
    let obj = value.as_object().ok_or(ParseClientMessageError)?;

    if obj.get("type").and_then(|v| v.as_str()) == Some("auth") {
        let token = obj
            .get("token")
            .and_then(|v| v.as_str())
            .ok_or(ParseClientMessageError)?;
        return Ok(ClientMessage::Auth {
            token: token.to_string(),
        });
    }

    if let Some(event) = obj.get("event").and_then(|v| v.as_str()) {
        return match event {
            "start" => {
                let sample_rate = obj
                    .get("sample_rate")
                    .and_then(|v| v.as_u64())
                    .ok_or(ParseClientMessageError)? as u32;
                let dtype = parse_dtype(obj.get("dtype"))?;
                Ok(ClientMessage::Start { sample_rate, dtype })
            }
            "stop" | "eos" | "end" => Ok(ClientMessage::Stop),
            _ => Err(ParseClientMessageError),
        };
    }

    if let Some(audio) = obj.get("audio").and_then(|v| v.as_str()) {
        let sr = obj
            .get("sr")
            .and_then(|v| v.as_u64())
            .ok_or(ParseClientMessageError)? as u32;
        let dtype = parse_dtype(obj.get("dtype"))?;
        return Ok(ClientMessage::AudioJson {
            audio: audio.to_string(),
            sr,
            dtype,
        });
    }

    Err(ParseClientMessageError)
}

fn parse_dtype(value: Option<&serde_json::Value>) -> Result<Dtype, ParseClientMessageError> {
    match value.and_then(|v| v.as_str()) {
        Some("i16") | None => Ok(Dtype::I16),
        Some("f32") => Ok(Dtype::F32),
        Some(_) => Err(ParseClientMessageError),
    }
}

/// Stabilizer summary included in `hello`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StabilizerInfo {
    pub max_rollback_chars: usize,
    pub rewrite_confirm_n: u32,
    pub patch_max_hz: f64,
}

/// Detail payload for `hello`.
#[derive(Debug, Clone, Serialize)]
pub struct HelloDetail {
    pub sample_rate_in_default: u32,
    pub sample_rate_out: u32,
    pub frame_ms: u64,
    pub queue_max: usize,
    pub device: String,
    pub model: String,
    pub idle_timeout_sec: u64,
    pub stabilizer: StabilizerInfo,
}

/// Detail payload for `ack`.
#[derive(Debug, Clone, Serialize)]
pub struct AckDetail {
    pub src_sr: u32,
    pub dtype: Dtype,
    pub auto_started: bool,
}

/// Detail payload for `status`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusDetail {
    pub frames_total: u64,
    pub queue: usize,
    pub bytes_in_queue: usize,
    pub buf_ms: u64,
    pub ui_e2e_ms_last: Option<u64>,
}

/// Server→client wire messages (§6).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Hello {
        detail: HelloDetail,
    },
    Ack {
        detail: AckDetail,
    },
    Patch {
        delete: usize,
        insert: String,
        seq: u64,
        t_ms: u64,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        continuation: bool,
    },
    Stable {
        full: String,
        seq: u64,
        t_ms: u64,
    },
    Status {
        stage: &'static str,
        detail: StatusDetail,
    },
    Error {
        error: String,
        code: &'static str,
    },
}

impl ServerMessage {
    /// Serializes to a WebSocket text message, if encodable.
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start_event() {
        let msg =
            parse_client_message(r#"{"event":"start","sample_rate":48000,"dtype":"f32"}"#)
                .unwrap();
        match msg {
            ClientMessage::Start { sample_rate, dtype } => {
                assert_eq!(sample_rate, 48000);
                assert_eq!(dtype, Dtype::F32);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn parses_stop_aliases() {
        for ev in ["stop", "eos", "end"] {
            let text = format!(r#"{{"event":"{ev}"}}"#);
            assert!(matches!(
                parse_client_message(&text).unwrap(),
                ClientMessage::Stop
            ));
        }
    }

    #[test]
    fn parses_audio_json_default_dtype() {
        let msg = parse_client_message(r#"{"audio":"abc123","sr":16000}"#).unwrap();
        match msg {
            ClientMessage::AudioJson { audio, sr, dtype } => {
                assert_eq!(audio, "abc123");
                assert_eq!(sr, 16000);
                assert_eq!(dtype, Dtype::I16);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn parses_auth() {
        let msg = parse_client_message(r#"{"type":"auth","token":"abc.def.ghi"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Auth { token } if token == "abc.def.ghi"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_client_message(r#"{"foo":"bar"}"#).is_err());
        assert!(parse_client_message("not json").is_err());
    }

    #[test]
    fn patch_serializes_with_expected_fields() {
        let msg = ServerMessage::Patch {
            delete: 0,
            insert: "hello".into(),
            seq: 1,
            t_ms: 0,
            continuation: false,
        };
        let json = msg.to_text().unwrap();
        assert!(json.contains(r#""type":"patch""#));
        assert!(!json.contains("continuation"));
    }
}
