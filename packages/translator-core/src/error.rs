//! Centralized error types for the translation streaming service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::constants::{CLOSE_BUSY, CLOSE_INIT_FAILED, CLOSE_NORMAL, CLOSE_POLICY_VIOLATION};

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    /// Returns a machine-readable error code for wire `error` messages.
    fn code(&self) -> &'static str;
}

/// Application-wide error type for the translator server.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum TranslatorError {
    /// Another session already owns the admission slot.
    #[error("server busy: a session is already active")]
    Busy,

    /// Authentication failed or was required but missing.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// No upstream message received within the idle timeout.
    #[error("idle timeout: no input received")]
    IdleTimeout,

    /// Upstream frame could not be parsed; recovered locally, never fatal.
    #[error("parse error: {0}")]
    ParseError(String),

    /// Translator backend failed to initialize; fatal for the session.
    #[error("initialization failed: {0}")]
    InitFailed(String),

    /// Translator backend transient failure; surfaced, translation skipped.
    #[error("translation failed: {0}")]
    TranslationFailed(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TranslatorError {
    /// Maps the error to the WebSocket close code mandated for it.
    #[must_use]
    pub fn close_code(&self) -> u16 {
        match self {
            Self::Busy => CLOSE_BUSY,
            Self::Unauthorized(_) => CLOSE_POLICY_VIOLATION,
            Self::InitFailed(_) => CLOSE_INIT_FAILED,
            Self::IdleTimeout
            | Self::ParseError(_)
            | Self::TranslationFailed(_)
            | Self::Internal(_) => CLOSE_NORMAL,
        }
    }

    /// Maps the error to an HTTP status, used only by the `/health` surface.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Busy => StatusCode::SERVICE_UNAVAILABLE,
            Self::ParseError(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ErrorCode for TranslatorError {
    fn code(&self) -> &'static str {
        match self {
            Self::Busy => "BUSY",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::IdleTimeout => "IDLE_TIMEOUT",
            Self::ParseError(_) => "PARSE_ERROR",
            Self::InitFailed(_) => "INIT_FAILED",
            Self::TranslationFailed(_) => "MT_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type TranslatorResult<T> = Result<T, TranslatorError>;

/// JSON response body for HTTP error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for TranslatorError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_closes_with_1013() {
        assert_eq!(TranslatorError::Busy.close_code(), 1013);
        assert_eq!(TranslatorError::Busy.code(), "BUSY");
    }

    #[test]
    fn unauthorized_closes_with_1008() {
        let err = TranslatorError::Unauthorized("bad signature".into());
        assert_eq!(err.close_code(), 1008);
        assert_eq!(err.code(), "UNAUTHORIZED");
    }

    #[test]
    fn init_failed_closes_with_1011() {
        let err = TranslatorError::InitFailed("model load failed".into());
        assert_eq!(err.close_code(), 1011);
    }

    #[test]
    fn translation_failure_does_not_close() {
        let err = TranslatorError::TranslationFailed("backend timeout".into());
        assert_eq!(err.close_code(), 1000);
        assert_eq!(err.code(), "MT_FAILED");
    }
}
