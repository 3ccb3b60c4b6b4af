//! stt-core — shared library for the realtime speech-to-text streaming
//! service.
//!
//! This crate implements the single-session WebSocket pipeline: ingest
//! arbitrary-rate client audio, resample and gain-normalize it to 16 kHz
//! mono, pace it into a pluggable recognizer at realtime cadence, stabilize
//! the recognizer's revisable hypotheses into an append/replace patch
//! stream, and optionally persist the transcript to disk.
//!
//! # Architecture
//!
//! - [`session`]: process-wide single-session admission control
//! - [`auth`]: optional HS256 JWT verification
//! - [`ingress`]: bounded, drop-oldest audio queue
//! - [`resample`]: PCM decoding, linear resampling, automatic gain control
//! - [`feeder`]: realtime-paced buffer between the resampler and recognizer
//! - [`recorder`]: the recognizer trait seam and a deterministic mock
//! - [`stabilizer`]: rewrite gating and patch generation
//! - [`emitter`]: single-writer outbound message channel
//! - [`history`]: transcript persistence to disk
//! - [`protocol`]: wire message types
//! - [`config`]: deployment-tunable knobs
//! - [`constants`]: fixed protocol/frame constants
//! - [`error`]: centralized error types
//! - [`api`]: HTTP/WebSocket router and server startup

#![warn(clippy::all)]

pub mod api;
pub mod auth;
pub mod config;
pub mod constants;
pub mod emitter;
pub mod error;
pub mod feeder;
pub mod history;
pub mod ingress;
pub mod protocol;
pub mod recorder;
pub mod resample;
pub mod session;
pub mod stabilizer;

pub use api::{start_server, AppState, AppStateBuilder, RecorderFactory, ServerError};
pub use config::Config;
pub use error::{ErrorCode, SttError, SttResult};
pub use session::{SessionGuard, SessionSlot};
