//! Fixed protocol constants that should NOT be changed.
//!
//! Deployment-tunable knobs (segmenter windows, worker batch sizes, rewrite
//! gates) live in [`crate::config::Config`] instead.

/// WebSocket idle timeout (seconds): no upstream message closes the session.
pub const IDLE_TIMEOUT_SEC: u64 = 20;

/// Interval between idle-timeout checks (seconds).
pub const IDLE_CHECK_INTERVAL_SEC: u64 = 1;

/// Status emission cadence (milliseconds), matching the original translator's
/// ~200ms status heartbeat.
pub const STATUS_INTERVAL_MS: u64 = 200;

/// WebSocket close code: policy violation (authentication failure).
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;

/// WebSocket close code: server initialization failure.
pub const CLOSE_INIT_FAILED: u16 = 1011;

/// WebSocket close code: service busy / shedding load.
pub const CLOSE_BUSY: u16 = 1013;

/// WebSocket close code: normal closure.
pub const CLOSE_NORMAL: u16 = 1000;
