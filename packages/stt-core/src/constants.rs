//! Fixed protocol constants that should NOT be changed.
//!
//! These values are derived from frame-duration arithmetic or wire protocol
//! expectations, not from deployment tuning. Deployment-tunable knobs (queue
//! sizes, rewrite gates, segmenter windows) live in [`crate::config::Config`]
//! instead.

/// Output sample rate the STT recorder expects (Hz). Fixed by the recorder.
pub const SAMPLE_RATE_OUT: u32 = 16_000;

/// Frame duration fed to the recorder (ms). `hop = SAMPLE_RATE_OUT * FRAME_MS / 1000`.
pub const FRAME_MS: u64 = 20;

/// Number of 16 kHz samples per fed frame.
pub const FRAME_HOP_SAMPLES: usize = (SAMPLE_RATE_OUT as u64 * FRAME_MS / 1000) as usize;

/// WebSocket idle timeout (seconds): no client message closes the session.
pub const IDLE_TIMEOUT_SEC: u64 = 20;

/// Interval between idle-timeout checks (seconds).
pub const IDLE_CHECK_INTERVAL_SEC: u64 = 1;

/// Seconds of trailing silence fed to the recorder on EOS to flush VAD.
pub const TAIL_SILENCE_SEC: f32 = 1.0;

/// WebSocket close code: policy violation (authentication failure).
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;

/// WebSocket close code: server initialization failure.
pub const CLOSE_INIT_FAILED: u16 = 1011;

/// WebSocket close code: service busy / shedding load.
pub const CLOSE_BUSY: u16 = 1013;

/// WebSocket close code: normal closure.
pub const CLOSE_NORMAL: u16 = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_hop_is_20ms_at_16khz() {
        assert_eq!(FRAME_HOP_SAMPLES, 320);
    }
}
