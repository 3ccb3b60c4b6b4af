//! Realtime-paced feed buffer between the resampler and the recorder (§4.4).
//!
//! Resampled audio arrives in bursts (network jitter, client batching) but
//! the recorder must be fed at a steady 20 ms cadence to behave like a live
//! microphone. [`FeederState`] holds a sample buffer and a virtual playhead;
//! [`FeederState::next_frame`] only yields a frame once real time has caught
//! up to the playhead, mirroring the teacher's `cadence.rs` "compare the
//! virtual playhead against wallclock, sleep the remainder" idiom — here the
//! "sleeping" is done by the caller's `tokio::time::interval` tick, and
//! `next_frame` simply refuses to hand out a frame early. If the buffer grows
//! past `max_buf_ms` of backlog (the client got far ahead of realtime), the
//! oldest samples are dropped down to `drop_buf_to_ms` so the session catches
//! back up instead of transcribing stale audio forever.
//!
//! Each pushed chunk also carries the `Instant` it was originally enqueued
//! at (ingress watermark). [`FeederState`] tracks, per chunk, the sample
//! offset at which it ends; once the feeder has actually advanced (fed to
//! the recorder, or dropped as backlog) past that offset, the watermark's
//! age becomes the most recently observed end-to-end latency, retrievable
//! via [`FeederState::take_last_latency_ms`].

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::config::FeederConfig;
use crate::constants::{FRAME_HOP_SAMPLES, FRAME_MS, SAMPLE_RATE_OUT};

/// Buffer + virtual playhead feeding the recorder at realtime cadence.
pub struct FeederState {
    config: FeederConfig,
    buffer: VecDeque<f32>,
    frames_emitted: u64,
    playhead_start: Option<Instant>,
    /// `(cumulative samples pushed at chunk end, enqueue timestamp)`, oldest first.
    watermarks: VecDeque<(u64, Instant)>,
    samples_pushed: u64,
    samples_advanced: u64,
    last_latency_ms: Option<u64>,
}

impl FeederState {
    #[must_use]
    pub fn new(config: FeederConfig) -> Self {
        Self {
            config,
            buffer: VecDeque::new(),
            frames_emitted: 0,
            playhead_start: None,
            watermarks: VecDeque::new(),
            samples_pushed: 0,
            samples_advanced: 0,
            last_latency_ms: None,
        }
    }

    /// Appends freshly resampled 16 kHz samples (tagged with the `Instant`
    /// they were originally enqueued at), then drops the oldest buffered
    /// samples if backlog now exceeds `max_buf_ms`.
    pub fn push(&mut self, samples: &[f32], enqueued_at: Instant) {
        self.buffer.extend(samples.iter().copied());
        self.samples_pushed += samples.len() as u64;
        self.watermarks.push_back((self.samples_pushed, enqueued_at));

        let max_samples = ms_to_samples(self.config.max_buf_ms);
        if self.buffer.len() > max_samples {
            let target_samples = ms_to_samples(self.config.drop_buf_to_ms);
            let to_drop = self.buffer.len() - target_samples;
            for _ in 0..to_drop {
                self.buffer.pop_front();
            }
            self.samples_advanced += to_drop as u64;
            self.drain_stale_watermarks();
        }
    }

    /// Pops the next 20 ms frame if a full frame is buffered AND the virtual
    /// playhead has reached the real time it's due. Returns `None` (without
    /// consuming anything) when called ahead of schedule, so a burst of
    /// queued audio is only ever fed out at realtime cadence.
    pub fn next_frame(&mut self) -> Option<Vec<f32>> {
        if self.buffer.len() < FRAME_HOP_SAMPLES {
            return None;
        }
        let now = Instant::now();
        let start = *self.playhead_start.get_or_insert(now);
        let due = start + Duration::from_millis(self.frames_emitted * FRAME_MS);
        if now < due {
            return None;
        }
        let frame: Vec<f32> = self.buffer.drain(..FRAME_HOP_SAMPLES).collect();
        self.frames_emitted += 1;
        self.samples_advanced += FRAME_HOP_SAMPLES as u64;
        self.drain_stale_watermarks();
        Some(frame)
    }

    /// Drains every full frame currently buffered, ignoring the playhead.
    /// Used at session teardown (tail-silence flush, final recorder flush)
    /// where the remaining backlog must be fed immediately rather than
    /// paced out over real time.
    pub fn drain_remaining(&mut self) -> Vec<Vec<f32>> {
        let mut frames = Vec::new();
        while self.buffer.len() >= FRAME_HOP_SAMPLES {
            let frame: Vec<f32> = self.buffer.drain(..FRAME_HOP_SAMPLES).collect();
            self.frames_emitted += 1;
            self.samples_advanced += FRAME_HOP_SAMPLES as u64;
            frames.push(frame);
        }
        self.drain_stale_watermarks();
        frames
    }

    /// Current backlog, in milliseconds of buffered (not yet fed) audio.
    #[must_use]
    pub fn backlog_ms(&self) -> u64 {
        (self.buffer.len() as u64 * 1000) / u64::from(SAMPLE_RATE_OUT)
    }

    /// Total frames handed to the recorder so far.
    #[must_use]
    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted
    }

    /// Returns (and clears) the most recently observed enqueue-to-consume
    /// latency, in milliseconds, for a chunk that has just been fully fed
    /// (or dropped). `None` if nothing newly crossed the watermark.
    pub fn take_last_latency_ms(&mut self) -> Option<u64> {
        self.last_latency_ms.take()
    }

    fn drain_stale_watermarks(&mut self) {
        while let Some(&(boundary, ts)) = self.watermarks.front() {
            if boundary <= self.samples_advanced {
                self.last_latency_ms = Some(ts.elapsed().as_millis() as u64);
                self.watermarks.pop_front();
            } else {
                break;
            }
        }
    }
}

fn ms_to_samples(ms: u64) -> usize {
    (ms * u64::from(SAMPLE_RATE_OUT) / 1000) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> FeederConfig {
        FeederConfig {
            max_buf_ms: 1_000,
            drop_buf_to_ms: 200,
        }
    }

    #[test]
    fn yields_no_frame_until_one_full_hop_buffered() {
        let mut feeder = FeederState::new(config());
        feeder.push(&vec![0.0; FRAME_HOP_SAMPLES - 1], Instant::now());
        assert!(feeder.next_frame().is_none());
        feeder.push(&[0.0], Instant::now());
        assert!(feeder.next_frame().is_some());
    }

    #[test]
    fn paces_bursted_audio_at_realtime_cadence() {
        let mut feeder = FeederState::new(config());
        let mut samples = vec![1.0; FRAME_HOP_SAMPLES];
        samples.extend(vec![2.0; FRAME_HOP_SAMPLES]);
        samples.extend(vec![3.0; FRAME_HOP_SAMPLES]);
        feeder.push(&samples, Instant::now());

        let start = Instant::now();
        assert!(feeder.next_frame().is_some());
        // The second and third frames are not due yet: bursting the whole
        // buffer in must not drain it in a single synchronous pass.
        assert!(feeder.next_frame().is_none());
        assert!(feeder.next_frame().is_none());
        assert!(start.elapsed() < Duration::from_millis(FRAME_MS));
    }

    #[test]
    fn drain_remaining_ignores_the_playhead() {
        let mut feeder = FeederState::new(config());
        let mut samples = vec![1.0; FRAME_HOP_SAMPLES];
        samples.extend(vec![2.0; FRAME_HOP_SAMPLES]);
        feeder.push(&samples, Instant::now());
        assert!(feeder.next_frame().is_some());
        let rest = feeder.drain_remaining();
        assert_eq!(rest.len(), 1);
        assert_eq!(feeder.frames_emitted(), 2);
    }

    #[test]
    fn backlog_past_max_drops_down_to_target() {
        let mut feeder = FeederState::new(config());
        let one_sec = vec![0.0f32; SAMPLE_RATE_OUT as usize * 2];
        feeder.push(&one_sec, Instant::now());
        assert!(feeder.backlog_ms() <= 200);
    }

    #[test]
    fn latency_watermark_reports_age_once_chunk_is_consumed() {
        let mut feeder = FeederState::new(config());
        let enqueued_at = Instant::now() - Duration::from_millis(50);
        feeder.push(&vec![0.0; FRAME_HOP_SAMPLES], enqueued_at);
        assert!(feeder.take_last_latency_ms().is_none());
        assert!(feeder.next_frame().is_some());
        let latency = feeder.take_last_latency_ms().expect("watermark cleared");
        assert!(latency >= 50);
        assert!(feeder.take_last_latency_ms().is_none());
    }
}
