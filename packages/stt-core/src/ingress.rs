//! Ingress queue: bounded buffer between the WebSocket reader and the
//! resample/feeder pipeline (§4.2).
//!
//! Audio arrives faster than it can always be processed (client catch-up
//! bursts, slow resampling). Rather than blocking the reader or growing
//! unboundedly, the queue sheds the OLDEST items once occupancy or total
//! bytes crosses a configured threshold, keeping the pipeline close to
//! realtime at the cost of dropped (not delayed) audio.

use std::collections::VecDeque;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::config::IngressConfig;
use crate::protocol::Dtype;

/// One unit of raw audio handed from the WS layer to the resampler.
///
/// `enqueued_at` is the watermark used to derive end-to-end UI latency: it's
/// threaded through the feeder and read back once this item's samples have
/// actually been consumed by the recorder (see `feeder::FeederState`).
#[derive(Debug, Clone)]
pub struct AudioItem {
    pub samples: Vec<u8>,
    pub sample_rate: u32,
    pub dtype: Dtype,
    pub enqueued_at: Instant,
}

impl AudioItem {
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.samples.len()
    }
}

#[derive(Debug, Default)]
struct Stats {
    frames_total: u64,
    frames_dropped: u64,
}

struct Inner {
    items: VecDeque<AudioItem>,
    bytes: usize,
    stats: Stats,
}

/// Bounded, drop-oldest audio queue shared between the WS reader task and
/// the feeder task.
pub struct IngressQueue {
    config: IngressConfig,
    inner: Mutex<Inner>,
    notify: Notify,
}

impl IngressQueue {
    #[must_use]
    pub fn new(config: IngressConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                bytes: 0,
                stats: Stats::default(),
            }),
            notify: Notify::new(),
        }
    }

    /// Pushes an item, shedding the oldest entries first if the queue is at
    /// or above its occupancy guard, or if the hard byte cap would be
    /// exceeded.
    pub fn push(&self, item: AudioItem) {
        let mut inner = self.inner.lock();
        inner.stats.frames_total += 1;

        while inner.items.len() >= self.config.drop_guard_q {
            if let Some(dropped) = inner.items.pop_front() {
                inner.bytes -= dropped.byte_len();
                inner.stats.frames_dropped += 1;
            } else {
                break;
            }
        }

        inner.bytes += item.byte_len();
        inner.items.push_back(item);

        while inner.bytes > self.config.qbytes_hard_cap {
            match inner.items.pop_front() {
                Some(dropped) => {
                    inner.bytes -= dropped.byte_len();
                    inner.stats.frames_dropped += 1;
                }
                None => break,
            }
        }

        drop(inner);
        self.notify.notify_one();
    }

    /// Pops the oldest item, if any, without waiting.
    pub fn try_pop(&self) -> Option<AudioItem> {
        let mut inner = self.inner.lock();
        let item = inner.items.pop_front();
        if let Some(ref item) = item {
            inner.bytes -= item.byte_len();
        }
        item
    }

    /// Pops the oldest item, waiting for one to arrive if the queue is empty.
    pub async fn pop(&self) -> AudioItem {
        loop {
            if let Some(item) = self.try_pop() {
                return item;
            }
            self.notify.notified().await;
        }
    }

    /// Current queue depth (items) and occupied bytes, for status reporting.
    #[must_use]
    pub fn occupancy(&self) -> (usize, usize) {
        let inner = self.inner.lock();
        (inner.items.len(), inner.bytes)
    }

    /// Lifetime frame counters, for status reporting.
    #[must_use]
    pub fn counters(&self) -> (u64, u64) {
        let inner = self.inner.lock();
        (inner.stats.frames_total, inner.stats.frames_dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(bytes: usize) -> AudioItem {
        AudioItem {
            samples: vec![0u8; bytes],
            sample_rate: 16_000,
            dtype: Dtype::I16,
            enqueued_at: Instant::now(),
        }
    }

    #[test]
    fn drops_oldest_past_occupancy_guard() {
        let config = IngressConfig {
            queue_max: 16,
            drop_guard_q: 2,
            qbytes_hard_cap: 1_000_000,
        };
        let queue = IngressQueue::new(config);
        queue.push(item(10));
        queue.push(item(20));
        queue.push(item(30));
        let (depth, _) = queue.occupancy();
        assert_eq!(depth, 2);
        let first = queue.try_pop().unwrap();
        assert_eq!(first.byte_len(), 20);
    }

    #[test]
    fn drops_oldest_past_byte_cap() {
        let config = IngressConfig {
            queue_max: 16,
            drop_guard_q: 16,
            qbytes_hard_cap: 25,
        };
        let queue = IngressQueue::new(config);
        queue.push(item(10));
        queue.push(item(10));
        queue.push(item(10));
        let (_, bytes) = queue.occupancy();
        assert!(bytes <= 25);
    }

    #[tokio::test]
    async fn pop_waits_for_an_item() {
        let queue = std::sync::Arc::new(IngressQueue::new(IngressConfig::default()));
        let q2 = queue.clone();
        let handle = tokio::spawn(async move { q2.pop().await });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        queue.push(item(4));
        let popped = handle.await.unwrap();
        assert_eq!(popped.byte_len(), 4);
    }
}
