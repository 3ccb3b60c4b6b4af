//! Single-session admission control (§4.1).
//!
//! The service accepts at most one active streaming session at a time. A new
//! connection attempts to acquire the process-wide slot; if it is already
//! held, the connection is rejected with [`crate::error::SttError::Busy`].
//! The slot is released on drop, mirroring the teacher's `StreamGuard` in
//! `api/ws.rs`, which releases a per-zone playback lease the same way.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-wide admission slot for the single active session.
#[derive(Debug, Default)]
pub struct SessionSlot {
    held: AtomicBool,
}

impl SessionSlot {
    /// Creates an unheld slot.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            held: AtomicBool::new(false),
        })
    }

    /// Attempts to acquire the slot. Returns `None` if already held.
    #[must_use]
    pub fn try_acquire(self: &Arc<Self>) -> Option<SessionGuard> {
        if self
            .held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Some(SessionGuard {
                slot: Arc::clone(self),
            })
        } else {
            None
        }
    }

    /// Whether a session currently holds the slot.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// RAII admission lease. Releases the slot when dropped, so the slot is
/// freed regardless of how the session ends (graceful stop, client
/// disconnect, idle timeout, or a panic unwinding the task).
pub struct SessionGuard {
    slot: Arc<SessionSlot>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.slot.held.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_while_first_held() {
        let slot = SessionSlot::new();
        let first = slot.try_acquire();
        assert!(first.is_some());
        assert!(slot.try_acquire().is_none());
        assert!(slot.is_busy());
    }

    #[test]
    fn dropping_guard_frees_the_slot() {
        let slot = SessionSlot::new();
        let guard = slot.try_acquire().unwrap();
        drop(guard);
        assert!(!slot.is_busy());
        assert!(slot.try_acquire().is_some());
    }
}
