//! Single-session admission control (§5).
//!
//! Same process-wide single-slot admission rule as Service A: at most one
//! active streaming session at a time, released on drop regardless of which
//! path ended the session.

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

/// RAII admission lease. Releases the slot when dropped.
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
