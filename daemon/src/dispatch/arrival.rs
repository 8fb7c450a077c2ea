//! Arrival stamps shared by every hand-off queue
//!
//! Each source has its own queue, so the dispatcher cannot tell from the
//! queues alone which item came first. Producers stamp items from one
//! process-wide counter at enqueue time and the dispatcher always takes the
//! lowest stamp among the queue heads.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SEQ: AtomicU64 = AtomicU64::new(0);

/// A queued item and its position in the global arrival order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stamped<T> {
    pub seq: u64,
    pub value: T,
}

impl<T> Stamped<T> {
    /// Stamp `value` as arriving now. Never blocks; safe on OS callback
    /// threads.
    pub fn new(value: T) -> Self {
        Self {
            seq: NEXT_SEQ.fetch_add(1, Ordering::Relaxed),
            value,
        }
    }
}
