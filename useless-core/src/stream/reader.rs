//! Reader bookkeeping.
//!
//! Every entry in a stream queue gets a [`ReaderId`]. The function enrolled
//! under that id keeps a [`QueuedBy`] back-reference to the queue, so a
//! function can be removed from every stream it reads without scanning them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;

use super::channel::StreamInner;

/// Unique identifier for one queue entry.
///
/// Ids come from a process-wide counter, so ordering by id is registration
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReaderId(u64);

impl ReaderId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ReaderId {
    fn default() -> Self {
        Self::new()
    }
}

/// Back-reference from an enrolled function to the queue holding it.
pub(crate) struct QueuedBy {
    pub(crate) stream_id: u64,
    pub(crate) stream: Weak<StreamInner>,
    pub(crate) entry: ReaderId,
}

impl QueuedBy {
    /// Remove the entry from its queue. A dropped stream is ignored.
    pub(crate) fn detach(&self) {
        if let Some(stream) = self.stream.upgrade() {
            stream.queue.lock().remove(&self.entry);
        }
    }
}
