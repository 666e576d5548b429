// src/pipeline/buffers.rs
//
// Single-writer/multi-reader buffer between pipeline stages. The writer
// overwrites the latest snapshot; readers clone an Arc to whatever is
// currently published. A reader running faster than its producer sees
// the same snapshot again — stale reads are accepted behavior, not an
// error. The lock is held only for the pointer swap, never across
// computation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub struct Latest<T> {
    slot: Mutex<Option<Arc<T>>>,
    version: AtomicU64,
}

impl<T> Latest<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            version: AtomicU64::new(0),
        }
    }

    /// Publish a new snapshot, replacing any previous one.
    pub fn publish(&self, value: T) {
        let snapshot = Arc::new(value);
        *self.slot.lock().expect("buffer lock poisoned") = Some(snapshot);
        self.version.fetch_add(1, Ordering::Release);
    }

    /// Read the current snapshot. `None` until the first publish.
    pub fn read(&self) -> Option<Arc<T>> {
        self.slot.lock().expect("buffer lock poisoned").clone()
    }

    /// Number of publishes so far. Readers can skip work when the
    /// version has not moved since their last cycle.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }
}

impl<T> Default for Latest<T> {
    fn default() -> Self {
        Self::new()
    }
}
