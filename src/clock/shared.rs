use super::types::ClockOrdering;
use super::vector::VectorClock;
use crate::error::Result;

use parking_lot::RwLock;
use std::sync::Arc;

/// Thread-safe vector clock. Clones share the same underlying clock.
#[derive(Debug, Clone, Default)]
pub struct SharedVectorClock {
    inner: Arc<RwLock<VectorClock>>,
}

impl SharedVectorClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_clock(clock: VectorClock) -> Self {
        Self {
            inner: Arc::new(RwLock::new(clock)),
        }
    }

    pub fn increment(&self, node_id: &str) -> u64 {
        self.inner.write().increment(node_id)
    }

    pub fn get(&self, node_id: &str) -> u64 {
        self.inner.read().get(node_id)
    }

    pub fn merge(&self, other: &VectorClock) {
        self.inner.write().merge(other);
    }

    pub fn compare(&self, other: &VectorClock) -> ClockOrdering {
        self.inner.read().compare(other)
    }

    /// Disconnected deep copy; later updates to `self` are not visible in it.
    pub fn snapshot(&self) -> VectorClock {
        self.inner.read().snapshot()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        self.inner.read().encode()
    }
}
