use super::types::ClockOrdering;
use crate::error::Result;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Mapping `node -> counter`. A node that is absent has counter zero.
///
/// Backed by a `BTreeMap` so that iteration and the binary encoding are
/// deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorClock {
    counters: BTreeMap<String, u64>,
}

impl VectorClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the counter of `node_id` and returns its new value.
    pub fn increment(&mut self, node_id: &str) -> u64 {
        let counter = self.counters.entry(node_id.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Counter of `node_id`, zero when the node has never ticked.
    pub fn get(&self, node_id: &str) -> u64 {
        self.counters.get(node_id).copied().unwrap_or(0)
    }

    /// Nodes with a non-zero counter, in sorted order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.counters
            .iter()
            .filter(|(_, &c)| c > 0)
            .map(|(n, _)| n.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.counters.values().all(|&c| c == 0)
    }

    /// Element-wise maximum with `other`.
    pub fn merge(&mut self, other: &VectorClock) {
        for (node, &theirs) in &other.counters {
            let ours = self.counters.entry(node.clone()).or_insert(0);
            if theirs > *ours {
                *ours = theirs;
            }
        }
    }

    pub fn compare(&self, other: &VectorClock) -> ClockOrdering {
        let mut less = false;
        let mut greater = false;

        let nodes = self.counters.keys().chain(other.counters.keys());
        for node in nodes {
            let ours = self.get(node);
            let theirs = other.get(node);
            if ours < theirs {
                less = true;
            } else if ours > theirs {
                greater = true;
            }
            if less && greater {
                return ClockOrdering::Concurrent;
            }
        }

        match (less, greater) {
            (false, false) => ClockOrdering::Equal,
            (true, false) => ClockOrdering::Before,
            (false, true) => ClockOrdering::After,
            (true, true) => ClockOrdering::Concurrent,
        }
    }

    pub fn happened_before(&self, other: &VectorClock) -> bool {
        self.compare(other) == ClockOrdering::Before
    }

    pub fn is_concurrent_with(&self, other: &VectorClock) -> bool {
        self.compare(other) == ClockOrdering::Concurrent
    }

    /// Deep copy, independent of `self`.
    pub fn snapshot(&self) -> VectorClock {
        self.clone()
    }

    /// Compact binary form (bincode over the sorted counter map).
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(&self.counters)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let counters: BTreeMap<String, u64> = bincode::deserialize(bytes)?;
        Ok(Self { counters })
    }
}

impl PartialEq for VectorClock {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == ClockOrdering::Equal
    }
}

impl Eq for VectorClock {}

impl<S: Into<String>> FromIterator<(S, u64)> for VectorClock {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        Self {
            counters: iter.into_iter().map(|(n, c)| (n.into(), c)).collect(),
        }
    }
}

impl fmt::Display for VectorClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (node, counter)) in self.counters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{node}:{counter}")?;
        }
        write!(f, "}}")
    }
}
