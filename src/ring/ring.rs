use super::hasher::{ring_hash, virtual_node_label};
use crate::config::RingConfig;
use crate::error::{Error, Result};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Opaque, non-empty name of a storage partition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardId(pub String);

impl ShardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ShardId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShardId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ShardId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

struct RingState<N> {
    /// `hash -> owner`, kept sorted by the map itself.
    points: BTreeMap<u64, N>,
    members: BTreeSet<N>,
}

/// Virtual-node consistent-hash ring.
///
/// Generic over the member type; anything with a string form works, the
/// default is [`ShardId`].
pub struct HashRing<N = ShardId> {
    replicas: usize,
    hash: fn(&[u8]) -> u64,
    state: RwLock<RingState<N>>,
}

impl<N> HashRing<N>
where
    N: Clone + Ord + AsRef<str>,
{
    /// Creates an empty ring where each member contributes `replicas` points.
    pub fn new(replicas: usize) -> Self {
        Self::with_hash_fn(replicas, ring_hash)
    }

    /// Same as `new` with a different point hash. Used to force collisions.
    pub(crate) fn with_hash_fn(replicas: usize, hash: fn(&[u8]) -> u64) -> Self {
        Self {
            replicas: replicas.max(1),
            hash,
            state: RwLock::new(RingState {
                points: BTreeMap::new(),
                members: BTreeSet::new(),
            }),
        }
    }

    pub fn from_config(config: &RingConfig) -> Self {
        Self::new(config.replicas)
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }

    /// Inserts the member's virtual nodes. Returns `false` if it was already present.
    pub fn add(&self, member: N) -> Result<bool> {
        let name = member.as_ref();
        if name.is_empty() {
            return Err(Error::InvalidArgument("shard id must not be empty".into()));
        }

        let mut state = self.state.write();
        if state.members.contains(&member) {
            return Ok(false);
        }

        let placed = self.place(&mut state.points, &member);
        if placed < self.replicas {
            tracing::warn!(
                "Shard {} lost {} virtual nodes to hash collisions",
                name,
                self.replicas - placed
            );
        }

        tracing::debug!("Added shard {} with {} virtual nodes", name, placed);
        state.members.insert(member);
        Ok(true)
    }

    /// Removes every point owned by `member`. Unknown members are a no-op.
    pub fn remove(&self, member: &N) -> bool {
        let mut state = self.state.write();
        if !state.members.remove(member) {
            return false;
        }
        state.points.retain(|_, owner| owner != member);

        // Points the removed member won in a collision go back to the losers.
        let RingState { points, members } = &mut *state;
        let reclaimed: usize = members.iter().map(|m| self.place(points, m)).sum();

        tracing::debug!(
            "Removed shard {} ({} contested points reclaimed)",
            member.as_ref(),
            reclaimed
        );
        true
    }

    /// Claims every vacant point of `member`; first writer keeps a contested
    /// point. Returns the number of points newly claimed.
    fn place(&self, points: &mut BTreeMap<u64, N>, member: &N) -> usize {
        let mut placed = 0;
        for i in 0..self.replicas {
            let hash = (self.hash)(virtual_node_label(member.as_ref(), i).as_bytes());
            if let Entry::Vacant(slot) = points.entry(hash) {
                slot.insert(member.clone());
                placed += 1;
            }
        }
        placed
    }

    /// Owner of `key`: the first point with `hash >= hash(key)`, wrapping around.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<N> {
        let hash = (self.hash)(key.as_ref());
        let state = self.state.read();

        state
            .points
            .range(hash..)
            .next()
            .or_else(|| state.points.iter().next())
            .map(|(_, owner)| owner.clone())
            .ok_or_else(|| Error::InvalidArgument("hash ring has no shards".into()))
    }

    pub fn contains(&self, member: &N) -> bool {
        self.state.read().members.contains(member)
    }

    /// Current membership in sorted order.
    pub fn shards(&self) -> Vec<N> {
        self.state.read().members.iter().cloned().collect()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.state.read().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().members.is_empty()
    }

    /// Number of virtual-node points on the ring.
    pub fn point_count(&self) -> usize {
        self.state.read().points.len()
    }
}

impl<N> Default for HashRing<N>
where
    N: Clone + Ord + AsRef<str>,
{
    fn default() -> Self {
        Self::from_config(&RingConfig::default())
    }
}
