//! Consistent-Hash Shard Router
//!
//! Maps arbitrary keys onto a dynamic set of shard IDs while moving as few keys
//! as possible when shards join or leave.
//!
//! ## Core Concepts
//! - **Virtual nodes**: Each shard contributes `replicas` points `hash("<shard>#<i>")`
//!   to a sorted circular sequence.
//! - **Lookup**: A key is owned by the first point at or after `hash(key)`,
//!   wrapping to the start of the ring.
//! - **Hashing**: 64-bit FNV-1a over the raw UTF-8 bytes (see [`hasher`]). This
//!   function is part of the contract: two processes agree on placement only if
//!   they hash the same way.
//! - **Concurrency**: Lookups take a shared read lock; `add`/`remove` are exclusive.

pub mod hasher;
pub mod ring;

pub use ring::{HashRing, ShardId};

#[cfg(test)]
mod tests;
