//! Stable ring hash: 64-bit FNV-1a.
//!
//! `std`'s `DefaultHasher` is randomly keyed per process, so it cannot be used
//! for placement that other processes must reproduce.

use fnv::FnvHasher;
use std::hash::Hasher;

/// FNV-1a over the bytes of `key`, without any length prefix or terminator.
pub fn ring_hash(key: &[u8]) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(key);
    hasher.finish()
}

/// Label hashed for the `index`-th virtual node of `shard`.
pub fn virtual_node_label(shard: &str, index: usize) -> String {
    format!("{shard}#{index}")
}
