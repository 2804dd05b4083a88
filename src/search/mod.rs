//! Sharded Top-K Search Module
//!
//! Scatter/gather search across a dynamic set of shards.
//!
//! ## Overview
//! Each shard performs its own local search (through a user-supplied callback) and
//! returns its local top-K. This module fans the query out with bounded
//! concurrency and merges the partial answers into the global top-K.
//!
//! ## Responsibilities
//! - **Fan-out**: One task per shard, admitted through a semaphore of
//!   `min(2 * hardware parallelism, shard count)` permits.
//! - **Fail-fast**: The first shard error cancels the remaining shards and is returned.
//! - **Merge**: A bounded min-heap keeps the K best scores seen so far.
//!
//! ## Submodules
//! - **`engine`**: The fan-out driver (`FanOutSearch`).
//! - **`heap`**: The bounded top-K heap, generic over any scored item.
//! - **`types`**: `SearchResult` and the `Scored` trait.

pub mod engine;
pub mod heap;
pub mod types;

pub use engine::FanOutSearch;
pub use heap::TopK;
pub use types::{Scored, SearchResult};
