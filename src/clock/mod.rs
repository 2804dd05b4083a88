//! Vector Clock Module
//!
//! Logical per-node counters used to establish a partial causal order between
//! events produced on different nodes.
//!
//! ## Ordering
//! Two clocks are compared component-wise over the union of their nodes, an
//! absent node counting as zero. The result is one of `Equal`, `Before`,
//! `After` or `Concurrent` (see [`ClockOrdering`]).
//!
//! ## Submodules
//! - **`vector`**: The plain `VectorClock` value (increment, merge, compare, binary codec).
//! - **`shared`**: `SharedVectorClock`, a lock-guarded handle for concurrent use.
//! - **`types`**: The `ClockOrdering` result type.

pub mod shared;
pub mod types;
pub mod vector;

pub use shared::SharedVectorClock;
pub use types::ClockOrdering;
pub use vector::VectorClock;
