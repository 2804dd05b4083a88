//! Distributed Coordination Core
//!
//! In-process building blocks for distributed services. Each subsystem is
//! independent; the only shared pieces are the error type, the panic guard,
//! configuration and tracing setup.
//!
//! ## Architecture Modules
//!
//! - **`ring`**: Consistent-hash ring with virtual nodes. Maps keys to shard IDs
//!   so that membership changes remap as few keys as possible.
//! - **`search`**: Bounded-concurrency fan-out across shards with a global
//!   top-K merge, fail-fast on the first shard error.
//! - **`executor`**: Parallel DAG task runner with dependency ordering, cycle
//!   detection and lifecycle events.
//! - **`saga`**: Ordered steps with reverse-order compensation on failure.
//! - **`session`**: Server-side sessions in a KV store with optimistic (CAS)
//!   refresh.
//! - **`clock`**: Vector clocks for causal ordering of events across nodes.
//!
//! Cancellation is cooperative everywhere: long-running operations take a
//! `tokio_util::sync::CancellationToken` and hand child tokens to user code.

pub mod clock;
pub mod config;
pub mod error;
pub mod executor;
pub mod guard;
pub mod ring;
pub mod saga;
pub mod search;
pub mod session;
pub mod telemetry;

pub use error::{Error, Result};
