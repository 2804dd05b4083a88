//! Session Manager Module
//!
//! Server-side sessions persisted in a pluggable KV store.
//!
//! ## Submodules
//! - **`types`**: The `Session` record and its storage key format.
//! - **`kv`**: The KV collaborator contract, including optimistic transactions.
//! - **`memory`**: An in-process KV implementation with TTL and versioned keys.
//! - **`manager`**: Create / get / delete / refresh on top of any `KvStore`.

pub mod kv;
pub mod manager;
pub mod memory;
pub mod types;

pub use kv::{KvError, KvStore, WatchTxn};
pub use manager::SessionManager;
pub use memory::MemoryKvStore;
pub use types::{session_key, Session, SESSION_KEY_PREFIX};
