//! KV store collaborator.
//!
//! The session manager needs plain get/set/delete with TTL plus an optimistic
//! transaction: watch keys, read them, queue writes, then commit only if no
//! watched key changed in between (Redis `WATCH`/`MULTI`/`EXEC`).

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    /// The key does not exist (or has expired).
    #[error("key not found")]
    Nil,
    /// A watched key changed before the transaction committed.
    #[error("transaction aborted: watched key changed")]
    TxAborted,
    #[error("kv transport error: {0}")]
    Transport(#[source] anyhow::Error),
}

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Stores `value`; `ttl == None` keeps it until deleted.
    async fn set(
        &self,
        ctx: &CancellationToken,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), KvError>;

    async fn get(&self, ctx: &CancellationToken, key: &str) -> Result<Vec<u8>, KvError>;

    /// Removing a missing key is not an error.
    async fn delete(&self, ctx: &CancellationToken, key: &str) -> Result<(), KvError>;

    /// Starts an optimistic transaction over `keys`.
    async fn watch(
        &self,
        ctx: &CancellationToken,
        keys: &[&str],
    ) -> Result<Box<dyn WatchTxn>, KvError>;
}

/// Handle returned by [`KvStore::watch`].
#[async_trait]
pub trait WatchTxn: Send {
    /// Reads the current committed value of a key.
    async fn get(&mut self, key: &str) -> Result<Vec<u8>, KvError>;

    /// Queues a write, applied only by `exec`.
    fn queue_set(&mut self, key: &str, value: Vec<u8>, ttl: Option<Duration>);

    /// Commits queued writes, or fails with `TxAborted` if a watched key changed.
    async fn exec(self: Box<Self>) -> Result<(), KvError>;
}
