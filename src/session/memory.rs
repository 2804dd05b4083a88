//! In-process `KvStore`.
//!
//! Every write stamps the entry with a store-wide, strictly increasing version.
//! A watch records the version it saw for each key (0 when absent or expired)
//! and `exec` commits only if all of them are unchanged.

use super::kv::{KvError, KvStore, WatchTxn};

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    version: u64,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, Entry>,
    last_version: u64,
}

impl State {
    fn live(&self, key: &str) -> Option<&Entry> {
        let now = Instant::now();
        self.entries.get(key).filter(|e| e.is_live(now))
    }

    fn version_of(&self, key: &str) -> u64 {
        self.live(key).map_or(0, |e| e.version)
    }

    fn put(&mut self, key: &str, value: Vec<u8>, ttl: Option<Duration>) {
        self.last_version += 1;
        let entry = Entry {
            value,
            version: self.last_version,
            // A TTL past the clock's range never expires.
            expires_at: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
        };
        self.entries.insert(key.to_string(), entry);
    }

    fn purge_expired(&mut self) {
        let now = Instant::now();
        self.entries.retain(|_, e| e.is_live(now));
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryKvStore {
    state: Arc<RwLock<State>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live keys starting with `prefix`, sorted.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let now = Instant::now();
        let state = self.state.read();
        let mut keys: Vec<String> = state
            .entries
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && e.is_live(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Remaining TTL of a live key; `None` if missing or stored without TTL.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let state = self.state.read();
        let expires_at = state.live(key)?.expires_at?;
        Some(expires_at.saturating_duration_since(Instant::now()))
    }

    /// Drops expired entries. Reads already ignore them.
    pub fn purge_expired(&self) {
        self.state.write().purge_expired();
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn set(
        &self,
        _ctx: &CancellationToken,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), KvError> {
        self.state.write().put(key, value, ttl);
        Ok(())
    }

    async fn get(&self, _ctx: &CancellationToken, key: &str) -> Result<Vec<u8>, KvError> {
        self.state
            .read()
            .live(key)
            .map(|e| e.value.clone())
            .ok_or(KvError::Nil)
    }

    async fn delete(&self, _ctx: &CancellationToken, key: &str) -> Result<(), KvError> {
        self.state.write().entries.remove(key);
        Ok(())
    }

    async fn watch(
        &self,
        _ctx: &CancellationToken,
        keys: &[&str],
    ) -> Result<Box<dyn WatchTxn>, KvError> {
        let state = self.state.read();
        let observed = keys
            .iter()
            .map(|k| (k.to_string(), state.version_of(k)))
            .collect();
        Ok(Box::new(MemoryTxn {
            state: self.state.clone(),
            observed,
            queued: Vec::new(),
        }))
    }
}

struct MemoryTxn {
    state: Arc<RwLock<State>>,
    observed: HashMap<String, u64>,
    queued: Vec<(String, Vec<u8>, Option<Duration>)>,
}

#[async_trait]
impl WatchTxn for MemoryTxn {
    async fn get(&mut self, key: &str) -> Result<Vec<u8>, KvError> {
        self.state
            .read()
            .live(key)
            .map(|e| e.value.clone())
            .ok_or(KvError::Nil)
    }

    fn queue_set(&mut self, key: &str, value: Vec<u8>, ttl: Option<Duration>) {
        self.queued.push((key.to_string(), value, ttl));
    }

    async fn exec(self: Box<Self>) -> Result<(), KvError> {
        let MemoryTxn {
            state,
            observed,
            queued,
        } = *self;
        let mut state = state.write();
        let changed = observed
            .iter()
            .any(|(key, version)| state.version_of(key) != *version);
        if changed {
            return Err(KvError::TxAborted);
        }
        for (key, value, ttl) in queued {
            state.put(&key, value, ttl);
        }
        Ok(())
    }
}
