//! Session Manager
//!
//! Issues opaque session tokens and stores each session as JSON under
//! `auth:session:<id>` with a TTL equal to its remaining lifetime.
//!
//! `refresh` is a single optimistic transaction: watch the key, read it, write
//! the extended session, commit. If another writer touched the key in between
//! the commit aborts and the caller gets `Conflict`; nothing is retried here.

use super::kv::{KvError, KvStore};
use super::types::{session_key, Session};
use crate::config::SessionConfig;
use crate::error::{Error, Result};

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub struct SessionManager {
    kv: Arc<dyn KvStore>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(kv: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    pub fn from_config(kv: Arc<dyn KvStore>, config: &SessionConfig) -> Self {
        Self::new(kv, config.ttl())
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn create(
        &self,
        ctx: &CancellationToken,
        user_id: &str,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Result<Session> {
        check_live(ctx)?;
        if user_id.is_empty() {
            return Err(Error::InvalidArgument("user id must not be empty".into()));
        }
        let lifetime = self.lifetime()?;

        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            created_at: now,
            expires_at: expiry(now, lifetime)?,
            metadata,
        };

        let payload = serde_json::to_vec(&session)?;
        self.kv
            .set(ctx, &session.storage_key(), payload, Some(self.ttl))
            .await
            .map_err(|e| kv_error(&session.id, e))?;

        tracing::debug!("Created session for user {}", session.user_id);
        Ok(session)
    }

    pub async fn get(&self, ctx: &CancellationToken, id: &str) -> Result<Session> {
        check_live(ctx)?;
        check_id(id)?;

        let raw = self
            .kv
            .get(ctx, &session_key(id))
            .await
            .map_err(|e| kv_error(id, e))?;
        let session: Session = serde_json::from_slice(&raw)?;

        // The store's TTL and the recorded expiry can disagree by a few ms.
        if session.is_expired_at(Utc::now()) {
            return Err(Error::NotFound(format!("session {id}")));
        }
        Ok(session)
    }

    /// Removes the session. Deleting an unknown id succeeds.
    pub async fn delete(&self, ctx: &CancellationToken, id: &str) -> Result<()> {
        check_live(ctx)?;
        check_id(id)?;
        self.kv
            .delete(ctx, &session_key(id))
            .await
            .map_err(|e| kv_error(id, e))?;
        tracing::debug!("Deleted session {}", id);
        Ok(())
    }

    /// Extends the session to `now + ttl`. Never shortens it.
    pub async fn refresh(&self, ctx: &CancellationToken, id: &str) -> Result<Session> {
        check_live(ctx)?;
        check_id(id)?;
        let lifetime = self.lifetime()?;
        let key = session_key(id);

        let mut txn = self
            .kv
            .watch(ctx, &[key.as_str()])
            .await
            .map_err(|e| kv_error(id, e))?;

        let raw = txn.get(&key).await.map_err(|e| kv_error(id, e))?;
        let mut session: Session = serde_json::from_slice(&raw)?;

        let now = Utc::now();
        if session.is_expired_at(now) {
            return Err(Error::NotFound(format!("session {id}")));
        }
        session.expires_at = session.expires_at.max(expiry(now, lifetime)?);

        let payload = serde_json::to_vec(&session)?;
        txn.queue_set(&key, payload, Some(session.remaining_at(now)));
        txn.exec().await.map_err(|e| kv_error(id, e))?;

        tracing::debug!("Refreshed session {} until {}", id, session.expires_at);
        Ok(session)
    }

    fn lifetime(&self) -> Result<chrono::Duration> {
        if self.ttl.is_zero() {
            return Err(Error::InvalidArgument("session ttl must be positive".into()));
        }
        chrono::Duration::from_std(self.ttl)
            .map_err(|e| Error::InvalidArgument(format!("session ttl out of range: {e}")))
    }
}

fn expiry(now: DateTime<Utc>, lifetime: chrono::Duration) -> Result<DateTime<Utc>> {
    now.checked_add_signed(lifetime)
        .ok_or_else(|| Error::InvalidArgument("session ttl overflows the calendar".into()))
}

fn check_live(ctx: &CancellationToken) -> Result<()> {
    if ctx.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(())
}

fn check_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::InvalidArgument("session id must not be empty".into()));
    }
    Ok(())
}

fn kv_error(id: &str, e: KvError) -> Error {
    match e {
        KvError::Nil => Error::NotFound(format!("session {id}")),
        KvError::TxAborted => {
            tracing::debug!("Refresh of session {} lost a concurrent update", id);
            Error::Conflict(format!("session {id} was modified concurrently"))
        }
        KvError::Transport(source) => {
            tracing::warn!("KV transport failure for session {}: {:#}", id, source);
            Error::Internal(format!("kv transport for session {id}: {source:#}"))
        }
    }
}
