use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Storage key prefix. Part of the external contract: tools scan `auth:session:*`.
pub const SESSION_KEY_PREFIX: &str = "auth:session:";

/// A server-side session as persisted in the KV store (JSON, RFC 3339 timestamps).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    /// Opaque, unguessable token (UUIDv4).
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Session {
    pub fn storage_key(&self) -> String {
        session_key(&self.id)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Lifetime left at `now`, zero once expired.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.expires_at - now).to_std().unwrap_or_default()
    }
}

pub fn session_key(id: &str) -> String {
    format!("{SESSION_KEY_PREFIX}{id}")
}
