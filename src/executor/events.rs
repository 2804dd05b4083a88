//! Event bus collaborator.
//!
//! The executor only needs `publish`; any broker client can sit behind the
//! trait. `BroadcastEventBus` is the in-process implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Best-effort publisher. Callers ignore returned errors.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(
        &self,
        ctx: &CancellationToken,
        topic: &str,
        payload: serde_json::Value,
    ) -> anyhow::Result<()>;
}

/// A message as delivered to `BroadcastEventBus` subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishedEvent {
    pub topic: String,
    pub payload: serde_json::Value,
}

/// In-process fan-out bus on top of `tokio::sync::broadcast`.
///
/// Publishing never waits: slow subscribers lag and lose the oldest messages.
#[derive(Debug, Clone)]
pub struct BroadcastEventBus {
    sender: broadcast::Sender<PublishedEvent>,
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl EventBus for BroadcastEventBus {
    async fn publish(
        &self,
        _ctx: &CancellationToken,
        topic: &str,
        payload: serde_json::Value,
    ) -> anyhow::Result<()> {
        self.sender
            .send(PublishedEvent {
                topic: topic.to_string(),
                payload,
            })
            .map(|_| ())
            .map_err(|_| anyhow::anyhow!("no subscribers for topic {topic}"))
    }
}
