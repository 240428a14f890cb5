//! Live push channels.
//!
//! The notification dispatcher only sees the [`RealtimeChannel`] trait so the
//! transport can be swapped or faked. [`RealtimeHub`] is the in-process
//! implementation backing the SSE endpoint: one broadcast sender per logical
//! channel, created when the first client subscribes.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};

use crate::db::{Notification, Task};

/// Logical channel a client can listen on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Per-user channel, joined with the user's own id.
    User(String),
    /// Per-list channel for live task updates.
    List(String),
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::User(id) => write!(f, "user:{}", id),
            Channel::List(id) => write!(f, "list:{}", id),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum RealtimeEvent {
    Notification(Notification),
    TaskUpdated(Task),
    TaskDeleted { id: String, list_id: String },
    /// Ends `user_id`'s subscription to the list channel it is published on.
    AccessRevoked { list_id: String, user_id: String },
    /// Ends every subscription to the list channel.
    ListDeleted { id: String },
}

impl RealtimeEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            RealtimeEvent::Notification(_) => "notification",
            RealtimeEvent::TaskUpdated(_) => "task_updated",
            RealtimeEvent::TaskDeleted { .. } => "task_deleted",
            RealtimeEvent::AccessRevoked { .. } => "access_revoked",
            RealtimeEvent::ListDeleted { .. } => "list_deleted",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("No subscriber connected on channel {0}")]
    NotConnected(String),
}

/// Fire-and-forget push capability. There is no acknowledgement; callers
/// that need durability persist first and treat the push as best effort.
#[async_trait]
pub trait RealtimeChannel: Send + Sync + 'static {
    /// Push `event` to everyone listening on `channel`. Returns the number of
    /// receivers reached.
    async fn publish(&self, channel: &Channel, event: RealtimeEvent) -> Result<usize, PushError>;
}

pub struct RealtimeHub {
    channels: RwLock<HashMap<Channel, broadcast::Sender<RealtimeEvent>>>,
    capacity: usize,
}

impl RealtimeHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub async fn subscribe(&self, channel: Channel) -> broadcast::Receiver<RealtimeEvent> {
        if let Some(tx) = self.channels.read().await.get(&channel) {
            return tx.subscribe();
        }

        let mut channels = self.channels.write().await;
        channels
            .entry(channel)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Drop senders nobody listens to anymore. Returns how many were removed.
    pub async fn prune(&self) -> usize {
        let mut channels = self.channels.write().await;
        let before = channels.len();
        channels.retain(|_, tx| tx.receiver_count() > 0);
        before - channels.len()
    }

    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

#[async_trait]
impl RealtimeChannel for RealtimeHub {
    async fn publish(&self, channel: &Channel, event: RealtimeEvent) -> Result<usize, PushError> {
        let channels = self.channels.read().await;
        let tx = channels
            .get(channel)
            .filter(|tx| tx.receiver_count() > 0)
            .ok_or_else(|| PushError::NotConnected(channel.to_string()))?;

        tx.send(event)
            .map_err(|_| PushError::NotConnected(channel.to_string()))
    }
}
