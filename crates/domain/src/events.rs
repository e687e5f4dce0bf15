//! Notifications published to the event channel.
//!
//! Publishing is best-effort: the channel is not part of any transaction and
//! a failed publish never undoes the state change that triggered it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CommissionId, Role, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

/// A state change worth telling the counterpart about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketplaceEvent {
    /// The vendor handed over work on a commission.
    CommissionDelivered {
        commission_id: CommissionId,
        title: String,
        delivery_files: Vec<String>,
        occurred_at: DateTime<Utc>,
    },

    /// A commission was cancelled.
    CommissionCancelled {
        commission_id: CommissionId,
        title: String,
        cancelled_by: Role,
        occurred_at: DateTime<Utc>,
    },
}

impl MarketplaceEvent {
    /// Returns the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            MarketplaceEvent::CommissionDelivered { .. } => "CommissionDelivered",
            MarketplaceEvent::CommissionCancelled { .. } => "CommissionCancelled",
        }
    }
}

/// An event addressed to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub target: UserId,
    pub event: MarketplaceEvent,
}

/// Errors a channel may report on publish.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The channel has been shut down.
    #[error("Event channel closed")]
    Closed,

    /// The transport rejected the message.
    #[error("Event transport error: {0}")]
    Transport(String),
}

/// Fan-out of state-change notifications to connected clients.
#[async_trait]
pub trait EventChannel: Send + Sync {
    /// Publishes an event addressed to `target`.
    async fn publish(&self, target: UserId, event: MarketplaceEvent) -> Result<(), ChannelError>;
}

/// Event channel backed by a tokio broadcast channel.
///
/// Every subscriber sees every notification and filters on `target`.
#[derive(Debug, Clone)]
pub struct BroadcastEventChannel {
    sender: broadcast::Sender<Notification>,
}

impl BroadcastEventChannel {
    /// Creates a channel that buffers up to `capacity` undelivered notifications.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to all subsequent notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventChannel {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EventChannel for BroadcastEventChannel {
    async fn publish(&self, target: UserId, event: MarketplaceEvent) -> Result<(), ChannelError> {
        // No connected subscribers just means nobody is listening right now
        if self.sender.receiver_count() == 0 {
            tracing::debug!(
                %target,
                event_type = event.event_type(),
                "no subscribers, dropping event"
            );
            return Ok(());
        }
        self.sender
            .send(Notification { target, event })
            .map(|_| ())
            .map_err(|_| ChannelError::Closed)
    }
}

/// Channel that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventChannel;

#[async_trait]
impl EventChannel for NoopEventChannel {
    async fn publish(&self, _target: UserId, _event: MarketplaceEvent) -> Result<(), ChannelError> {
        Ok(())
    }
}
