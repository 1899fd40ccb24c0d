//! # Event Bus System
//!
//! Typed events published by the sync core over `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: [`ReconcileEvent`], [`TriggerEvent`], [`AuthEvent`] wrapped in [`CoreEvent`]
//! - **EventBus**: Central broadcast channel for publishing events
//!
//! ```text
//! ┌──────────────┐   emit    ┌───────────┐   subscribe   ┌────────────┐
//! │ Reconciler   ├──────────>│           ├──────────────>│ Subscriber │
//! └──────────────┘           │ EventBus  │               └────────────┘
//! ┌──────────────┐   emit    │           │   subscribe   ┌────────────┐
//! │ Session Cache├──────────>│           ├──────────────>│ Subscriber │
//! └──────────────┘           └───────────┘               └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, ReconcileEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Reconcile(ReconcileEvent::AssetRemoved {
//!         pass_id: "p-1".to_string(),
//!         asset_id: "pq8abc".to_string(),
//!     }))
//!     .ok();
//! ```
//!
//! Emitting with no subscribers returns `Err(SendError)`; publishers in this
//! workspace ignore it with `.ok()`. Slow subscribers receive
//! `RecvError::Lagged(n)` and can keep receiving; `RecvError::Closed` means
//! every sender is gone.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Reconciliation pass progress
    Reconcile(ReconcileEvent),
    /// Change notifications and their coalescing
    Trigger(TriggerEvent),
    /// Backend session lifecycle
    Auth(AuthEvent),
}

// ============================================================================
// Reconcile Events
// ============================================================================

/// Events emitted while a reconciliation pass runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ReconcileEvent {
    /// Membership listed and diffed; mutations are about to start.
    Started {
        pass_id: String,
        source: String,
        to_add: usize,
        to_remove: usize,
    },
    /// An asset was normalized and published into the cache.
    AssetCached { pass_id: String, asset_id: String },
    /// An asset had no capture date anywhere and was dropped.
    AssetDiscarded { pass_id: String, asset_id: String },
    /// Fetching or ingesting an asset failed; it will be retried next pass.
    AssetFailed {
        pass_id: String,
        asset_id: String,
        message: String,
    },
    /// A cached asset left the album and was deleted.
    AssetRemoved { pass_id: String, asset_id: String },
    /// The pass finished. Per-asset failures do not prevent completion.
    Completed {
        pass_id: String,
        added: usize,
        removed: usize,
        discarded: usize,
        failed: usize,
        duration_ms: u64,
    },
    /// The pass stopped before mutating the cache.
    Aborted { pass_id: String, message: String },
}

// ============================================================================
// Trigger Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum TriggerEvent {
    /// A change signal requested a pass.
    Received { origin: String },
    /// A change signal arrived while a pass was already pending.
    Coalesced { origin: String },
}

// ============================================================================
// Authentication Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// A new backend session was established.
    SessionAcquired { provider: String },
    /// The backend rejected the cached session; the next request re-authenticates.
    SessionInvalidated { provider: String, reason: String },
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to core events.
///
/// Cloning is cheap; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified per-subscriber buffer.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn removed(asset_id: &str) -> CoreEvent {
        CoreEvent::Reconcile(ReconcileEvent::AssetRemoved {
            pass_id: "p-1".to_string(),
            asset_id: asset_id.to_string(),
        })
    }

    #[tokio::test]
    async fn test_emission_without_subscribers_is_an_error() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.emit(removed("a")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        assert_eq!(bus.emit(removed("a")).unwrap(), 2);
        assert_eq!(sub1.recv().await.unwrap(), removed("a"));
        assert_eq!(sub2.recv().await.unwrap(), removed("a"));
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for id in ["a", "b", "c", "d"] {
            bus.emit(removed(id)).unwrap();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(2))));
        assert_eq!(sub.recv().await.unwrap(), removed("c"));
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Auth(AuthEvent::SessionInvalidated {
            provider: "photoprism".to_string(),
            reason: "HTTP 401".to_string(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Auth");
        assert_eq!(json["payload"]["event"], "SessionInvalidated");

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
