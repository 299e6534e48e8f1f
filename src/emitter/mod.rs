//! Event delivery to subscribers.
//!
//! The emitter fans each event out synchronously to every live subscriber.
//! A failing or panicking subscriber is logged and skipped; it never reaches
//! the detection pipeline and never affects other subscribers.
//!
//! With no subscriber, events are dropped. `Changed` content is already in the
//! snapshot store by then, so a late subscriber reads the snapshot instead of
//! replaying missed events.

/// Channel-backed subscriber stream.
pub mod stream;

pub use stream::{event_stream, EventStream, StreamSubscriber};

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DeliveryError;
use crate::event::ChangeEvent;

/// Unique identifier for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new random subscription id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Receives events from the emitter.
pub trait Subscriber: Send {
    /// Deliver one event. Called on the observer's thread; must not block.
    fn notify(&self, event: &ChangeEvent) -> Result<(), DeliveryError>;

    /// A closed subscriber is removed before the next dispatch.
    fn is_closed(&self) -> bool {
        false
    }
}

/// Adapts a closure into a [`Subscriber`].
pub struct FnSubscriber<F>(F);

impl<F> FnSubscriber<F>
where
    F: Fn(&ChangeEvent) -> Result<(), DeliveryError> + Send,
{
    /// Wrap `f`.
    pub const fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Subscriber for FnSubscriber<F>
where
    F: Fn(&ChangeEvent) -> Result<(), DeliveryError> + Send,
{
    fn notify(&self, event: &ChangeEvent) -> Result<(), DeliveryError> {
        (self.0)(event)
    }
}

/// The notification collaborator: shows a user-facing alert.
///
/// Best-effort and fire-and-forget; the summary is already truncated.
pub trait AlertSink: Send {
    /// Show `summary` to the user.
    fn show_alert(&self, summary: &str);
}

/// Discards alerts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAlerts;

impl AlertSink for NoAlerts {
    fn show_alert(&self, _summary: &str) {}
}

/// Delivery counters.
#[allow(missing_docs)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EmitterStats {
    pub delivered: u64,
    pub failed: u64,
    pub unobserved: u64,
}

/// Synchronous fan-out to zero or more subscribers.
#[derive(Default)]
pub struct EventEmitter {
    subscribers: Vec<(SubscriptionId, Box<dyn Subscriber>)>,
    stats: EmitterStats,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("subscribers", &self.subscribers.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl EventEmitter {
    /// An emitter with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber.
    pub fn subscribe(&mut self, subscriber: Box<dyn Subscriber>) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.subscribers.push((id, subscriber));
        id
    }

    /// Remove a subscriber. Returns false if `id` was unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    /// Live subscriber count (closed ones are pruned lazily).
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.iter().filter(|(_, s)| !s.is_closed()).count()
    }

    /// Delivery counters since creation.
    #[must_use]
    pub const fn stats(&self) -> EmitterStats {
        self.stats
    }

    /// Deliver `event` to every live subscriber, then drop it.
    ///
    /// Returns the number of successful deliveries.
    pub fn emit(&mut self, event: ChangeEvent) -> usize {
        self.subscribers.retain(|(id, s)| {
            let closed = s.is_closed();
            if closed {
                tracing::debug!(subscription = ?id, "pruning closed subscriber");
            }
            !closed
        });

        if self.subscribers.is_empty() {
            self.stats.unobserved += 1;
            if event.kind.is_durable() {
                tracing::trace!(kind = %event.kind, "no subscriber; content is in the snapshot store");
            } else {
                tracing::debug!(kind = %event.kind, "no subscriber; event dropped");
            }
            return 0;
        }

        let mut delivered = 0;
        for (id, subscriber) in &self.subscribers {
            let outcome = catch_unwind(AssertUnwindSafe(|| subscriber.notify(&event)))
                .unwrap_or(Err(DeliveryError::Panicked));

            match outcome {
                Ok(()) => {
                    delivered += 1;
                    self.stats.delivered += 1;
                }
                Err(e) => {
                    self.stats.failed += 1;
                    tracing::warn!(subscription = ?id, kind = %event.kind, error = %e, "event delivery failed");
                }
            }
        }
        delivered
    }
}
