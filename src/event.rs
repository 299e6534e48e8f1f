//! Change events delivered to subscribers.
//!
//! Events are ephemeral: the emitter owns them during dispatch and drops them
//! afterwards. Only the snapshot they describe is durable.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle payload emitted on attach.
pub const STATUS_CONNECTED: &str = "connected";
/// Lifecycle payload emitted on detach.
pub const STATUS_DISCONNECTED: &str = "disconnected";

/// What an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The buffer holds new text; payload is the full content.
    Changed,
    /// The platform refused a read; payload is a human-readable reason.
    AccessDenied,
    /// The observer attached or detached; payload is the status string.
    LifecycleChanged,
}

impl EventKind {
    /// Whether the event's information survives without a subscriber.
    ///
    /// `Changed` content is already in the snapshot store when the event is
    /// emitted; the other kinds are dropped if nobody is listening.
    #[must_use]
    pub const fn is_durable(self) -> bool {
        matches!(self, Self::Changed)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Changed => "changed",
            Self::AccessDenied => "access_denied",
            Self::LifecycleChanged => "lifecycle_changed",
        };
        f.write_str(s)
    }
}

/// A single observation outcome.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub event_id: Uuid,
    pub kind: EventKind,
    pub payload: String,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    /// The buffer now holds `content`, accepted at `timestamp`.
    #[must_use]
    pub fn changed(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(EventKind::Changed, content.into(), timestamp)
    }

    /// A read was refused for `reason`.
    #[must_use]
    pub fn access_denied(reason: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(EventKind::AccessDenied, reason.into(), timestamp)
    }

    /// The observer is now `connected` or `disconnected`.
    #[must_use]
    pub fn lifecycle(active: bool, timestamp: DateTime<Utc>) -> Self {
        let status = if active { STATUS_CONNECTED } else { STATUS_DISCONNECTED };
        Self::new(EventKind::LifecycleChanged, status.to_string(), timestamp)
    }

    fn new(kind: EventKind, payload: String, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            kind,
            payload,
            timestamp,
        }
    }

    /// Returns true for `Changed` events.
    #[must_use]
    pub const fn is_change(&self) -> bool {
        matches!(self.kind, EventKind::Changed)
    }
}

/// Display summary of clipboard text: at most `max_chars` characters, with
/// `…` appended when cut.
///
/// Counts `char`s, never bytes, so multi-byte text is not split mid-codepoint.
/// Only for alerts and UI; stored and emitted content is never truncated.
#[must_use]
pub fn summarize(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            let mut out = String::with_capacity(cut + '…'.len_utf8());
            out.push_str(&text[..cut]);
            out.push('…');
            out
        }
        None => text.to_string(),
    }
}
