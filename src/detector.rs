//! Change detection: compare a fresh read with the last accepted value.
//!
//! The detector is the only writer of the snapshot. Its contract:
//!
//! | input                     | snapshot        | result                 |
//! |---------------------------|-----------------|------------------------|
//! | `None` (read denied)      | unchanged       | `AccessDenied` event   |
//! | `Some(x)`, `x == current` | unchanged       | `None`                 |
//! | `Some(x)`, `x != current` | `{x, now}`      | `Changed{x, now}`      |

use std::sync::Arc;

use crate::event::ChangeEvent;
use crate::snapshot::{fingerprint, BufferSnapshot};
use crate::source::ClipboardSource;
use crate::storage::SnapshotStore;
use crate::time::Clock;

/// Stateful change detector.
///
/// Holds the accepted snapshot in memory (seeded from the store) and writes
/// every accepted change through to the store.
pub struct ChangeDetector {
    store: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    current: BufferSnapshot,
    denial_message: String,
}

impl std::fmt::Debug for ChangeDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeDetector")
            .field("fingerprint", &self.current.fingerprint())
            .field("observed_at", &self.current.observed_at)
            .finish_non_exhaustive()
    }
}

impl ChangeDetector {
    /// Creates a detector seeded with the store's last snapshot.
    ///
    /// An unreadable store is logged and treated as empty: the first read
    /// will then be reported as a change.
    pub fn new(store: Arc<dyn SnapshotStore>, clock: Arc<dyn Clock>, denial_message: impl Into<String>) -> Self {
        let current = store.load_snapshot().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load snapshot; starting from unknown");
            BufferSnapshot::unknown()
        });

        Self {
            store,
            clock,
            current,
            denial_message: denial_message.into(),
        }
    }

    /// The last accepted snapshot.
    #[must_use]
    pub const fn snapshot(&self) -> &BufferSnapshot {
        &self.current
    }

    /// Compare `raw` with the accepted snapshot.
    ///
    /// `None` means the platform denied the read; the configured denial
    /// message becomes the event payload.
    pub fn detect(&mut self, raw: Option<String>) -> Option<ChangeEvent> {
        match raw {
            Some(text) => self.accept(text),
            None => Some(self.deny(self.denial_message.clone())),
        }
    }

    /// Read `source` and run detection on the result.
    ///
    /// An empty buffer is not a change and not a denial: nothing happens.
    pub fn detect_from(&mut self, source: &dyn ClipboardSource) -> Option<ChangeEvent> {
        match source.read_text() {
            Ok(Some(text)) => self.accept(text),
            Ok(None) => {
                tracing::trace!("buffer empty; nothing to compare");
                None
            }
            Err(denied) => {
                let reason = if denied.reason.trim().is_empty() {
                    self.denial_message.clone()
                } else {
                    denied.reason
                };
                Some(self.deny(reason))
            }
        }
    }

    fn accept(&mut self, text: String) -> Option<ChangeEvent> {
        if self.current.matches(&text) {
            tracing::trace!(fingerprint = %self.current.fingerprint(), "buffer unchanged");
            return None;
        }

        let now = self.clock.now();
        if let Err(e) = self.store.save_snapshot(&text, now) {
            // The next accepted change retries persistence.
            tracing::warn!(error = %e, fingerprint = %fingerprint(&text), "failed to persist snapshot");
        }

        tracing::debug!(fingerprint = %fingerprint(&text), len = text.len(), "buffer changed");
        let event = ChangeEvent::changed(text.clone(), now);
        self.current = BufferSnapshot::accepted(text, now);
        Some(event)
    }

    fn deny(&self, reason: String) -> ChangeEvent {
        tracing::debug!(%reason, "buffer read denied");
        ChangeEvent::access_denied(reason, self.clock.now())
    }
}
