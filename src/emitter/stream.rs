use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};

use crate::error::{DeliveryError, RuntimeError};
use crate::event::ChangeEvent;

use super::Subscriber;

/// Channel-backed subscriber handle.
///
/// Dropping this stream closes it; the emitter prunes the subscription on its
/// next dispatch.
#[derive(Debug)]
pub struct EventStream {
    rx: Receiver<ChangeEvent>,
    shared: Arc<Shared>,
}

/// The emitter side of an [`EventStream`].
#[derive(Debug)]
pub struct StreamSubscriber {
    tx: Sender<ChangeEvent>,
    shared: Arc<Shared>,
}

#[derive(Debug, Default)]
struct Shared {
    closed: AtomicBool,
    dropped: AtomicU64,
}

/// Creates a connected stream/subscriber pair with a bounded buffer.
#[must_use]
pub fn event_stream(capacity: usize) -> (EventStream, StreamSubscriber) {
    let (tx, rx) = bounded(capacity.max(1));
    let shared = Arc::new(Shared::default());
    (
        EventStream {
            rx,
            shared: Arc::clone(&shared),
        },
        StreamSubscriber { tx, shared },
    )
}

impl EventStream {
    /// Best-effort explicit unsubscribe. Idempotent, non-blocking; events
    /// already buffered can still be received.
    pub fn unsubscribe(&self) {
        self.shared.closed.store(true, Ordering::Release);
    }

    /// Events discarded because this stream's buffer was full.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<ChangeEvent, RuntimeError> {
        self.rx.recv().map_err(|_| RuntimeError::Disconnected {
            path: "event_stream".to_string(),
        })
    }

    /// Receive the next event with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<ChangeEvent, RuntimeError> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => RuntimeError::Timeout {
                duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            },
            RecvTimeoutError::Disconnected => RuntimeError::Disconnected {
                path: "event_stream".to_string(),
            },
        })
    }

    /// Take an already-buffered event, if any.
    #[must_use]
    pub fn try_recv(&self) -> Option<ChangeEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Drain every buffered event.
    #[must_use]
    pub fn drain(&self) -> Vec<ChangeEvent> {
        self.rx.try_iter().collect()
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl Subscriber for StreamSubscriber {
    fn notify(&self, event: &ChangeEvent) -> Result<(), DeliveryError> {
        // Never block the observer: a slow reader loses events, not the pipeline.
        match self.tx.try_send(event.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                Err(DeliveryError::Rejected {
                    reason: "stream buffer full".to_string(),
                })
            }
            Err(TrySendError::Disconnected(_)) => Err(DeliveryError::Unavailable {
                reason: "stream dropped".to_string(),
            }),
        }
    }

    fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}
