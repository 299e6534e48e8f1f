//! Threaded driver for [`ClipboardObserver`].
//!
//! The observer is moved onto a dedicated worker thread. Every platform
//! callback becomes a command on one bounded channel, so triggers, timer
//! expiry and lifecycle changes are serialized without locks. The worker
//! sleeps on `recv_timeout` until the next debounce deadline or poll tick.
//!
//! Low-confidence triggers use `try_send` and are dropped (and counted) when
//! the queue is full: a later trigger covers the same change. Everything
//! else waits for queue space.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::emitter::{event_stream, EmitterStats, EventStream, Subscriber, SubscriptionId};
use crate::error::{ObserverError, ObserverResult, RuntimeError};
use crate::event::ChangeEvent;
use crate::lifecycle::ObserverStatus;
use crate::observer::ClipboardObserver;
use crate::signal::{Confidence, UiSignal};
use crate::snapshot::BufferSnapshot;

enum Command {
    Trigger(Confidence),
    TriggerSync {
        confidence: Confidence,
        reply: Sender<Option<ChangeEvent>>,
    },
    Attach {
        reply: Sender<Option<ChangeEvent>>,
    },
    Detach {
        reply: Sender<Option<ChangeEvent>>,
    },
    Subscribe {
        subscriber: Box<dyn Subscriber>,
        reply: Sender<SubscriptionId>,
    },
    Unsubscribe {
        id: SubscriptionId,
        reply: Sender<bool>,
    },
    Snapshot {
        reply: Sender<BufferSnapshot>,
    },
    Stats {
        reply: Sender<EmitterStats>,
    },
    Suspend,
    Resume,
    Shutdown,
}

/// Owns the worker thread. Dropping it shuts the observer down.
#[derive(Debug)]
pub struct ObserverRuntime {
    handle: ObserverHandle,
    stopping: Arc<AtomicBool>,
    join: Mutex<Option<JoinHandle<()>>>,
}

/// Cloneable, thread-safe entry point into a running observer.
///
/// The blocking methods wait for the worker; never call them from inside a
/// subscriber or alert sink, which run on the worker itself.
#[derive(Debug, Clone)]
pub struct ObserverHandle {
    tx: Sender<Command>,
    status: ObserverStatus,
    stream_capacity: usize,
    dropped_triggers: Arc<AtomicU64>,
}

impl ObserverRuntime {
    /// Move `observer` onto a new worker thread.
    pub fn spawn(observer: ClipboardObserver) -> ObserverResult<Self> {
        let cfg = observer.config().clone();
        let (tx, rx) = bounded::<Command>(cfg.command_queue_capacity.max(1));
        let status = observer.status();
        let poll_interval = cfg.poll_interval();
        let stopping = Arc::new(AtomicBool::new(false));

        let thread_stopping = Arc::clone(&stopping);
        let join = thread::Builder::new()
            .name("clipwatch-observer".to_string())
            .spawn(move || worker_loop(observer, &rx, poll_interval, &thread_stopping))
            .map_err(|e| ObserverError::internal(format!("failed to spawn observer worker: {e}")))?;

        tracing::debug!(queue = cfg.command_queue_capacity, ?poll_interval, "observer runtime started");

        Ok(Self {
            handle: ObserverHandle {
                tx,
                status,
                stream_capacity: cfg.stream_capacity,
                dropped_triggers: Arc::new(AtomicU64::new(0)),
            },
            stopping,
            join: Mutex::new(Some(join)),
        })
    }

    /// A new handle to the running observer.
    #[must_use]
    pub fn handle(&self) -> ObserverHandle {
        self.handle.clone()
    }

    /// Stop the worker and wait for it. The observer is detached first.
    pub fn shutdown(self) -> ObserverResult<()> {
        self.stop()
    }

    fn stop(&self) -> ObserverResult<()> {
        self.stopping.store(true, Ordering::Release);

        let handle = match self.join.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(handle) = handle else {
            return Ok(());
        };
        if handle.thread().id() == thread::current().id() {
            // Dropped from a callback on the worker. Sending here could block on
            // our own full queue; the flag ends the loop once the callback returns.
            return Ok(());
        }

        // Wake the worker. A send error means it is already gone.
        let _ = self.handle.tx.send(Command::Shutdown);
        handle
            .join()
            .map_err(|_| ObserverError::internal("observer worker panicked"))
    }
}

impl Drop for ObserverRuntime {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::error!(error = %e, "observer runtime did not shut down cleanly");
        }
    }
}

impl ObserverHandle {
    /// Deliver a trigger.
    ///
    /// Low confidence is enqueued without blocking and returns `None`; the
    /// detection runs on the worker after the quiescence window. High
    /// confidence waits for the worker and returns whatever its detection
    /// produced (it is debounced like Low when no native source is registered).
    pub fn trigger(&self, confidence: Confidence) -> Result<Option<ChangeEvent>, RuntimeError> {
        match confidence {
            Confidence::Low => match self.tx.try_send(Command::Trigger(confidence)) {
                Ok(()) => Ok(None),
                Err(TrySendError::Full(_)) => {
                    self.dropped_triggers.fetch_add(1, Ordering::Relaxed);
                    Err(RuntimeError::QueueFull)
                }
                Err(TrySendError::Disconnected(_)) => Err(disconnected()),
            },
            Confidence::High => self.request(|reply| Command::TriggerSync { confidence, reply }),
        }
    }

    /// Deliver a platform UI signal. See [`Self::trigger`].
    pub fn signal(&self, signal: UiSignal) -> Result<Option<ChangeEvent>, RuntimeError> {
        self.trigger(signal.confidence())
    }

    /// Attach the observer; returns the `connected` event on a transition.
    pub fn attach(&self) -> Result<Option<ChangeEvent>, RuntimeError> {
        self.request(|reply| Command::Attach { reply })
    }

    /// Detach the observer; returns the `disconnected` event on a transition.
    pub fn detach(&self) -> Result<Option<ChangeEvent>, RuntimeError> {
        self.request(|reply| Command::Detach { reply })
    }

    /// Stop reacting to triggers.
    pub fn suspend(&self) -> Result<(), RuntimeError> {
        self.tx.send(Command::Suspend).map_err(|_| disconnected())
    }

    /// Resume after [`Self::suspend`]; a catch-up detection is scheduled.
    pub fn resume(&self) -> Result<(), RuntimeError> {
        self.tx.send(Command::Resume).map_err(|_| disconnected())
    }

    /// Add a subscriber.
    pub fn subscribe(&self, subscriber: Box<dyn Subscriber>) -> Result<SubscriptionId, RuntimeError> {
        self.request(|reply| Command::Subscribe { subscriber, reply })
    }

    /// Add a channel-backed subscriber.
    pub fn subscribe_stream(&self) -> Result<EventStream, RuntimeError> {
        let (stream, subscriber) = event_stream(self.stream_capacity);
        self.subscribe(Box::new(subscriber))?;
        Ok(stream)
    }

    /// Remove a subscriber.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, RuntimeError> {
        self.request(|reply| Command::Unsubscribe { id, reply })
    }

    /// The last accepted snapshot.
    pub fn snapshot(&self) -> Result<BufferSnapshot, RuntimeError> {
        self.request(|reply| Command::Snapshot { reply })
    }

    /// Delivery counters.
    pub fn emitter_stats(&self) -> Result<EmitterStats, RuntimeError> {
        self.request(|reply| Command::Stats { reply })
    }

    /// Read-only attach flags. Lock-free.
    #[must_use]
    pub fn status(&self) -> ObserverStatus {
        self.status.clone()
    }

    /// Low-confidence triggers dropped on a full queue.
    #[must_use]
    pub fn dropped_triggers(&self) -> u64 {
        self.dropped_triggers.load(Ordering::Relaxed)
    }

    fn request<T>(&self, build: impl FnOnce(Sender<T>) -> Command) -> Result<T, RuntimeError> {
        let (reply_tx, reply_rx) = bounded::<T>(1);
        self.tx.send(build(reply_tx)).map_err(|_| disconnected())?;
        reply_rx.recv().map_err(|_| disconnected())
    }
}

fn disconnected() -> RuntimeError {
    RuntimeError::Disconnected {
        path: "observer_commands".to_string(),
    }
}

fn worker_loop(
    mut observer: ClipboardObserver,
    rx: &Receiver<Command>,
    poll_interval: Option<Duration>,
    stopping: &AtomicBool,
) {
    let mut next_poll = poll_interval.map(|interval| Instant::now() + interval);

    while !stopping.load(Ordering::Acquire) {
        let poll_wait = next_poll.map(|at| at.saturating_duration_since(Instant::now()));
        let wait = match (observer.time_to_deadline(), poll_wait) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        let received = match wait {
            Some(timeout) => rx.recv_timeout(timeout),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(command) => handle_command(&mut observer, command),
            Err(RecvTimeoutError::Timeout) => {}
        }

        observer.poll();

        if let (Some(at), Some(interval)) = (next_poll, poll_interval) {
            if Instant::now() >= at {
                observer.on_poll_tick();
                next_poll = Some(Instant::now() + interval);
            }
        }
    }

    observer.on_detach();
    tracing::debug!(detections = observer.detections(), "observer runtime stopped");
}

fn handle_command(observer: &mut ClipboardObserver, command: Command) {
    // Reply send errors mean the caller gave up waiting; nothing to do.
    match command {
        Command::Trigger(confidence) => {
            observer.on_trigger(confidence);
        }
        Command::TriggerSync { confidence, reply } => {
            let _ = reply.send(observer.on_trigger(confidence));
        }
        Command::Attach { reply } => {
            let _ = reply.send(observer.on_attach());
        }
        Command::Detach { reply } => {
            let _ = reply.send(observer.on_detach());
        }
        Command::Subscribe { subscriber, reply } => {
            let _ = reply.send(observer.subscribe(subscriber));
        }
        Command::Unsubscribe { id, reply } => {
            let _ = reply.send(observer.unsubscribe(id));
        }
        Command::Snapshot { reply } => {
            let _ = reply.send(observer.snapshot().clone());
        }
        Command::Stats { reply } => {
            let _ = reply.send(observer.emitter_stats());
        }
        Command::Suspend => observer.suspend(),
        Command::Resume => observer.resume(),
        Command::Shutdown => {}
    }
}
