//! # clipwatch - Clipboard change observation
//!
//! clipwatch watches a shared text buffer (the system clipboard) that gives no
//! reliable change notification of its own. It turns a mix of verified
//! native notifications and noisy UI hints into a de-duplicated stream of
//! change events, persisting the last accepted content across restarts.
//!
//! ## Core Concepts
//!
//! - **Snapshot**: the last accepted buffer content and when it was accepted
//! - **Trigger**: a hint that the buffer may have changed, `High` or `Low` confidence
//! - **Debounce**: bursts of `Low` triggers collapse into one detection after a quiet window
//! - **Event**: `Changed`, `AccessDenied` or `LifecycleChanged`, fanned out to subscribers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use clipwatch::{ClipboardObserver, InMemorySnapshotStore, ObserverRuntime, SharedBuffer, UiSignal};
//!
//! let buffer = SharedBuffer::empty();
//! let observer = ClipboardObserver::builder(Arc::new(buffer.clone()), Arc::new(InMemorySnapshotStore::new()))
//!     .build()?;
//! let runtime = ObserverRuntime::spawn(observer)?;
//! let handle = runtime.handle();
//!
//! let events = handle.subscribe_stream()?;
//! handle.attach()?;
//! buffer.set_text("hello");
//! handle.signal(UiSignal::TextSelectionChanged)?;
//! let changed = events.recv()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod config;
pub mod error;
pub mod event;
pub mod signal;
pub mod snapshot;
pub mod time;

// Components
pub mod detector;
pub mod emitter;
pub mod lifecycle;
pub mod scheduler;
pub mod source;
pub mod storage;

// Composition
pub mod observer;
pub mod runtime;

pub use config::ObserverConfig;
pub use detector::ChangeDetector;
pub use emitter::{
    AlertSink, EmitterStats, EventEmitter, EventStream, FnSubscriber, NoAlerts, Subscriber, SubscriptionId,
};
pub use error::{
    AccessDenied, ConfigError, DeliveryError, ObserverError, ObserverResult, RegistrationError, RuntimeError,
};
pub use event::{summarize, ChangeEvent, EventKind, STATUS_CONNECTED, STATUS_DISCONNECTED};
pub use lifecycle::{LifecycleController, NativeTriggerSource, NoNativeTrigger, ObserverState, ObserverStatus};
pub use observer::{ClipboardObserver, ObserverBuilder};
pub use runtime::{ObserverHandle, ObserverRuntime};
pub use scheduler::{DebounceScheduler, SchedulerState, TriggerAction};
pub use signal::{Confidence, UiSignal};
pub use snapshot::BufferSnapshot;
pub use source::{ClipboardSource, SharedBuffer};
pub use storage::{InMemorySnapshotStore, SnapshotStore, StorageError};
pub use time::{Clock, ManualClock, SystemClock};

#[cfg(feature = "persistent")]
pub use storage::{open_store, FileSnapshotStore, PersistentConfig};

#[cfg(feature = "system-clipboard")]
pub use source::ArboardSource;
