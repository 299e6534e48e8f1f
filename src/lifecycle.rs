//! Attach/detach tracking for the observation subsystem.
//!
//! `ObserverState` is the single owner of the "active" and
//! "has native trigger" flags. Only [`LifecycleController`] writes them; every
//! other component gets a read-only [`ObserverStatus`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::RegistrationError;
use crate::event::ChangeEvent;
use crate::storage::SnapshotStore;
use crate::time::Clock;

/// A platform source of high-confidence "clipboard changed" notifications.
///
/// Registration is best-effort: many platforms only deliver the callback to
/// a focused app, and some never deliver it.
pub trait NativeTriggerSource: Send {
    /// Start delivering native notifications.
    fn register(&mut self) -> Result<(), RegistrationError>;

    /// Stop delivering native notifications. Must tolerate being called when
    /// not registered.
    fn unregister(&mut self);
}

/// A platform without native notifications: registration always fails and
/// the observer runs on low-confidence triggers only.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoNativeTrigger;

impl NativeTriggerSource for NoNativeTrigger {
    fn register(&mut self) -> Result<(), RegistrationError> {
        Err(RegistrationError::new("native clipboard notifications are not available"))
    }

    fn unregister(&mut self) {}
}

#[derive(Debug, Default)]
struct Flags {
    active: AtomicBool,
    native: AtomicBool,
}

/// Process-wide observer flags. Writable only inside this module.
#[derive(Debug, Default)]
pub struct ObserverState {
    flags: Arc<Flags>,
}

impl ObserverState {
    /// A read-only view that stays current.
    #[must_use]
    pub fn status(&self) -> ObserverStatus {
        ObserverStatus {
            flags: Arc::clone(&self.flags),
        }
    }

    fn set_active(&self, active: bool) {
        self.flags.active.store(active, Ordering::Release);
    }

    fn set_native(&self, native: bool) {
        self.flags.native.store(native, Ordering::Release);
    }
}

/// Read-only, cloneable view of the observer flags. Reads may be stale by
/// one transition; that is tolerated by every reader.
#[derive(Debug, Clone)]
pub struct ObserverStatus {
    flags: Arc<Flags>,
}

impl ObserverStatus {
    /// Whether the platform event source is attached.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.flags.active.load(Ordering::Acquire)
    }

    /// Whether high-confidence triggers can currently arrive.
    #[must_use]
    pub fn has_native_trigger(&self) -> bool {
        self.flags.native.load(Ordering::Acquire)
    }
}

/// Drives attach/detach transitions.
pub struct LifecycleController {
    state: ObserverState,
    store: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    native: Box<dyn NativeTriggerSource>,
    registered: bool,
}

impl std::fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("state", &self.state)
            .field("registered", &self.registered)
            .finish_non_exhaustive()
    }
}

impl LifecycleController {
    /// Creates a detached controller.
    ///
    /// A persisted `active = true` can only be left over from a process that
    /// died attached, so it is reset: nothing is attached until `on_attach`.
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
        native: Box<dyn NativeTriggerSource>,
    ) -> Self {
        match store.get_active() {
            Ok(true) => {
                tracing::debug!("clearing stale active flag from previous run");
                persist_active(store.as_ref(), false);
            }
            Ok(false) => {}
            Err(e) => tracing::warn!(error = %e, "failed to read persisted active flag"),
        }

        Self {
            state: ObserverState::default(),
            store,
            clock,
            native,
            registered: false,
        }
    }

    /// Read-only view of the flags.
    #[must_use]
    pub fn status(&self) -> ObserverStatus {
        self.state.status()
    }

    /// Whether a native trigger source is registered.
    #[must_use]
    pub const fn has_native_trigger(&self) -> bool {
        self.registered
    }

    /// The platform attached the observer.
    ///
    /// Returns the `connected` event only on an inactive → active transition.
    /// Native registration is retried on every call until it succeeds.
    pub fn on_attach(&mut self) -> Option<ChangeEvent> {
        if !self.registered {
            match self.native.register() {
                Ok(()) => {
                    tracing::debug!("native clipboard trigger registered");
                    self.registered = true;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "native trigger unavailable; using ambient signals only");
                }
            }
            self.state.set_native(self.registered);
        }

        if self.status().is_active() {
            return None;
        }

        self.state.set_active(true);
        persist_active(self.store.as_ref(), true);
        tracing::info!("clipboard observer attached");
        Some(ChangeEvent::lifecycle(true, self.clock.now()))
    }

    /// The platform detached the observer.
    ///
    /// Returns the `disconnected` event only on an active → inactive transition.
    pub fn on_detach(&mut self) -> Option<ChangeEvent> {
        if self.registered {
            self.native.unregister();
            self.registered = false;
            self.state.set_native(false);
            tracing::debug!("native clipboard trigger unregistered");
        }

        if !self.status().is_active() {
            return None;
        }

        self.state.set_active(false);
        persist_active(self.store.as_ref(), false);
        tracing::info!("clipboard observer detached");
        Some(ChangeEvent::lifecycle(false, self.clock.now()))
    }
}

fn persist_active(store: &dyn SnapshotStore, active: bool) {
    if let Err(e) = store.set_active(active) {
        tracing::warn!(error = %e, active, "failed to persist active flag");
    }
}
