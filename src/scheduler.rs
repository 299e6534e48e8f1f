//! Debounce scheduling for detection attempts.
//!
//! A single-timer state machine:
//!
//! ```text
//!            Low trigger (restart timer)
//!              ┌──────────┐
//!              ▼          │
//!  Idle ──trigger──▶ Pending ──deadline reached──▶ Idle  (run detection)
//!                      │
//!                      └──High trigger──▶ Idle  (cancel timer, run detection now)
//! ```
//!
//! The scheduler owns no timer. It hands deadlines to its driver (the
//! observer core or the runtime thread), which calls [`DebounceScheduler::fire_due`]
//! once the deadline passes. Every instant comes from the caller, so the
//! machine is fully deterministic.

use chrono::{DateTime, Duration, Utc};

use crate::signal::Confidence;

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No detection pending.
    Idle,
    /// A detection will run once `deadline` passes.
    Pending {
        /// When the pending detection fires.
        deadline: DateTime<Utc>,
    },
}

/// What the driver must do after a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerAction {
    /// Wait; detection is (re)scheduled for `deadline`.
    Scheduled {
        /// When the pending detection fires.
        deadline: DateTime<Utc>,
    },
    /// Run detection now. Any pending timer was cancelled.
    DetectNow,
    /// Suspended; the trigger was discarded.
    Ignored,
}

/// Coalesces trigger bursts into single detection attempts.
#[derive(Debug, Clone)]
pub struct DebounceScheduler {
    window: Duration,
    state: SchedulerState,
    native_available: bool,
    suspended: bool,
}

impl DebounceScheduler {
    /// Creates an idle scheduler with the given quiescence window.
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            state: SchedulerState::Idle,
            native_available: false,
            suspended: false,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SchedulerState {
        self.state
    }

    /// Deadline of the pending detection, if any.
    #[must_use]
    pub const fn next_deadline(&self) -> Option<DateTime<Utc>> {
        match self.state {
            SchedulerState::Idle => None,
            SchedulerState::Pending { deadline } => Some(deadline),
        }
    }

    /// Whether a high-confidence trigger source is registered.
    #[must_use]
    pub const fn native_available(&self) -> bool {
        self.native_available
    }

    /// Updated by the lifecycle controller after (un)registration.
    pub fn set_native_available(&mut self, available: bool) {
        self.native_available = available;
    }

    /// Whether triggers are currently being discarded.
    #[must_use]
    pub const fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Handle one trigger at `now`.
    pub fn on_trigger(&mut self, confidence: Confidence, now: DateTime<Utc>) -> TriggerAction {
        if self.suspended {
            tracing::trace!(?confidence, "scheduler suspended; trigger ignored");
            return TriggerAction::Ignored;
        }

        let confidence = match confidence {
            Confidence::High if !self.native_available => {
                // A native callback that outlived its registration.
                tracing::debug!("high-confidence trigger without native source; debouncing");
                Confidence::Low
            }
            other => other,
        };

        match confidence {
            Confidence::High => {
                if self.cancel() {
                    tracing::trace!("pending detection preempted by high-confidence trigger");
                }
                TriggerAction::DetectNow
            }
            Confidence::Low => {
                let deadline = now + self.window;
                self.state = SchedulerState::Pending { deadline };
                TriggerAction::Scheduled { deadline }
            }
        }
    }

    /// If the pending deadline has passed, return to `Idle` and report that
    /// detection must run.
    pub fn fire_due(&mut self, now: DateTime<Utc>) -> bool {
        match self.state {
            SchedulerState::Pending { deadline } if now >= deadline => {
                self.state = SchedulerState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Drop any pending detection. Returns true if one was pending.
    pub fn cancel(&mut self) -> bool {
        let was_pending = matches!(self.state, SchedulerState::Pending { .. });
        self.state = SchedulerState::Idle;
        was_pending
    }

    /// Cancel pending work and discard triggers until `resume`.
    pub fn suspend(&mut self) {
        self.cancel();
        self.suspended = true;
    }

    /// Accept triggers again and schedule one catch-up detection for changes
    /// made while suspended.
    pub fn resume(&mut self, now: DateTime<Utc>) -> TriggerAction {
        self.suspended = false;
        self.on_trigger(Confidence::Low, now)
    }
}
