//! The observer core: scheduler, detector, lifecycle and emitter wired into
//! one single-threaded state machine.
//!
//! Nothing in here locks or spawns. The owner must serialize every call
//! (triggers, `poll`, attach/detach) onto one context; [`crate::runtime`]
//! does that for multi-threaded hosts.
//!
//! ```text
//! trigger ──▶ DebounceScheduler ──(DetectNow | deadline via poll)──▶ ChangeDetector
//!                                                                      │
//!                                           snapshot store ◀── accept ─┤
//!                                                                      ▼
//!                                               AlertSink ◀── Changed ── EventEmitter ──▶ subscribers
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::ObserverConfig;
use crate::detector::ChangeDetector;
use crate::emitter::{event_stream, AlertSink, EmitterStats, EventEmitter, EventStream, NoAlerts, Subscriber, SubscriptionId};
use crate::error::ObserverResult;
use crate::event::{summarize, ChangeEvent};
use crate::lifecycle::{LifecycleController, NativeTriggerSource, NoNativeTrigger, ObserverStatus};
use crate::scheduler::{DebounceScheduler, SchedulerState, TriggerAction};
use crate::signal::{Confidence, UiSignal};
use crate::snapshot::BufferSnapshot;
use crate::source::ClipboardSource;
use crate::storage::SnapshotStore;
use crate::time::{until, Clock, SystemClock};

/// Single-threaded clipboard observer.
pub struct ClipboardObserver {
    cfg: ObserverConfig,
    clock: Arc<dyn Clock>,
    source: Arc<dyn ClipboardSource>,
    detector: ChangeDetector,
    scheduler: DebounceScheduler,
    lifecycle: LifecycleController,
    emitter: EventEmitter,
    alerts: Box<dyn AlertSink>,
    detections: u64,
}

impl std::fmt::Debug for ClipboardObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipboardObserver")
            .field("detector", &self.detector)
            .field("scheduler", &self.scheduler)
            .field("lifecycle", &self.lifecycle)
            .field("emitter", &self.emitter)
            .field("detections", &self.detections)
            .finish_non_exhaustive()
    }
}

impl ClipboardObserver {
    /// Start building an observer reading `source` and persisting to `store`.
    pub fn builder(source: Arc<dyn ClipboardSource>, store: Arc<dyn SnapshotStore>) -> ObserverBuilder {
        ObserverBuilder {
            source,
            store,
            cfg: ObserverConfig::default(),
            clock: Arc::new(SystemClock),
            native: Box::new(NoNativeTrigger),
            alerts: Box::new(NoAlerts),
        }
    }

    /// Handle a trigger.
    ///
    /// Returns the event produced if detection ran synchronously (High
    /// confidence with a registered native source); `None` when detection was
    /// deferred, ignored, or found nothing new.
    pub fn on_trigger(&mut self, confidence: Confidence) -> Option<ChangeEvent> {
        match self.scheduler.on_trigger(confidence, self.clock.now()) {
            TriggerAction::DetectNow => self.run_detection(),
            TriggerAction::Scheduled { .. } | TriggerAction::Ignored => None,
        }
    }

    /// Handle a platform UI signal.
    pub fn on_signal(&mut self, signal: UiSignal) -> Option<ChangeEvent> {
        self.on_trigger(signal.confidence())
    }

    /// Run the pending detection if its deadline has passed.
    ///
    /// The driver calls this when the clock reaches [`Self::next_deadline`].
    pub fn poll(&mut self) -> Option<ChangeEvent> {
        if self.scheduler.fire_due(self.clock.now()) {
            self.run_detection()
        } else {
            None
        }
    }

    /// A periodic poll tick, for hosts that also poll the buffer.
    ///
    /// Acts as a low-confidence trigger, except that it is skipped while
    /// detached or while a detection is already pending: a tick never pushes
    /// an existing deadline out. Returns whether a trigger was issued.
    pub fn on_poll_tick(&mut self) -> bool {
        if !self.lifecycle.status().is_active() || self.scheduler.next_deadline().is_some() {
            return false;
        }
        self.on_trigger(Confidence::Low);
        true
    }

    /// When the driver must next call [`Self::poll`].
    #[must_use]
    pub const fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.scheduler.next_deadline()
    }

    /// How long until the pending deadline, by the observer's clock.
    #[must_use]
    pub fn time_to_deadline(&self) -> Option<std::time::Duration> {
        self.next_deadline().map(|deadline| until(deadline, self.clock.now()))
    }

    /// Scheduler state, for diagnostics.
    #[must_use]
    pub const fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// The platform attached the observer.
    pub fn on_attach(&mut self) -> Option<ChangeEvent> {
        let event = self.lifecycle.on_attach();
        self.scheduler.set_native_available(self.lifecycle.has_native_trigger());
        self.emit(event)
    }

    /// The platform detached the observer. Pending detection is cancelled.
    pub fn on_detach(&mut self) -> Option<ChangeEvent> {
        let event = self.lifecycle.on_detach();
        self.scheduler.set_native_available(false);
        if self.scheduler.cancel() {
            tracing::debug!("pending detection cancelled by detach");
        }
        self.emit(event)
    }

    /// Stop reacting to triggers (e.g., the screen went off).
    pub fn suspend(&mut self) {
        self.scheduler.suspend();
        tracing::debug!("observer suspended");
    }

    /// React to triggers again; one catch-up detection is scheduled.
    pub fn resume(&mut self) {
        let action = self.scheduler.resume(self.clock.now());
        tracing::debug!(?action, "observer resumed");
    }

    /// Whether triggers are being discarded.
    #[must_use]
    pub const fn is_suspended(&self) -> bool {
        self.scheduler.is_suspended()
    }

    /// The last accepted snapshot (what a late subscriber should read).
    #[must_use]
    pub const fn snapshot(&self) -> &BufferSnapshot {
        self.detector.snapshot()
    }

    /// Read-only view of the attach flags.
    #[must_use]
    pub fn status(&self) -> ObserverStatus {
        self.lifecycle.status()
    }

    /// Add a subscriber.
    pub fn subscribe(&mut self, subscriber: Box<dyn Subscriber>) -> SubscriptionId {
        self.emitter.subscribe(subscriber)
    }

    /// Add a channel-backed subscriber sized by the config.
    pub fn subscribe_stream(&mut self) -> EventStream {
        let (stream, subscriber) = event_stream(self.cfg.stream_capacity);
        self.emitter.subscribe(Box::new(subscriber));
        stream
    }

    /// Remove a subscriber.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.emitter.unsubscribe(id)
    }

    /// Delivery counters.
    #[must_use]
    pub const fn emitter_stats(&self) -> EmitterStats {
        self.emitter.stats()
    }

    /// Number of detection attempts run so far.
    #[must_use]
    pub const fn detections(&self) -> u64 {
        self.detections
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &ObserverConfig {
        &self.cfg
    }

    fn run_detection(&mut self) -> Option<ChangeEvent> {
        self.detections += 1;
        let event = self.detector.detect_from(self.source.as_ref())?;

        if event.is_change() {
            let summary = summarize(&event.payload, self.cfg.summary_max_chars);
            let alerts = &self.alerts;
            if catch_unwind(AssertUnwindSafe(|| alerts.show_alert(&summary))).is_err() {
                tracing::warn!("alert sink panicked; continuing");
            }
        }

        self.emit(Some(event))
    }

    fn emit(&mut self, event: Option<ChangeEvent>) -> Option<ChangeEvent> {
        let event = event?;
        self.emitter.emit(event.clone());
        Some(event)
    }
}

/// Builder for [`ClipboardObserver`].
pub struct ObserverBuilder {
    source: Arc<dyn ClipboardSource>,
    store: Arc<dyn SnapshotStore>,
    cfg: ObserverConfig,
    clock: Arc<dyn Clock>,
    native: Box<dyn NativeTriggerSource>,
    alerts: Box<dyn AlertSink>,
}

impl ObserverBuilder {
    /// Use `cfg` instead of the defaults.
    #[must_use]
    pub fn config(mut self, cfg: ObserverConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Use `clock` instead of the system clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The platform's native change-notification source.
    #[must_use]
    pub fn native_trigger(mut self, native: Box<dyn NativeTriggerSource>) -> Self {
        self.native = native;
        self
    }

    /// Where change summaries are shown.
    #[must_use]
    pub fn alerts(mut self, alerts: Box<dyn AlertSink>) -> Self {
        self.alerts = alerts;
        self
    }

    /// Validate the config and assemble the observer.
    pub fn build(self) -> ObserverResult<ClipboardObserver> {
        let cfg = self.cfg.validate()?;

        let detector = ChangeDetector::new(Arc::clone(&self.store), Arc::clone(&self.clock), cfg.denial_message.clone());
        let lifecycle = LifecycleController::new(self.store, Arc::clone(&self.clock), self.native);
        let scheduler = DebounceScheduler::new(cfg.quiescence_window());

        Ok(ClipboardObserver {
            cfg,
            clock: self.clock,
            source: self.source,
            detector,
            scheduler,
            lifecycle,
            emitter: EventEmitter::new(),
            alerts: self.alerts,
            detections: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistrationError;
    use crate::event::EventKind;
    use crate::source::SharedBuffer;
    use crate::storage::InMemorySnapshotStore;
    use crate::time::{from_millis, ManualClock};
    use chrono::Duration;
    use std::sync::Mutex;

    struct AlwaysRegisters;

    impl NativeTriggerSource for AlwaysRegisters {
        fn register(&mut self) -> Result<(), RegistrationError> {
            Ok(())
        }
        fn unregister(&mut self) {}
    }

    #[derive(Clone, Default)]
    struct RecordingAlerts(Arc<Mutex<Vec<String>>>);

    impl AlertSink for RecordingAlerts {
        fn show_alert(&self, summary: &str) {
            self.0.lock().unwrap().push(summary.to_string());
        }
    }

    fn observer(buffer: &SharedBuffer, clock: &ManualClock) -> ClipboardObserver {
        ClipboardObserver::builder(Arc::new(buffer.clone()), Arc::new(InMemorySnapshotStore::new()))
            .clock(Arc::new(clock.clone()))
            .native_trigger(Box::new(AlwaysRegisters))
            .build()
            .unwrap()
    }

    #[test]
    fn test_burst_reads_buffer_at_fire_time() {
        let buffer = SharedBuffer::with_text("first");
        let clock = ManualClock::at_millis(0);
        let mut obs = observer(&buffer, &clock);

        obs.on_signal(UiSignal::ViewFocused);
        clock.advance(Duration::milliseconds(100));
        obs.on_signal(UiSignal::TextSelectionChanged);
        buffer.set_text("second");

        clock.advance(Duration::milliseconds(299));
        assert!(obs.poll().is_none());
        assert_eq!(obs.detections(), 0);

        clock.advance(Duration::milliseconds(1));
        let ev = obs.poll().unwrap();
        assert_eq!(ev.payload, "second");
        assert_eq!(ev.timestamp, from_millis(400));
        assert_eq!(obs.detections(), 1);
    }

    #[test]
    fn test_native_trigger_is_synchronous_after_attach() {
        let buffer = SharedBuffer::with_text("x");
        let clock = ManualClock::at_millis(0);
        let mut obs = observer(&buffer, &clock);

        // Before attach there is no native source: High is debounced.
        assert!(obs.on_signal(UiSignal::NativeClipChanged).is_none());
        assert!(obs.next_deadline().is_some());

        obs.on_attach();
        assert!(obs.status().has_native_trigger());
        let ev = obs.on_signal(UiSignal::NativeClipChanged).unwrap();
        assert_eq!(ev.payload, "x");
        assert_eq!(obs.next_deadline(), None);
    }

    #[test]
    fn test_alert_is_truncated_but_event_is_not() {
        let long = "é".repeat(100);
        let buffer = SharedBuffer::with_text(long.clone());
        let clock = ManualClock::at_millis(0);
        let alerts = RecordingAlerts::default();
        let mut obs = ClipboardObserver::builder(Arc::new(buffer), Arc::new(InMemorySnapshotStore::new()))
            .clock(Arc::new(clock.clone()))
            .native_trigger(Box::new(AlwaysRegisters))
            .alerts(Box::new(alerts.clone()))
            .build()
            .unwrap();
        let stream = obs.subscribe_stream();

        obs.on_attach();
        obs.on_trigger(Confidence::High).unwrap();

        let shown = alerts.0.lock().unwrap().clone();
        assert_eq!(shown, vec![format!("{}…", "é".repeat(60))]);

        let events = stream.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::LifecycleChanged);
        assert_eq!(events[1].payload, long);
        assert_eq!(obs.snapshot().content.as_deref(), Some(long.as_str()));
    }

    #[test]
    fn test_detach_cancels_pending() {
        let buffer = SharedBuffer::with_text("x");
        let clock = ManualClock::at_millis(0);
        let mut obs = observer(&buffer, &clock);

        obs.on_attach();
        obs.on_trigger(Confidence::Low);
        obs.on_detach();

        clock.advance(Duration::seconds(1));
        assert!(obs.poll().is_none());
        assert_eq!(obs.detections(), 0);
        assert!(!obs.status().has_native_trigger());
    }

    #[test]
    fn test_suspend_resume_catches_up() {
        let buffer = SharedBuffer::with_text("before");
        let clock = ManualClock::at_millis(0);
        let mut obs = observer(&buffer, &clock);

        obs.suspend();
        buffer.set_text("while off");
        assert!(obs.on_trigger(Confidence::Low).is_none());
        assert!(obs.next_deadline().is_none());

        obs.resume();
        assert!(!obs.is_suspended());
        clock.advance(Duration::milliseconds(300));
        assert_eq!(obs.poll().unwrap().payload, "while off");
    }

    #[test]
    fn test_poll_ticks_never_push_the_deadline_out() {
        let buffer = SharedBuffer::empty();
        let clock = ManualClock::at_millis(0);
        let mut obs = observer(&buffer, &clock);

        assert!(!obs.on_poll_tick(), "detached ticks are ignored");
        obs.on_attach();

        buffer.set_text("copied");
        assert!(obs.on_poll_tick());
        assert_eq!(obs.next_deadline(), Some(from_millis(300)));

        // Ticks every 100 ms inside the window leave the deadline alone.
        for t in [100, 200] {
            clock.set_millis(t);
            assert!(!obs.on_poll_tick());
            assert!(obs.poll().is_none());
        }
        assert_eq!(obs.next_deadline(), Some(from_millis(300)));

        clock.set_millis(300);
        assert_eq!(obs.poll().unwrap().payload, "copied");
        assert!(obs.on_poll_tick());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = ClipboardObserver::builder(Arc::new(SharedBuffer::empty()), Arc::new(InMemorySnapshotStore::new()))
            .config(ObserverConfig {
                stream_capacity: 0,
                ..ObserverConfig::default()
            })
            .build();
        assert!(result.unwrap_err().is_config());
    }
}
