//! Runtime tests: the observer on its worker thread, driven through handles
//! from other threads.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clipwatch::{
    ClipboardObserver, Confidence, EventKind, InMemorySnapshotStore, NativeTriggerSource, ObserverConfig,
    ObserverRuntime, RegistrationError, RuntimeError, SharedBuffer, UiSignal,
};

const WAIT: Duration = Duration::from_secs(5);

struct Native;

impl NativeTriggerSource for Native {
    fn register(&mut self) -> Result<(), RegistrationError> {
        Ok(())
    }

    fn unregister(&mut self) {}
}

fn spawn(buffer: &SharedBuffer, cfg: ObserverConfig) -> ObserverRuntime {
    let observer = ClipboardObserver::builder(Arc::new(buffer.clone()), Arc::new(InMemorySnapshotStore::new()))
        .config(cfg)
        .native_trigger(Box::new(Native))
        .build()
        .unwrap();
    ObserverRuntime::spawn(observer).unwrap()
}

#[test]
fn test_triggers_from_many_threads_coalesce() {
    let buffer = SharedBuffer::with_text("burst");
    let rt = spawn(
        &buffer,
        ObserverConfig {
            quiescence_window_ms: 200,
            ..ObserverConfig::default()
        },
    );
    let handle = rt.handle();
    let stream = handle.subscribe_stream().unwrap();

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let h = handle.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    h.signal(UiSignal::ViewScrolled).unwrap();
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    let ev = stream.recv_timeout(WAIT).unwrap();
    assert_eq!(ev.payload, "burst");

    // 40 triggers inside one window produce exactly one change.
    assert!(matches!(
        stream.recv_timeout(Duration::from_millis(500)),
        Err(RuntimeError::Timeout { .. })
    ));
}

#[test]
fn test_high_trigger_is_synchronous_and_streams_see_everything() {
    let buffer = SharedBuffer::empty();
    let rt = spawn(&buffer, ObserverConfig::default());
    let handle = rt.handle();
    let stream = handle.subscribe_stream().unwrap();

    handle.attach().unwrap();
    assert!(handle.status().has_native_trigger());

    buffer.set_text("native");
    let ev = handle.trigger(Confidence::High).unwrap().unwrap();
    assert_eq!(ev.kind, EventKind::Changed);

    handle.detach().unwrap();

    let kinds: Vec<_> = (0..3).map(|_| stream.recv_timeout(WAIT).unwrap().kind).collect();
    assert_eq!(
        kinds,
        vec![EventKind::LifecycleChanged, EventKind::Changed, EventKind::LifecycleChanged]
    );
    assert!(!handle.status().has_native_trigger());
}

#[test]
fn test_suspended_runtime_ignores_triggers_until_resume() {
    let buffer = SharedBuffer::with_text("hidden");
    let rt = spawn(
        &buffer,
        ObserverConfig {
            quiescence_window_ms: 20,
            ..ObserverConfig::default()
        },
    );
    let handle = rt.handle();
    let stream = handle.subscribe_stream().unwrap();

    handle.suspend().unwrap();
    handle.signal(UiSignal::WindowStateChanged).unwrap();
    assert!(matches!(
        stream.recv_timeout(Duration::from_millis(200)),
        Err(RuntimeError::Timeout { .. })
    ));

    handle.resume().unwrap();
    assert_eq!(stream.recv_timeout(WAIT).unwrap().payload, "hidden");
}

#[test]
fn test_unsubscribed_stream_receives_nothing() {
    let buffer = SharedBuffer::with_text("a");
    let rt = spawn(&buffer, ObserverConfig::default());
    let handle = rt.handle();

    let stream = handle.subscribe_stream().unwrap();
    stream.unsubscribe();
    handle.attach().unwrap();
    handle.trigger(Confidence::High).unwrap();

    assert!(stream.try_recv().is_none());
    let stats = handle.emitter_stats().unwrap();
    assert_eq!(stats.delivered, 0);
    assert_eq!(stats.unobserved, 2);
}

#[test]
fn test_dropping_runtime_stops_worker() {
    let rt = spawn(&SharedBuffer::empty(), ObserverConfig::default());
    let handle = rt.handle();
    handle.attach().unwrap();

    drop(rt);
    assert!(!handle.status().is_active());
    assert!(matches!(handle.attach(), Err(RuntimeError::Disconnected { .. })));
}
