use std::sync::Arc;

use chrono::Duration;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use clipwatch::{
    ChangeDetector, ClipboardObserver, Confidence, DebounceScheduler, InMemorySnapshotStore, ManualClock,
    SharedBuffer,
};

fn bench_detector(c: &mut Criterion) {
    let mut group = c.benchmark_group("detector");
    let text = "y".repeat(4 * 1024);
    group.throughput(Throughput::Bytes(text.len() as u64));

    group.bench_function("unchanged_4k", |b| {
        let store = Arc::new(InMemorySnapshotStore::new());
        let clock = Arc::new(ManualClock::at_millis(0));
        let mut detector = ChangeDetector::new(store, clock, "denied");
        detector.detect(Some(text.clone()));
        b.iter(|| detector.detect(Some(text.clone())));
    });

    group.bench_function("changed_4k", |b| {
        let store = Arc::new(InMemorySnapshotStore::new());
        let clock = Arc::new(ManualClock::at_millis(0));
        let mut detector = ChangeDetector::new(store, clock, "denied");
        let mut flip = false;
        let other = format!("{text}!");
        b.iter(|| {
            flip = !flip;
            detector.detect(Some(if flip { text.clone() } else { other.clone() }))
        });
    });

    group.finish();
}

fn bench_scheduler(c: &mut Criterion) {
    c.bench_function("scheduler/low_trigger_burst_64", |b| {
        b.iter_batched(
            || DebounceScheduler::new(Duration::milliseconds(300)),
            |mut scheduler| {
                let base = clipwatch::time::from_millis(0);
                for i in 0..64 {
                    scheduler.on_trigger(Confidence::Low, base + Duration::milliseconds(i));
                }
                scheduler.fire_due(base + Duration::milliseconds(400))
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_observer(c: &mut Criterion) {
    c.bench_function("observer/low_trigger_reschedule", |b| {
        let buffer = SharedBuffer::with_text("steady");
        let clock = ManualClock::at_millis(0);
        let mut observer = ClipboardObserver::builder(Arc::new(buffer), Arc::new(InMemorySnapshotStore::new()))
            .clock(Arc::new(clock))
            .build()
            .unwrap();
        b.iter(|| {
            observer.on_trigger(Confidence::Low);
            observer.poll()
        });
    });
}

criterion_group!(benches, bench_detector, bench_scheduler, bench_observer);
criterion_main!(benches);
