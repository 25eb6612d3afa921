//! Benchmarks for vigil-core
//!
//! Run with: cargo bench

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use vigil_core::reactive::{with_active_subscriber, Notifier, Subscriber, Watcher};
use vigil_core::{observe, set, Record, Value};

fn wide_record(fields: usize) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = (0..fields)
        .map(|i| (format!("f{i}"), json!({ "n": i, "tags": [i, i + 1] })))
        .collect();
    serde_json::Value::Object(map)
}

// =============================================================================
// WRAPPING
// =============================================================================

fn bench_observe(c: &mut Criterion) {
    let mut group = c.benchmark_group("observe");
    for fields in [10, 100, 1000] {
        let json = wide_record(fields);
        group.bench_with_input(BenchmarkId::from_parameter(fields), &json, |b, json| {
            b.iter(|| {
                let value = Value::from(json.clone());
                black_box(observe(&value, false, false))
            })
        });
    }
    group.finish();
}

// =============================================================================
// FIELD READS AND WRITES
// =============================================================================

fn bench_tracked_read(c: &mut Criterion) {
    let state = Value::from(json!({ "count": 0 }));
    observe(&state, false, false);
    let sub: Arc<dyn Subscriber> = Arc::new(Notifier::new(|_| {}));

    c.bench_function("tracked_read", |b| {
        b.iter(|| with_active_subscriber(sub.clone(), || black_box(state.get("count"))))
    });
}

fn bench_untracked_read(c: &mut Criterion) {
    let state = Value::from(json!({ "count": 0 }));
    observe(&state, false, false);

    c.bench_function("untracked_read", |b| b.iter(|| black_box(state.get("count"))));
}

fn bench_write_same_value(c: &mut Criterion) {
    let state = Value::from(json!({ "count": 42 }));
    observe(&state, false, false);
    let record = state.as_record().cloned().unwrap_or_default();

    c.bench_function("write_same_value", |b| {
        b.iter(|| record.set("count", black_box(42)))
    });
}

fn bench_write_notify(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_notify");
    for subscribers in [1, 10, 100] {
        let state = Value::from(json!({ "count": 0 }));
        observe(&state, false, false);
        let record = state.as_record().cloned().unwrap_or_default();

        let subs: Vec<Arc<dyn Subscriber>> = (0..subscribers)
            .map(|_| Arc::new(Notifier::new(|_| {})) as Arc<dyn Subscriber>)
            .collect();
        for sub in &subs {
            with_active_subscriber(sub.clone(), || state.get("count"));
        }

        let mut n = 0;
        group.bench_with_input(BenchmarkId::from_parameter(subscribers), &record, |b, record| {
            b.iter(|| {
                n += 1;
                record.set("count", n)
            })
        });
    }
    group.finish();
}

// =============================================================================
// WATCHERS AND LISTS
// =============================================================================

fn bench_watcher_rerun(c: &mut Criterion) {
    let state = Value::from(json!({ "a": { "b": { "c": 0 } } }));
    observe(&state, false, false);
    let reader = state.clone();
    let _watcher = Watcher::new(move || {
        black_box(reader.get("a").get("b").get("c"));
    });
    let inner: Record = state.get("a").get("b").as_record().cloned().unwrap_or_default();

    let mut n = 0;
    c.bench_function("watcher_rerun_deep", |b| {
        b.iter(|| {
            n += 1;
            inner.set("c", n)
        })
    });
}

fn bench_list_push(c: &mut Criterion) {
    c.bench_function("list_push_observed", |b| {
        b.iter(|| {
            let state = Value::from(json!({ "items": [] }));
            observe(&state, false, false);
            let items = state.get("items");
            if let Some(list) = items.as_list() {
                for i in 0..100 {
                    let _ = list.push(json!({ "i": i }));
                }
            }
            black_box(items)
        })
    });
}

fn bench_set_new_field(c: &mut Criterion) {
    c.bench_function("set_new_field", |b| {
        b.iter(|| {
            let state = Value::from(json!({}));
            observe(&state, false, false);
            for i in 0..100 {
                let _ = set(&state, format!("k{i}"), i);
            }
            black_box(state)
        })
    });
}

criterion_group!(
    benches,
    bench_observe,
    bench_tracked_read,
    bench_untracked_read,
    bench_write_same_value,
    bench_write_notify,
    bench_watcher_rerun,
    bench_list_push,
    bench_set_new_field,
);
criterion_main!(benches);
