//! Benchmarks for the state store write path
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use serde_json::{json, Value};
use statehub::persistence::{AdapterRegistry, PersistenceOptions, StorageType};
use statehub::store::{SetOptions, StateChange, StateStore, StoreConfig};

fn bench_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("set");

    group.bench_function("no_subscribers", |b| {
        let store = StateStore::in_memory();
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            store
                .set("bench", black_box(json!({"count": n})), SetOptions::default())
                .unwrap()
        })
    });

    group.bench_function("noop_write", |b| {
        let store = StateStore::in_memory();
        store.set("bench", json!({"count": 1}), SetOptions::default()).unwrap();
        b.iter(|| {
            store
                .set("bench", black_box(json!({"count": 1})), SetOptions::default())
                .unwrap()
        })
    });

    group.bench_function("dotted_path", |b| {
        let store = StateStore::in_memory();
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            store
                .set("bench", black_box(json!({"user.profile.visits": n})), SetOptions::default())
                .unwrap()
        })
    });

    group.finish();
}

fn bench_notify(c: &mut Criterion) {
    let mut group = c.benchmark_group("notify");

    for subscribers in [10, 100, 1000] {
        let store = StateStore::in_memory();
        for i in 0..subscribers {
            // Half match the written key, half filter on something else
            let key = if i % 2 == 0 { "count" } else { "other" };
            store.subscribe_keys("bench", [key], |change: &StateChange| {
                black_box(change.changes.len());
            });
        }

        group.throughput(Throughput::Elements(subscribers as u64));
        group.bench_function(format!("fan_out_{}", subscribers), |b| {
            let mut n = 0u64;
            b.iter(|| {
                n += 1;
                store
                    .set("bench", json!({"count": n}), SetOptions::default())
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_transaction(c: &mut Criterion) {
    c.bench_function("transaction_100_writes", |b| {
        let store = StateStore::in_memory();
        store.subscribe("bench", |change: &StateChange| {
            black_box(change.changes.len());
        });
        let keys: Vec<String> = (0..100).map(|i| format!("k{}", i)).collect();
        let mut round = 0u64;
        b.iter(|| {
            round += 1;
            let tx = store.start_transaction();
            for key in &keys {
                let mut update = serde_json::Map::new();
                update.insert(key.clone(), json!(round));
                store
                    .set("bench", Value::Object(update), SetOptions::default())
                    .unwrap();
            }
            tx.commit();
        })
    });
}

fn bench_persist(c: &mut Criterion) {
    let mut group = c.benchmark_group("persist");

    group.bench_function("memory_adapter", |b| {
        let store = StateStore::new(StoreConfig::default(), AdapterRegistry::in_memory());
        store
            .configure_persistence("bench", PersistenceOptions::new(StorageType::Memory))
            .unwrap();
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            store
                .set("bench", json!({"count": n}), SetOptions::default())
                .unwrap()
        })
    });

    group.bench_function("local_adapter", |b| {
        let dir = tempfile::tempdir().unwrap();
        let registry = AdapterRegistry::with_defaults(dir.path()).unwrap();
        let store = StateStore::new(StoreConfig::default(), registry);
        store
            .configure_persistence("bench", PersistenceOptions::new(StorageType::Local))
            .unwrap();
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            store
                .set("bench", json!({"count": n}), SetOptions::default())
                .unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_set, bench_notify, bench_transaction, bench_persist);
criterion_main!(benches);
