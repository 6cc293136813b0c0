//! Performance benchmarks for the observation and prediction pipeline.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kato_engine::{EngineRouter, SessionManager, SymbolBinder};
use kato_core::types::{Observation, SessionConfig};
use kato_storage::{InMemoryMetadataCache, InMemoryPatternStore, InMemorySessionStore, InMemoryVectorBackend};
use std::sync::Arc;
use tokio::runtime::Runtime;

fn build_router() -> EngineRouter {
    let manager = SessionManager::new(
        Arc::new(InMemorySessionStore::new()),
        Arc::new(InMemoryPatternStore::new()),
        Arc::new(InMemoryMetadataCache::new()),
        SymbolBinder::new(Arc::new(InMemoryVectorBackend::new()), 0.95),
        3600,
    );
    EngineRouter::new(Arc::new(manager))
}

fn observation(strings: &[&str]) -> Observation {
    Observation {
        strings: strings.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

fn bench_observe(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let router = build_router();
    rt.block_on(router.create_session("bench", "kb1", SessionConfig::default()))
        .unwrap();

    c.bench_function("observe", |b| {
        b.iter(|| {
            rt.block_on(async {
                router
                    .observe(black_box("bench"), black_box(observation(&["apple", "zebra"])))
                    .await
                    .expect("observe failed")
            })
        })
    });
}

fn bench_observe_with_auto_learn(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let router = build_router();
    let mut config = SessionConfig::default();
    config.max_pattern_length = 4;
    rt.block_on(router.create_session("bench-learn", "kb1", config))
        .unwrap();

    c.bench_function("observe_with_auto_learn", |b| {
        b.iter(|| {
            rt.block_on(async {
                router
                    .observe(black_box("bench-learn"), black_box(observation(&["x"])))
                    .await
                    .expect("observe failed")
            })
        })
    });
}

fn bench_predictions(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let router = build_router();
    rt.block_on(router.create_session("bench-predict", "kb1", SessionConfig::default()))
        .unwrap();
    rt.block_on(router.observe("bench-predict", observation(&["a"])))
        .unwrap();
    rt.block_on(router.observe("bench-predict", observation(&["b"])))
        .unwrap();
    rt.block_on(router.learn("bench-predict")).unwrap();
    rt.block_on(router.observe("bench-predict", observation(&["a"])))
        .unwrap();

    c.bench_function("predictions", |b| {
        b.iter(|| {
            rt.block_on(async {
                router
                    .predictions(black_box("bench-predict"))
                    .await
                    .expect("predictions failed")
            })
        })
    });
}

criterion_group!(benches, bench_observe, bench_observe_with_auto_learn, bench_predictions);
criterion_main!(benches);
