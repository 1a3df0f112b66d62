//! Benchmarks for request classification and cache lookups.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use offline_agent::cache::memory::MemoryCacheStore;
use offline_agent::cache::{CacheStore, CachedResponse, RequestKey};
use offline_agent::http::AgentRequest;
use offline_agent::router::Router;

fn bench_classify(c: &mut Criterion) {
    let router = Router::default();
    let requests = vec![
        AgentRequest::get("/static/app.js?v=12"),
        AgentRequest::navigation("/cars/42"),
        AgentRequest::get("/api/vehicles?group=B"),
        AgentRequest::get("/favicon.ico"),
    ];

    c.bench_function("classify_mixed_4", |b| {
        b.iter(|| {
            for req in &requests {
                black_box(router.classify(black_box(req)));
            }
        })
    });
}

fn bench_memory_store_get(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = MemoryCacheStore::new();
    let handle = rt.block_on(async {
        let handle = store.open("bench-v1").await.unwrap();
        for i in 0..10_000 {
            store
                .put(
                    &handle,
                    RequestKey::get(&format!("/static/asset-{i}.js")),
                    CachedResponse::new(200).with_body(vec![0u8; 256]),
                )
                .await
                .unwrap();
        }
        handle
    });
    let key = RequestKey::get("/static/asset-5000.js");

    c.bench_function("memory_store_get_hit_10k", |b| {
        b.iter(|| {
            let hit = rt.block_on(store.get(&handle, black_box(&key))).unwrap();
            black_box(hit);
        })
    });
}

criterion_group!(benches, bench_classify, bench_memory_store_get);
criterion_main!(benches);
