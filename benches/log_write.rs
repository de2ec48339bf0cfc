//! Performance benchmarks for a3s-alertlog
//!
//! Run with: cargo bench

use a3s_alertlog::classifier::ClassifierBuilder;
use a3s_alertlog::types::BatchScope;
use a3s_alertlog::{
    AlertStatus, CallContext, EventType, LogStore, MemoryDestinationRegistry, MemoryProvider,
    Source,
};
use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use uuid::Uuid;

struct Fixture {
    store: LogStore,
    service_id: Uuid,
    alerts: Vec<String>,
    key_ctx: CallContext,
}

fn fixture(alert_count: usize) -> Fixture {
    let provider = MemoryProvider::default();
    let service_id = Uuid::new_v4();
    let alerts = (0..alert_count)
        .map(|_| {
            let id = Uuid::new_v4();
            provider
                .add_alert(id, service_id, AlertStatus::Triggered)
                .unwrap();
            id.to_string()
        })
        .collect();
    let key_id = Uuid::new_v4();
    provider
        .add_integration_key(key_id, "Grafana prod", "grafana")
        .unwrap();

    Fixture {
        store: LogStore::new(
            provider,
            Arc::new(MemoryDestinationRegistry::with_builtin_types()),
        ),
        service_id,
        alerts,
        key_ctx: CallContext::service(Source::IntegrationKey {
            key_id: key_id.to_string(),
        }),
    }
}

fn bench_classifier(c: &mut Criterion) {
    c.bench_function("ClassifierBuilder build", |b| {
        b.iter(|| {
            ClassifierBuilder::new()
                .base("Web")
                .batch(EventType::Acknowledged, BatchScope::Service)
                .build()
        });
    });
}

fn bench_log_tx(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let f = fixture(1);
    let system = CallContext::system();

    c.bench_function("log_tx (system)", |b| {
        b.to_async(&rt).iter(|| async {
            f.store
                .log_tx(&system, None, &f.alerts[0], EventType::NotificationSent, None)
                .await
                .unwrap()
        });
    });

    c.bench_function("log_tx (integration key)", |b| {
        b.to_async(&rt).iter(|| async {
            f.store
                .log_tx(&f.key_ctx, None, &f.alerts[0], EventType::Created, None)
                .await
                .unwrap()
        });
    });
}

fn bench_log_many_throughput(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let system = CallContext::system();

    let mut group = c.benchmark_group("log_many_throughput");
    for count in [10, 100, 1000] {
        let f = fixture(count);
        group.bench_function(format!("{} alerts", count), |b| {
            b.to_async(&rt).iter(|| async {
                f.store
                    .log_many_tx(&system, None, &f.alerts, EventType::Escalated, None)
                    .await
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_service_and_reads(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let f = fixture(100);
    let system = CallContext::system();
    let service_id = f.service_id.to_string();

    // Pre-populate
    rt.block_on(async {
        for _ in 0..10 {
            f.store
                .log_many_tx(&system, None, &f.alerts, EventType::NotificationSent, None)
                .await
                .unwrap();
        }
    });

    c.bench_function("log_service_tx (100 alerts)", |b| {
        b.to_async(&rt).iter(|| async {
            f.store
                .log_service_tx(&system, None, &service_id, EventType::Closed, None)
                .await
                .unwrap()
        });
    });

    c.bench_function("find_latest_by_type", |b| {
        b.to_async(&rt).iter(|| async {
            f.store
                .find_latest_by_type(&system, &f.alerts[0], EventType::NotificationSent)
                .await
                .unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_classifier,
    bench_log_tx,
    bench_log_many_throughput,
    bench_service_and_reads,
);
criterion_main!(benches);
