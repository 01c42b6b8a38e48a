use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::runtime::Runtime;

use stockledger_core::{Actor, StockId};
use stockledger_infra::{InMemoryStockStore, StockChanges, StockService};
use stockledger_inventory::AdjustmentKind;

type Service = StockService<Arc<InMemoryStockStore>>;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

fn setup(rt: &Runtime, items: usize) -> (Service, Vec<StockId>) {
    let service = StockService::new(Arc::new(InMemoryStockStore::new()));
    let actor = Actor::system();
    let ids = rt.block_on(async {
        let mut ids = Vec::with_capacity(items);
        for i in 0..items {
            let item = service
                .create(&format!("Item {i}"), (i % 50) as i64, dec!(1.25), &actor)
                .await
                .unwrap();
            ids.push(item.id_typed());
        }
        ids
    });
    (service, ids)
}

fn bench_write_latency(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("write_latency");

    group.bench_function("create", |b| {
        let (service, _) = setup(&rt, 0);
        let actor = Actor::system();
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            rt.block_on(service.create(&format!("Bench {n}"), black_box(10), dec!(2.50), &actor))
                .unwrap();
        });
    });

    group.bench_function("update_quantity", |b| {
        let (service, ids) = setup(&rt, 1);
        let actor = Actor::system();
        let mut q = 0i64;
        b.iter(|| {
            q = (q + 1) % 1000;
            let changes = StockChanges {
                quantity: Some(black_box(q)),
                ..Default::default()
            };
            rt.block_on(service.update(ids[0], changes, &actor, None)).unwrap();
        });
    });

    group.bench_function("adjust", |b| {
        let (service, ids) = setup(&rt, 1);
        let actor = Actor::system();
        let mut q = 0i64;
        b.iter(|| {
            q = (q + 1) % 1000;
            let kind = AdjustmentKind::Correction;
            rt.block_on(service.adjust(ids[0], black_box(q), kind, "recount", &actor))
                .unwrap();
        });
    });

    group.finish();
}

fn bench_history_query(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("history_query");

    for depth in [10usize, 100, 1000] {
        let (service, ids) = setup(&rt, 1);
        let actor = Actor::system();
        rt.block_on(async {
            for _ in 0..depth {
                service.release(ids[0], 1, &actor).await.unwrap();
            }
        });
        group.bench_with_input(BenchmarkId::new("latest_50", depth), &depth, |b, _| {
            b.iter(|| black_box(rt.block_on(service.history(ids[0], Some(50))).unwrap()));
        });
    }

    group.finish();
}

fn bench_report(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("stock_report");

    for items in [10usize, 100, 1000] {
        let (service, _) = setup(&rt, items);
        group.throughput(Throughput::Elements(items as u64));
        group.bench_with_input(BenchmarkId::new("build", items), &items, |b, _| {
            b.iter(|| black_box(rt.block_on(service.report()).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_write_latency, bench_history_query, bench_report);
criterion_main!(benches);
