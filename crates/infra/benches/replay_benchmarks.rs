use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

use stockledger_core::{FixedClock, MovementId, ProductId};
use stockledger_infra::engine::{BackwardReplayEngine, ForwardReplayEngine};
use stockledger_infra::{InMemoryLedgerStore, InMemoryProductCatalog, ProductSelector, StockConfig, StockService};
use stockledger_inventory::Movement;
use stockledger_products::Product;

fn origin() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
}

/// `count` alternating entries/exits for `product`, one per minute, with a checkpoint
/// every `checkpoint_every` records (0 = none).
fn ledger_for(
    product: ProductId,
    first_id: i64,
    count: usize,
    checkpoint_every: usize,
) -> Vec<Movement> {
    (0..count)
        .map(|i| {
            let id = MovementId::new(first_id + i as i64);
            let when = origin() + Duration::minutes(i as i64);
            if checkpoint_every > 0 && i > 0 && i % checkpoint_every == 0 {
                Movement::checkpoint(id, product, when, Decimal::from(500)).unwrap()
            } else if i % 2 == 0 {
                Movement::entry(id, product, when, Decimal::from(3)).unwrap()
            } else {
                Movement::exit(id, product, when, Decimal::from(2)).unwrap()
            }
        })
        .collect()
}

fn bench_forward_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("forward_replay");
    let product = ProductId::new(1);

    for count in [100, 1_000, 10_000, 100_000].iter() {
        let ledger = InMemoryLedgerStore::with_movements(ledger_for(product, 1, *count, 0)).unwrap();
        let target = origin() + Duration::minutes(*count as i64);
        group.throughput(Throughput::Elements(*count as u64));

        group.bench_with_input(BenchmarkId::new("no_checkpoint", count), count, |b, _| {
            let engine = ForwardReplayEngine::new(&ledger);
            b.iter(|| black_box(engine.compute(product, black_box(target)).unwrap()));
        });
    }

    group.finish();
}

fn bench_checkpoint_shortcut(c: &mut Criterion) {
    let mut group = c.benchmark_group("checkpoint_shortcut");
    let product = ProductId::new(1);
    let count = 100_000;
    let target = origin() + Duration::minutes(count as i64);

    for every in [0, 10_000, 1_000].iter() {
        let ledger = InMemoryLedgerStore::with_movements(ledger_for(product, 1, count, *every)).unwrap();
        group.bench_with_input(BenchmarkId::new("checkpoint_every", every), every, |b, _| {
            let engine = ForwardReplayEngine::new(&ledger);
            b.iter(|| black_box(engine.compute(product, target).unwrap()));
        });
    }

    group.finish();
}

fn bench_backward_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("backward_replay");
    let product = ProductId::new(1);
    let count = 10_000;
    let ledger = InMemoryLedgerStore::with_movements(ledger_for(product, 1, count, 0)).unwrap();
    let now = origin() + Duration::minutes(count as i64);

    for depth in [10, 1_000, 9_999].iter() {
        let target = now - Duration::minutes(*depth as i64);
        group.bench_with_input(BenchmarkId::new("depth", depth), depth, |b, _| {
            let engine = BackwardReplayEngine::new(&ledger);
            b.iter(|| black_box(engine.reconstruct(product, Decimal::from(5_000), now, target).unwrap()));
        });
    }

    group.finish();
}

fn bench_validation_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("validation_batch");
    let per_product = 500;

    for products in [10, 100].iter() {
        let mut movements = Vec::with_capacity(products * per_product);
        let mut catalog = Vec::with_capacity(*products);
        for p in 0..*products {
            let id = ProductId::new(p as i64 + 1);
            movements.extend(ledger_for(id, (p * per_product) as i64 + 1, per_product, 0));
            catalog.push(
                Product::new(id, format!("P{p}"), format!("Product {p}"), true, Decimal::from(250), Decimal::ONE)
                    .unwrap(),
            );
        }
        let ledger = Arc::new(InMemoryLedgerStore::with_movements(movements).unwrap());
        let catalog = Arc::new(InMemoryProductCatalog::with_products(catalog));
        let now = origin() + Duration::days(30);
        group.throughput(Throughput::Elements(*products as u64));

        for workers in [1, 4].iter() {
            let svc = StockService::with_clock(
                ledger.clone(),
                catalog.clone(),
                FixedClock::at(now),
                StockConfig::default().with_validation_workers(*workers),
            );
            group.bench_with_input(
                BenchmarkId::new(format!("workers_{workers}"), products),
                products,
                |b, _| {
                    b.iter(|| black_box(svc.validate_stock(&ProductSelector::all_active(), None).unwrap()));
                },
            );
        }
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_forward_replay,
    bench_checkpoint_shortcut,
    bench_backward_replay,
    bench_validation_batch
);
criterion_main!(benches);
