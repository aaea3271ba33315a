//! Benchmarks for call pricing
//!
//! Run with: cargo bench --package consulta-services
//!
//! These benchmarks measure the pure pricing and split arithmetic done at
//! call end and the construction of settlement rows (not database writes).

use consulta_core::models::{NewSettlement, SettlementSummary};
use consulta_core::Tariff;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use uuid::Uuid;

/// Benchmark cost of a single call
fn bench_call_cost(c: &mut Criterion) {
    let tariff = Tariff::standard();

    c.bench_function("call_cost_600s", |b| {
        b.iter(|| tariff.call_cost(Tariff::duration_minutes(black_box(600))));
    });
}

/// Benchmark both split policies
fn bench_split(c: &mut Criterion) {
    let tariff = Tariff::standard();
    let cost = tariff.call_cost(Tariff::duration_minutes(437));

    let mut group = c.benchmark_group("split");
    for has_referrer in [false, true] {
        group.bench_with_input(
            BenchmarkId::from_parameter(has_referrer),
            &has_referrer,
            |b, &has_referrer| {
                b.iter(|| tariff.split(black_box(cost), has_referrer));
            },
        );
    }
    group.finish();
}

/// Benchmark pricing a batch of calls into settlement rows
fn bench_settlement_rows(c: &mut Criterion) {
    let tariff = Tariff::standard();
    let (counselor, referrer, company) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let mut group = c.benchmark_group("settlement_rows");

    for size in [100, 1_000, 10_000].iter() {
        let durations: Vec<i64> = (0..*size).map(|i| (i * 37) % 3_600).collect();

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                for (i, seconds) in durations.iter().enumerate() {
                    let cost = tariff.call_cost(Tariff::duration_minutes(*seconds));
                    let with_referrer = i % 3 == 0;
                    let split = tariff.split(cost, with_referrer);
                    let rows = NewSettlement::from_split(
                        Uuid::nil(),
                        counselor,
                        with_referrer.then_some(referrer),
                        company,
                        &split,
                    );
                    black_box(rows);
                }
            });
        });
    }

    group.finish();
}

/// Benchmark folding settlement rows back into a summary
fn bench_summary(c: &mut Criterion) {
    use chrono::Utc;
    use consulta_core::models::Settlement;

    let tariff = Tariff::standard();
    let split = tariff.split(tariff.call_cost(Tariff::duration_minutes(600)), true);
    let call_id = Uuid::new_v4();
    let rows: Vec<Settlement> = NewSettlement::from_split(
        call_id,
        Uuid::new_v4(),
        Some(Uuid::new_v4()),
        Uuid::new_v4(),
        &split,
    )
    .into_iter()
    .enumerate()
    .map(|(i, row)| Settlement {
        id: i as i64,
        call_id: row.call_id,
        payee_id: row.payee_id,
        amount: row.amount,
        settlement_type: row.settlement_type,
        percentage: row.percentage,
        created_at: Utc::now(),
    })
    .collect();

    c.bench_function("settlement_summary_from_rows", |b| {
        b.iter(|| SettlementSummary::from_rows(call_id, black_box(&rows)));
    });
}

criterion_group!(
    benches,
    bench_call_cost,
    bench_split,
    bench_settlement_rows,
    bench_summary
);
criterion_main!(benches);
