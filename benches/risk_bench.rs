//! Performance benchmarks for the risk engine.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use folio::correlation::CorrelationMatrix;
use folio::market_data::{InMemoryProvider, MarketDataProvider};
use folio::{Asset, Portfolio};

/// Portfolio of `n` synthetic assets.
fn generate_portfolio(n: usize) -> Portfolio {
    let mut portfolio = Portfolio::new();
    for i in 0..n {
        let x = i as f64;
        let asset = Asset::new(
            format!("A{:04}", i),
            50.0 + (x * 0.7).sin().abs() * 100.0,
            0.02 + (x * 1.3).cos().abs() * 0.1,
            0.05 + (x * 0.3).sin().abs() * 0.3,
        )
        .unwrap();
        portfolio.add_position(asset, 1.0 + x % 7.0).unwrap();
    }
    portfolio
}

/// Equicorrelated matrix, valid for any `rho` in [0, 1].
fn generate_matrix(n: usize, rho: f64) -> CorrelationMatrix {
    CorrelationMatrix::new(
        (0..n)
            .map(|i| (0..n).map(|j| if i == j { 1.0 } else { rho }).collect())
            .collect(),
    )
}

fn generate_closes(count: usize, phase: f64) -> Vec<f64> {
    let mut price = 100.0;
    (0..count)
        .map(|i| {
            let noise = ((i as f64 * 0.7 + phase).sin() + (i as f64 * 1.3).cos()) * 0.005;
            price *= 1.0 + 0.0003 + noise;
            price
        })
        .collect()
}

/// Benchmark variance and contributions over portfolio sizes.
fn bench_risk(c: &mut Criterion) {
    let mut group = c.benchmark_group("risk");

    for size in [10, 50, 100, 250].iter() {
        let portfolio = generate_portfolio(*size);
        let corr = generate_matrix(*size, 0.3);

        group.bench_with_input(BenchmarkId::new("variance", size), &corr, |b, corr| {
            b.iter(|| portfolio.variance(black_box(corr)))
        });

        group.bench_with_input(
            BenchmarkId::new("contributions", size),
            &corr,
            |b, corr| b.iter(|| portfolio.variance_contributions(black_box(corr))),
        );

        group.bench_with_input(BenchmarkId::new("report", size), &corr, |b, corr| {
            b.iter(|| portfolio.risk_report(black_box(corr)))
        });
    }

    group.finish();
}

/// Benchmark position bookkeeping.
fn bench_positions(c: &mut Criterion) {
    let mut group = c.benchmark_group("positions");

    let left = generate_portfolio(500);
    let right = generate_portfolio(500);
    group.bench_function("merge_500", |b| b.iter(|| black_box(&left).merge(&right)));

    group.bench_function("build_500", |b| b.iter(|| generate_portfolio(black_box(500))));

    group.finish();
}

/// Benchmark return-based correlation estimation.
fn bench_correlation(c: &mut Criterion) {
    let mut group = c.benchmark_group("correlation");

    for tickers in [5, 20].iter() {
        let mut provider = InMemoryProvider::new();
        let names: Vec<String> = (0..*tickers).map(|i| format!("T{}", i)).collect();
        for (i, name) in names.iter().enumerate() {
            provider.insert(name.clone(), generate_closes(1000, i as f64));
        }

        group.bench_with_input(
            BenchmarkId::new("from_market_data", tickers),
            &names,
            |b, names| b.iter(|| provider.correlation_matrix(black_box(names))),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_risk, bench_positions, bench_correlation);
criterion_main!(benches);
