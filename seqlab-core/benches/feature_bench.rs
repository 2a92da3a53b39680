//! Criterion benchmarks for SeqLab hot paths.
//!
//! Benchmarks:
//! 1. Indicator engine (all features for one symbol)
//! 2. Min-max fit and transform
//! 3. Sequence windowing and purged partition
//! 4. Rate limiter reservation under a full ledger

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::time::Duration;

use seqlab_core::domain::Bar;
use seqlab_core::features::{FeatureMatrix, FeatureSet};
use seqlab_core::indicators::{IndicatorEngine, IndicatorParams};
use seqlab_core::normalize::fit_transform;
use seqlab_core::rate_limit::{ManualClock, RateLimitPolicy, RateLimiter, Window};
use seqlab_core::window::{make_sequences, partition};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bars(n: usize) -> Vec<Bar> {
    let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.1).sin() * 10.0;
            let open = close - 0.3;
            Bar {
                timestamp: base + chrono::Duration::minutes(30 * i as i64),
                open,
                high: close + 1.5,
                low: close - 1.5,
                close,
                volume: 1_000_000.0 + (i % 5000) as f64,
            }
        })
        .collect()
}

fn make_matrix(n: usize) -> FeatureMatrix {
    let engine = IndicatorEngine::new(IndicatorParams::default());
    let rows = engine.compute(&make_bars(n), &[]);
    FeatureMatrix::from_rows(&rows, &FeatureSet::standard(false))
}

// ── 1. Indicators ────────────────────────────────────────────────────

fn bench_indicators(c: &mut Criterion) {
    let mut group = c.benchmark_group("indicator_engine");
    let engine = IndicatorEngine::new(IndicatorParams::default());

    for &bar_count in &[273, 1365, 6552] {
        let bars = make_bars(bar_count);
        group.bench_with_input(BenchmarkId::new("compute", bar_count), &bar_count, |b, _| {
            b.iter(|| engine.compute(black_box(&bars), black_box(&[])));
        });
    }

    group.finish();
}

// ── 2. Normalization ─────────────────────────────────────────────────

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");
    let set = FeatureSet::standard(false);

    for &bar_count in &[273, 1365, 6552] {
        let matrix = make_matrix(bar_count);
        let rows = matrix.rows();
        group.bench_with_input(
            BenchmarkId::new("fit_transform", bar_count),
            &bar_count,
            |b, _| {
                b.iter(|| fit_transform(black_box(matrix.values.view()), set.columns(), 0..rows));
            },
        );
    }

    group.finish();
}

// ── 3. Windowing ─────────────────────────────────────────────────────

fn bench_windowing(c: &mut Criterion) {
    let mut group = c.benchmark_group("windowing");
    let set = FeatureSet::standard(false);

    for &length in &[20usize, 60] {
        let matrix = make_matrix(1365);
        let target = matrix.values.column(set.target_index()).to_owned();
        group.bench_with_input(
            BenchmarkId::new("sequences_and_partition", length),
            &length,
            |b, &length| {
                b.iter(|| {
                    let seqs = make_sequences(black_box(matrix.values.view()), target.view(), length);
                    partition(&seqs, 0.8, length)
                });
            },
        );
    }

    group.finish();
}

// ── 4. Rate limiter ──────────────────────────────────────────────────

fn bench_rate_limiter(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_limiter");

    group.bench_function("reserve_full_ledger", |b| {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::with_clock(
            RateLimitPolicy {
                global: Window::new(1000, Duration::from_secs(600)),
                per_target: Some(Window::new(6, Duration::from_secs(2))),
            },
            clock.clone(),
        );
        for i in 0..1000 {
            let _ = limiter.try_reserve(&format!("S{i}"));
        }
        b.iter(|| limiter.reserve(black_box("SPY")));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_indicators,
    bench_normalize,
    bench_windowing,
    bench_rate_limiter,
);
criterion_main!(benches);
