//! End-to-end pipeline scenarios with in-memory sources.
//!
//! Every scenario runs on a `ManualClock`, so rate-limit waits advance
//! simulated time instead of sleeping.

use chrono::{NaiveDate, NaiveDateTime};
use ndarray::Axis;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use seqlab_core::data::synthetic::generate_bars;
use seqlab_core::data::{
    BarRequest, DataError, EnrichedStage, FillPolicy, MarketDataSource, StaticEconomicSource,
    SyntheticSource,
};
use seqlab_core::domain::{Bar, BarSize, EconomicPoint, HistorySpan};
use seqlab_core::features::Feature;
use seqlab_core::normalize::ScalerFit;
use seqlab_core::pipeline::{
    CancelToken, IngestionPipeline, PipelineError, PipelineOptions, SkipReason, SymbolState,
};
use seqlab_core::rate_limit::{Clock, ManualClock, RateLimitPolicy, RateLimiter, Window};

// ── Helpers ──────────────────────────────────────────────────────────

const L: usize = 20;

fn end() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(20, 0, 0)
        .unwrap()
}

fn options() -> PipelineOptions {
    PipelineOptions {
        sequence_length: L,
        ..PipelineOptions::new(end())
    }
}

fn limiter() -> RateLimiter {
    RateLimiter::with_clock(RateLimitPolicy::default(), Arc::new(ManualClock::new()))
}

fn symbols(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn pipeline(source: impl MarketDataSource + 'static, opts: PipelineOptions) -> IngestionPipeline {
    IngestionPipeline::new(Box::new(source), limiter(), opts)
}

/// Returns fixed bars per symbol; unknown symbols get an empty series.
struct FixedSource {
    bars: HashMap<String, Vec<Bar>>,
}

impl MarketDataSource for FixedSource {
    fn name(&self) -> &str {
        "fixed"
    }

    fn fetch(&self, request: &BarRequest) -> Result<Vec<Bar>, DataError> {
        Ok(self.bars.get(&request.symbol).cloned().unwrap_or_default())
    }
}

/// Fails the first `failures` calls with a transient error, then delegates.
struct FlakySource {
    failures: u32,
    calls: AtomicU32,
    inner: SyntheticSource,
}

impl FlakySource {
    fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
            inner: SyntheticSource::new(),
        }
    }
}

impl MarketDataSource for FlakySource {
    fn name(&self) -> &str {
        "flaky"
    }

    fn fetch(&self, request: &BarRequest) -> Result<Vec<Bar>, DataError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(DataError::NetworkUnreachable("connection reset".into()));
        }
        self.inner.fetch(request)
    }
}

fn synthetic_bars(symbol: &str) -> Vec<Bar> {
    generate_bars(
        symbol,
        HistorySpan::months(1).start_from(end()).unwrap(),
        end(),
        BarSize::Min30.duration(),
        true,
    )
}

// ── Scenarios ────────────────────────────────────────────────────────

#[test]
fn empty_symbol_is_skipped_and_excluded() {
    let source = SyntheticSource::new().with_empty(["DEAD"]);
    let p = pipeline(source, options());
    let out = p
        .run(&symbols(&["SPY", "DEAD", "QQQ"]), &CancelToken::new())
        .unwrap();

    assert_eq!(out.report.processed_count(), 2);
    assert_eq!(out.report.skipped_count(), 1);
    for o in out.report.processed() {
        assert!(o.usable_rows >= L + 50, "{} has {} rows", o.symbol, o.usable_rows);
    }

    let dead = out.report.outcome("DEAD").unwrap();
    assert_eq!(dead.state, SymbolState::Empty);
    assert_eq!(dead.skip, Some(SkipReason::NoData));

    assert_eq!(out.dataset.symbols(), vec!["SPY", "QQQ"]);
    assert!(out.dataset.segment("DEAD").is_none());
    assert!(out.scalers.get("DEAD").is_none());
    assert_eq!(out.scalers.len(), 2);

    let ds = &out.dataset;
    assert_eq!(&ds.x_train.shape()[1..], &[L, 15]);
    assert_eq!(ds.x_train.len_of(Axis(0)), ds.y_train.len());
    assert_eq!(ds.x_test.len_of(Axis(0)), ds.y_test.len());
    assert!(ds.test_len() > 0);
}

#[test]
fn permanent_fetch_failure_skips_without_retry() {
    let source = SyntheticSource::new().with_unknown(["NOPE"]);
    let out = pipeline(source, options())
        .run(&symbols(&["NOPE", "SPY"]), &CancelToken::new())
        .unwrap();

    let nope = out.report.outcome("NOPE").unwrap();
    assert_eq!(nope.attempts, 1);
    assert!(matches!(nope.skip, Some(SkipReason::FetchFailed { attempts: 1, .. })));
    assert_eq!(out.dataset.symbols(), vec!["SPY"]);
}

#[test]
fn transient_errors_are_retried() {
    let out = pipeline(FlakySource::new(2), options())
        .run(&symbols(&["SPY"]), &CancelToken::new())
        .unwrap();
    let spy = out.report.outcome("SPY").unwrap();
    assert_eq!(spy.attempts, 3);
    assert_eq!(spy.state, SymbolState::Partitioned);
}

#[test]
fn retries_stop_at_max_attempts() {
    let opts = PipelineOptions {
        max_attempts: 2,
        ..options()
    };
    let err = pipeline(FlakySource::new(5), opts)
        .run(&symbols(&["SPY"]), &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, PipelineError::EmptyBatch { attempted: 1 }));
}

#[test]
fn short_history_is_insufficient() {
    let opts = PipelineOptions {
        span: HistorySpan::days(3),
        ..options()
    };
    let err = pipeline(SyntheticSource::new(), opts.clone())
        .run(&symbols(&["SPY"]), &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, PipelineError::EmptyBatch { .. }));

    // Same short symbol next to a long one: skipped with the row counts.
    let mut bars = HashMap::new();
    bars.insert("LONG".to_string(), synthetic_bars("LONG"));
    bars.insert("SHORT".to_string(), synthetic_bars("SHORT")[..40].to_vec());
    let out = pipeline(FixedSource { bars }, options())
        .run(&symbols(&["LONG", "SHORT"]), &CancelToken::new())
        .unwrap();
    let short = out.report.outcome("SHORT").unwrap();
    assert_eq!(
        short.skip,
        Some(SkipReason::InsufficientHistory {
            usable: 40 - 26,
            required: options().required_rows()
        })
    );
}

#[test]
fn shipped_defaults_fill_both_partitions() {
    let opts = PipelineOptions::new(end());
    let length = opts.sequence_length;
    let out = pipeline(SyntheticSource::new(), opts)
        .run(&symbols(&["SPY", "QQQ"]), &CancelToken::new())
        .unwrap();

    for o in &out.report.outcomes {
        assert_eq!(o.state, SymbolState::Partitioned, "{}", o.symbol);
        assert!(o.train_sequences > 0, "{} has no train", o.symbol);
        assert!(o.test_sequences > 0, "{} has no test", o.symbol);
        assert_eq!(o.purged_sequences, length);
    }
    let ds = &out.dataset;
    assert_eq!(&ds.x_test.shape()[1..], &[length, 15]);
    assert!(ds.test_len() > 0);
    assert!(ds.train_len() > ds.test_len());
}

#[test]
fn one_sequence_short_of_a_test_tail_is_insufficient() {
    // 7 days of 30m bars leaves a few dozen usable rows, enough for train
    // sequences but not for a test tail behind the purge.
    let err = pipeline(
        SyntheticSource::new(),
        PipelineOptions {
            span: HistorySpan::days(7),
            ..options()
        },
    )
    .run(&symbols(&["SPY"]), &CancelToken::new())
    .unwrap_err();
    assert!(matches!(err, PipelineError::EmptyBatch { attempted: 1 }));

    // At the boundary: one row short is skipped, the exact minimum yields
    // one train and one test sequence.
    let required = options().required_rows();
    let warmup = 26;
    let mut bars = HashMap::new();
    bars.insert("LONG".to_string(), synthetic_bars("LONG"));
    bars.insert("SHORT".to_string(), synthetic_bars("SHORT")[..required + warmup - 1].to_vec());
    bars.insert("EXACT".to_string(), synthetic_bars("EXACT")[..required + warmup].to_vec());
    let out = pipeline(FixedSource { bars }, options())
        .run(&symbols(&["LONG", "SHORT", "EXACT"]), &CancelToken::new())
        .unwrap();

    assert_eq!(out.report.processed_count(), 2);
    let short = out.report.outcome("SHORT").unwrap();
    assert_eq!(short.state, SymbolState::Empty);
    assert_eq!(short.train_sequences + short.test_sequences, 0);
    assert_eq!(
        short.skip,
        Some(SkipReason::InsufficientHistory {
            usable: required - 1,
            required
        })
    );
    assert!(out.scalers.get("SHORT").is_none());

    let exact = out.report.outcome("EXACT").unwrap();
    assert_eq!((exact.train_sequences, exact.test_sequences), (1, 1));
    assert_eq!(out.dataset.symbols(), vec!["LONG", "EXACT"]);
}

#[test]
fn degenerate_column_excludes_symbol() {
    let mut flat_volume = synthetic_bars("FLAT");
    for bar in &mut flat_volume {
        bar.volume = 1000.0;
    }
    let mut bars = HashMap::new();
    bars.insert("FLAT".to_string(), flat_volume);
    bars.insert("SPY".to_string(), synthetic_bars("SPY"));

    let out = pipeline(FixedSource { bars }, options())
        .run(&symbols(&["FLAT", "SPY"]), &CancelToken::new())
        .unwrap();
    assert_eq!(
        out.report.outcome("FLAT").unwrap().skip,
        Some(SkipReason::DegenerateColumn {
            column: "volume".into()
        })
    );
    assert_eq!(out.dataset.symbols(), vec!["SPY"]);
}

#[test]
fn all_empty_is_empty_batch() {
    let source = SyntheticSource::new().with_empty(["A", "B"]);
    let err = pipeline(source, options())
        .run(&symbols(&["A", "B"]), &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, PipelineError::EmptyBatch { attempted: 2 }));
}

#[test]
fn cancelled_before_start() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = pipeline(SyntheticSource::new(), options())
        .run(&symbols(&["SPY", "QQQ"]), &cancel)
        .unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled));
}

#[test]
fn global_window_gates_fetches() {
    let clock = Arc::new(ManualClock::new());
    let policy = RateLimitPolicy {
        global: Window::new(2, Duration::from_secs(600)),
        per_target: None,
    };
    let limiter = RateLimiter::with_clock(policy, clock.clone());
    let p = IngestionPipeline::new(Box::new(SyntheticSource::new()), limiter, options());

    let out = p
        .run(&symbols(&["A", "B", "C"]), &CancelToken::new())
        .unwrap();
    let waits: Vec<u64> = out.report.outcomes.iter().map(|o| o.rate_wait_ms).collect();
    assert_eq!(waits, vec![0, 0, 600_000]);
    assert_eq!(clock.now(), Duration::from_secs(600));
}

#[test]
fn parallel_run_matches_sequential() {
    let names = symbols(&["SPY", "QQQ", "IWM", "DIA"]);
    let seq = pipeline(SyntheticSource::new(), options())
        .run(&names, &CancelToken::new())
        .unwrap();
    let par = pipeline(
        SyntheticSource::new(),
        PipelineOptions {
            workers: 4,
            ..options()
        },
    )
    .run(&names, &CancelToken::new())
    .unwrap();

    assert_eq!(seq.dataset.fingerprint(), par.dataset.fingerprint());
    assert_eq!(seq.report, par.report);
}

#[test]
fn economic_series_adds_a_column() {
    let start = HistorySpan::months(1).start_from(end()).unwrap().date();
    let points: Vec<EconomicPoint> = (0..60)
        .map(|i| EconomicPoint {
            date: start - chrono::Duration::days(10) + chrono::Duration::days(i),
            value: 5.0 + (i as f64) * 0.01,
        })
        .collect();

    let p = pipeline(SyntheticSource::new(), options())
        .with_economic(Box::new(StaticEconomicSource::new(points)));
    let out = p.run(&symbols(&["SPY"]), &CancelToken::new()).unwrap();

    assert_eq!(out.dataset.feature_count(), 16);
    assert!(out.dataset.feature_names.contains(&"economic_rate".to_string()));
    let scaler = out.scalers.get("SPY").unwrap();
    assert!(scaler.range(Feature::EconomicRate).is_some());
}

#[test]
fn constant_economic_series_skips_every_symbol() {
    let start = HistorySpan::months(1).start_from(end()).unwrap().date();
    let flat: Vec<EconomicPoint> = (0..60)
        .map(|i| EconomicPoint {
            date: start - chrono::Duration::days(10) + chrono::Duration::days(i),
            value: 5.33,
        })
        .collect();

    let err = pipeline(SyntheticSource::new(), options())
        .with_economic(Box::new(StaticEconomicSource::new(flat)))
        .run(&symbols(&["SPY", "QQQ"]), &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, PipelineError::EmptyBatch { attempted: 2 }));

    let reason = SkipReason::from(&PipelineError::DegenerateColumn {
        symbol: "SPY".into(),
        column: Feature::EconomicRate,
    });
    assert_eq!(
        reason,
        SkipReason::DegenerateColumn {
            column: "economic_rate".into()
        }
    );
    assert!(reason.hint().is_some());
}

#[test]
fn drop_fill_removes_uncovered_rows() {
    // Points on every other calendar day over the last three weeks.
    let points: Vec<EconomicPoint> = (0..10)
        .map(|i| EconomicPoint {
            date: end().date() - chrono::Duration::days(2 * i),
            value: 5.0 + i as f64 * 0.1,
        })
        .collect();
    let run = |fill| {
        let opts = PipelineOptions { fill, ..options() };
        pipeline(SyntheticSource::new(), opts)
            .with_economic(Box::new(StaticEconomicSource::new(points.clone())))
            .run(&symbols(&["SPY"]), &CancelToken::new())
            .unwrap()
    };

    let carried = run(FillPolicy::CarryForward);
    let dropped = run(FillPolicy::Drop);
    let usable = |o: &seqlab_core::RunOutput| o.report.outcome("SPY").unwrap().usable_rows;
    assert!(usable(&dropped) < usable(&carried));
}

#[test]
fn scalers_map_targets_back_to_prices() {
    let out = pipeline(SyntheticSource::new(), options())
        .run(&symbols(&["SPY", "QQQ"]), &CancelToken::new())
        .unwrap();
    let ds = &out.dataset;

    for seg in &ds.segments {
        let scaler = out.scalers.get(&seg.symbol).unwrap();
        let (lo, hi) = scaler.range(Feature::Close).unwrap();
        let y = ds.y_train.slice(ndarray::s![seg.train_start..seg.train_start + seg.train_len]);
        assert!(y.iter().all(|v| (0.0..=1.0).contains(v)));
        let prices = scaler.inverse_column(Feature::Close, y).unwrap();
        assert!(prices.iter().all(|p| *p >= lo - 1e-9 && *p <= hi + 1e-9));
    }
}

#[test]
fn train_prefix_fit_keeps_train_in_unit_range() {
    let opts = PipelineOptions {
        scaler_fit: ScalerFit::TrainPrefix,
        ..options()
    };
    let out = pipeline(SyntheticSource::new(), opts)
        .run(&symbols(&["SPY"]), &CancelToken::new())
        .unwrap();
    let eps = 1e-12;
    assert!(out
        .dataset
        .x_train
        .iter()
        .all(|v| *v >= -eps && *v <= 1.0 + eps));
}

#[test]
fn purge_accounts_for_every_sequence() {
    let out = pipeline(SyntheticSource::new(), options())
        .run(&symbols(&["SPY"]), &CancelToken::new())
        .unwrap();
    let o = out.report.outcome("SPY").unwrap();
    assert_eq!(o.purged_sequences, L);
    assert_eq!(
        o.train_sequences + o.purged_sequences + o.test_sequences,
        o.usable_rows - L
    );

    let unpurged = pipeline(
        SyntheticSource::new(),
        PipelineOptions {
            purge_overlap: false,
            ..options()
        },
    )
    .run(&symbols(&["SPY"]), &CancelToken::new())
    .unwrap();
    assert_eq!(unpurged.report.outcome("SPY").unwrap().purged_sequences, 0);
}

#[test]
fn staging_writes_enriched_rows() {
    let dir = tempfile::tempdir().unwrap();
    let stage = EnrichedStage::new(dir.path());
    let out = pipeline(SyntheticSource::new(), options())
        .with_stage(stage.clone())
        .run(&symbols(&["SPY"]), &CancelToken::new())
        .unwrap();

    let rows = stage.load("SPY").unwrap();
    assert_eq!(rows.len(), out.report.outcome("SPY").unwrap().bars);
    assert!(rows[0].adx.is_none());
    assert!(rows.last().unwrap().adx.is_some());
}
