//! Ingestion orchestrator: gated fetch → merge → indicators → normalize →
//! window → partition, per symbol, then concatenation across symbols.

use super::dataset::Dataset;
use super::error::PipelineError;
use super::report::{RunReport, SkipReason, SymbolOutcome, SymbolState};
use crate::cancel::CancelToken;
use crate::data::{
    merge_economic, BarRequest, DataError, EconomicDataSource, EnrichedStage, FillPolicy,
    MarketDataSource,
};
use crate::domain::{Bar, BarSize, EconomicPoint, HistorySpan, SymbolSeries};
use crate::features::{FeatureMatrix, FeatureSet};
use crate::indicators::{IndicatorEngine, IndicatorParams};
use crate::normalize::{fit_transform, MinMaxScaler, ScalerFit, ScalerRegistry};
use crate::rate_limit::RateLimiter;
use crate::window::{make_sequences, min_rows, partition, train_rows, SplitSet};
use chrono::NaiveDateTime;
use rayon::prelude::*;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Everything a run needs besides its collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub end: NaiveDateTime,
    pub span: HistorySpan,
    pub bar_size: BarSize,
    /// Fetch attempts per symbol; transient errors are retried up to this.
    pub max_attempts: u32,
    /// Worker threads. Values above the per-target limit are capped.
    pub workers: usize,
    pub sequence_length: usize,
    pub split_ratio: f64,
    /// Drop `sequence_length` sequences between train and test.
    pub purge_overlap: bool,
    pub fill: FillPolicy,
    pub scaler_fit: ScalerFit,
    pub indicators: IndicatorParams,
}

impl PipelineOptions {
    pub fn new(end: NaiveDateTime) -> Self {
        Self {
            end,
            span: HistorySpan::months(1),
            bar_size: BarSize::Min30,
            max_attempts: 3,
            workers: 1,
            sequence_length: 60,
            split_ratio: 0.8,
            purge_overlap: true,
            fill: FillPolicy::CarryForward,
            scaler_fit: ScalerFit::FullHistory,
            indicators: IndicatorParams::default(),
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: &str| Err(PipelineError::InvalidOptions(msg.to_string()));
        if self.sequence_length == 0 {
            return invalid("sequence_length must be >= 1");
        }
        if !(self.split_ratio > 0.0 && self.split_ratio < 1.0) {
            return invalid("split_ratio must be in (0, 1)");
        }
        if self.max_attempts == 0 {
            return invalid("max_attempts must be >= 1");
        }
        if self.workers == 0 {
            return invalid("workers must be >= 1");
        }
        if self.span.start_from(self.end).is_none() {
            return Err(PipelineError::InvalidOptions(format!(
                "span {} reaches before the earliest representable date",
                self.span
            )));
        }
        self.indicators
            .validate()
            .map_err(PipelineError::InvalidOptions)
    }

    /// Sequences dropped between train and test.
    pub fn purge_gap(&self) -> usize {
        if self.purge_overlap {
            self.sequence_length
        } else {
            0
        }
    }

    /// Usable rows needed for at least one train and one test sequence.
    pub fn required_rows(&self) -> usize {
        min_rows(self.sequence_length, self.split_ratio, self.purge_gap())
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub dataset: Dataset,
    pub scalers: ScalerRegistry,
    pub report: RunReport,
}

struct Processed {
    split: SplitSet,
    scaler: MinMaxScaler,
}

struct SymbolRun {
    outcome: SymbolOutcome,
    result: Option<Processed>,
}

fn enter(outcome: &mut SymbolOutcome, state: SymbolState) {
    outcome.state = state;
    debug!(symbol = %outcome.symbol, state = %state, "symbol state");
}

/// Owns the rate limiter and the data collaborators for a batch.
pub struct IngestionPipeline {
    limiter: RateLimiter,
    market: Box<dyn MarketDataSource>,
    economic: Option<Box<dyn EconomicDataSource>>,
    stage: Option<EnrichedStage>,
    engine: IndicatorEngine,
    options: PipelineOptions,
}

impl IngestionPipeline {
    pub fn new(
        market: Box<dyn MarketDataSource>,
        limiter: RateLimiter,
        options: PipelineOptions,
    ) -> Self {
        Self {
            limiter,
            market,
            economic: None,
            stage: None,
            engine: IndicatorEngine::new(options.indicators),
            options,
        }
    }

    /// Merge this series into every symbol and add it as a feature column.
    pub fn with_economic(mut self, source: Box<dyn EconomicDataSource>) -> Self {
        self.economic = Some(source);
        self
    }

    /// Write each symbol's enriched rows to Parquet as they are computed.
    pub fn with_stage(mut self, stage: EnrichedStage) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn feature_set(&self) -> FeatureSet {
        FeatureSet::standard(self.economic.is_some())
    }

    /// Effective worker count: at most one in-flight request per slot of the
    /// per-target window.
    pub fn worker_count(&self) -> usize {
        let cap = self
            .limiter
            .policy()
            .per_target
            .map_or(self.options.workers, |w| w.limit.max(1));
        self.options.workers.min(cap)
    }

    /// Run the batch.
    ///
    /// Per-symbol failures never abort the batch; they end that symbol in
    /// `Empty` and are recorded in the report. Fails with `EmptyBatch` when
    /// no symbol reaches `Partitioned`, or `Cancelled` when cancellation
    /// arrived before any did.
    pub fn run(&self, symbols: &[String], cancel: &CancelToken) -> Result<RunOutput, PipelineError> {
        self.options.validate()?;

        let mut seen = HashSet::new();
        let symbols: Vec<&str> = symbols
            .iter()
            .map(String::as_str)
            .filter(|s| {
                let fresh = seen.insert(*s);
                if !fresh {
                    warn!(symbol = %s, "duplicate symbol ignored");
                }
                fresh
            })
            .collect();

        let economic = self.load_economic()?;
        let set = self.feature_set();
        if self.options.scaler_fit == ScalerFit::FullHistory {
            warn!("scalers are fit on full history; test-period min/max leak into training inputs");
        }

        let workers = self.worker_count();
        info!(
            symbols = symbols.len(),
            workers,
            source = self.market.name(),
            "starting ingestion"
        );

        let runs: Vec<SymbolRun> = if workers > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()
                .map_err(|e| PipelineError::ThreadPool(e.to_string()))?;
            pool.install(|| {
                symbols
                    .par_iter()
                    .map(|s| self.run_symbol(s, economic.as_deref(), &set, cancel))
                    .collect()
            })
        } else {
            symbols
                .iter()
                .map(|s| self.run_symbol(s, economic.as_deref(), &set, cancel))
                .collect()
        };

        let mut report = RunReport::default();
        let mut scalers = ScalerRegistry::new();
        let mut parts = Vec::new();
        for run in runs {
            if let Some(done) = run.result {
                scalers.insert(run.outcome.symbol.clone(), done.scaler);
                parts.push((run.outcome.symbol.clone(), done.split));
            }
            report.outcomes.push(run.outcome);
        }

        info!(
            processed = report.processed_count(),
            skipped = report.skipped_count(),
            "ingestion finished"
        );

        if parts.is_empty() {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            return Err(PipelineError::EmptyBatch {
                attempted: symbols.len(),
            });
        }

        let names = set.names().into_iter().map(String::from).collect();
        let dataset = Dataset::concat(&parts, self.options.sequence_length, names);
        info!(
            train = dataset.train_len(),
            test = dataset.test_len(),
            "dataset assembled"
        );

        Ok(RunOutput {
            dataset,
            scalers,
            report,
        })
    }

    /// One economic range covering every symbol's request window.
    fn load_economic(&self) -> Result<Option<Vec<EconomicPoint>>, PipelineError> {
        let Some(source) = &self.economic else {
            return Ok(None);
        };
        let span = self.options.span;
        let start = span
            .start_from(self.options.end)
            .ok_or_else(|| PipelineError::InvalidOptions(format!("span {span} out of range")))?
            .date();
        // Carry-forward needs the last point before the window too.
        let lookback = match self.options.fill {
            FillPolicy::CarryForward => start
                .checked_sub_signed(chrono::Duration::days(14))
                .unwrap_or(start),
            FillPolicy::Drop => start,
        };
        let points = source
            .range(lookback, self.options.end.date())
            .map_err(PipelineError::EconomicSource)?;
        debug!(source = source.name(), points = points.len(), "economic series loaded");
        Ok(Some(points))
    }

    fn run_symbol(
        &self,
        symbol: &str,
        economic: Option<&[EconomicPoint]>,
        set: &FeatureSet,
        cancel: &CancelToken,
    ) -> SymbolRun {
        let mut outcome = SymbolOutcome::pending(symbol);
        debug!(symbol, state = %SymbolState::Pending, "symbol state");

        match self.process(symbol, economic, set, cancel, &mut outcome) {
            Ok(done) => {
                info!(
                    symbol,
                    train = outcome.train_sequences,
                    test = outcome.test_sequences,
                    "symbol processed"
                );
                SymbolRun {
                    outcome,
                    result: Some(done),
                }
            }
            Err(err) => {
                let reason = SkipReason::from(&err);
                warn!(symbol, reason = %reason, "symbol skipped");
                if let Some(hint) = reason.hint() {
                    warn!(symbol, "{hint}");
                }
                outcome.skipped(reason);
                SymbolRun {
                    outcome,
                    result: None,
                }
            }
        }
    }

    fn fetch(
        &self,
        symbol: &str,
        cancel: &CancelToken,
        outcome: &mut SymbolOutcome,
    ) -> Result<Vec<Bar>, PipelineError> {
        let cancelled = || PipelineError::SymbolCancelled {
            symbol: symbol.to_string(),
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            outcome.attempts = attempt;
            if cancel.is_cancelled() {
                return Err(cancelled());
            }

            enter(outcome, SymbolState::RateGated);
            let waited = self.limiter.acquire(symbol, cancel).ok_or_else(cancelled)?;
            outcome.add_wait(waited);

            let request = BarRequest {
                symbol: symbol.to_string(),
                end: self.options.end,
                span: self.options.span,
                bar_size: self.options.bar_size,
                timeout: cancel.remaining(),
            };
            match self.market.fetch(&request) {
                Ok(bars) => return Ok(bars),
                Err(e) if e.is_transient() && attempt < self.options.max_attempts => {
                    warn!(symbol, attempt, error = %e, "transient fetch error, retrying");
                }
                Err(DataError::Timeout(_)) if cancel.is_cancelled() => return Err(cancelled()),
                Err(source) => {
                    return Err(PipelineError::FetchFailed {
                        symbol: symbol.to_string(),
                        attempts: attempt,
                        source,
                    })
                }
            }
        }
    }

    fn process(
        &self,
        symbol: &str,
        economic: Option<&[EconomicPoint]>,
        set: &FeatureSet,
        cancel: &CancelToken,
        outcome: &mut SymbolOutcome,
    ) -> Result<Processed, PipelineError> {
        let opts = &self.options;

        let bars = self.fetch(symbol, cancel, outcome)?;
        if cancel.is_cancelled() {
            return Err(PipelineError::SymbolCancelled {
                symbol: symbol.to_string(),
            });
        }
        let series = SymbolSeries::canonicalize(symbol, bars);
        outcome.bars = series.len();
        enter(outcome, SymbolState::Fetched);
        if series.is_empty() {
            return Err(PipelineError::NoData {
                symbol: symbol.to_string(),
            });
        }

        let merged = economic
            .map(|points| merge_economic(series.bars(), points, opts.fill))
            .unwrap_or_default();
        let rows = self.engine.compute(series.bars(), &merged);
        enter(outcome, SymbolState::Enriched);
        if let Some(stage) = &self.stage {
            if let Err(e) = stage.write(symbol, &rows) {
                warn!(symbol, error = %e, "staging failed");
            }
        }

        let matrix = FeatureMatrix::from_rows(&rows, set);
        outcome.usable_rows = matrix.rows();
        let insufficient = || PipelineError::InsufficientHistory {
            symbol: symbol.to_string(),
            usable: matrix.rows(),
            required: opts.required_rows(),
        };
        if matrix.rows() < opts.required_rows() {
            return Err(insufficient());
        }

        let gap = opts.purge_gap();
        let fit_rows = match opts.scaler_fit {
            ScalerFit::FullHistory => 0..matrix.rows(),
            ScalerFit::TrainPrefix => {
                train_rows(matrix.rows(), opts.sequence_length, opts.split_ratio, gap)
            }
        };
        let (scaled, scaler) = fit_transform(matrix.values.view(), set.columns(), fit_rows)
            .map_err(|e| PipelineError::normalize(symbol, e))?;
        enter(outcome, SymbolState::Normalized);

        let seqs = make_sequences(
            scaled.view(),
            scaled.column(set.target_index()),
            opts.sequence_length,
        );
        enter(outcome, SymbolState::Windowed);

        let split = partition(&seqs, opts.split_ratio, gap);
        let counts = split.counts(seqs.len());
        if counts.train == 0 || counts.test == 0 {
            return Err(insufficient());
        }
        outcome.partitioned(counts);
        debug!(symbol, state = %SymbolState::Partitioned, "symbol state");

        Ok(Processed { split, scaler })
    }
}
