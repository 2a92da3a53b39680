//! Per-symbol state machine and the run's audit log.

use super::error::PipelineError;
use crate::features::Feature;
use crate::window::SplitCounts;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Where a symbol is in the pipeline.
///
/// `Pending → RateGated → Fetched → (Empty | Enriched → Normalized →
/// Windowed → Partitioned)`. `Empty` and `Partitioned` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SymbolState {
    Pending,
    RateGated,
    Fetched,
    Empty,
    Enriched,
    Normalized,
    Windowed,
    Partitioned,
}

impl fmt::Display for SymbolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SymbolState::Pending => "PENDING",
            SymbolState::RateGated => "RATE_GATED",
            SymbolState::Fetched => "FETCHED",
            SymbolState::Empty => "EMPTY",
            SymbolState::Enriched => "ENRICHED",
            SymbolState::Normalized => "NORMALIZED",
            SymbolState::Windowed => "WINDOWED",
            SymbolState::Partitioned => "PARTITIONED",
        };
        f.write_str(s)
    }
}

/// Why a symbol ended `Empty`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    FetchFailed { attempts: u32, error: String },
    NoData,
    InsufficientHistory { usable: usize, required: usize },
    DegenerateColumn { column: String },
    Normalize { error: String },
    Cancelled,
}

impl From<&PipelineError> for SkipReason {
    fn from(err: &PipelineError) -> Self {
        match err {
            PipelineError::FetchFailed {
                attempts, source, ..
            } => SkipReason::FetchFailed {
                attempts: *attempts,
                error: source.to_string(),
            },
            PipelineError::NoData { .. } => SkipReason::NoData,
            PipelineError::InsufficientHistory {
                usable, required, ..
            } => SkipReason::InsufficientHistory {
                usable: *usable,
                required: *required,
            },
            PipelineError::DegenerateColumn { column, .. } => SkipReason::DegenerateColumn {
                column: column.to_string(),
            },
            PipelineError::SymbolCancelled { .. } | PipelineError::Cancelled => {
                SkipReason::Cancelled
            }
            other => SkipReason::Normalize {
                error: other.to_string(),
            },
        }
    }
}

impl SkipReason {
    /// Likely cause worth telling an operator, for skips that usually come
    /// from configuration rather than from the symbol itself.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            SkipReason::DegenerateColumn { column } if column == Feature::EconomicRate.name() => {
                Some(
                    "economic_rate is constant over the requested span; the economic \
                     series did not change in this window and every symbol will be \
                     skipped. Lengthen fetch.duration or set economic.source = \"none\"",
                )
            }
            _ => None,
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::FetchFailed { attempts, error } => {
                write!(f, "fetch failed after {attempts} attempt(s): {error}")
            }
            SkipReason::NoData => f.write_str("no data"),
            SkipReason::InsufficientHistory { usable, required } => {
                write!(f, "insufficient history ({usable} < {required})")
            }
            SkipReason::DegenerateColumn { column } => write!(f, "degenerate column '{column}'"),
            SkipReason::Normalize { error } => write!(f, "normalization failed: {error}"),
            SkipReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Audit entry for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolOutcome {
    pub symbol: String,
    pub state: SymbolState,
    pub attempts: u32,
    pub rate_wait_ms: u64,
    pub bars: usize,
    pub usable_rows: usize,
    pub train_sequences: usize,
    pub purged_sequences: usize,
    pub test_sequences: usize,
    pub skip: Option<SkipReason>,
}

impl SymbolOutcome {
    pub(crate) fn pending(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            state: SymbolState::Pending,
            attempts: 0,
            rate_wait_ms: 0,
            bars: 0,
            usable_rows: 0,
            train_sequences: 0,
            purged_sequences: 0,
            test_sequences: 0,
            skip: None,
        }
    }

    pub(crate) fn add_wait(&mut self, waited: Duration) {
        self.rate_wait_ms += waited.as_millis() as u64;
    }

    pub(crate) fn partitioned(&mut self, counts: SplitCounts) {
        self.state = SymbolState::Partitioned;
        self.train_sequences = counts.train;
        self.purged_sequences = counts.purged;
        self.test_sequences = counts.test;
    }

    pub(crate) fn skipped(&mut self, reason: SkipReason) {
        self.state = SymbolState::Empty;
        self.skip = Some(reason);
    }

    pub fn is_processed(&self) -> bool {
        self.state == SymbolState::Partitioned
    }
}

/// Audit log of a run, one entry per requested symbol in request order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub outcomes: Vec<SymbolOutcome>,
}

impl RunReport {
    pub fn processed(&self) -> impl Iterator<Item = &SymbolOutcome> {
        self.outcomes.iter().filter(|o| o.is_processed())
    }

    pub fn skipped(&self) -> impl Iterator<Item = &SymbolOutcome> {
        self.outcomes.iter().filter(|o| !o.is_processed())
    }

    pub fn processed_count(&self) -> usize {
        self.processed().count()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped().count()
    }

    pub fn outcome(&self, symbol: &str) -> Option<&SymbolOutcome> {
        self.outcomes.iter().find(|o| o.symbol == symbol)
    }
}
