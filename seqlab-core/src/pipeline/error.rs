use crate::data::DataError;
use crate::features::Feature;
use crate::normalize::NormalizeError;
use thiserror::Error;

/// Failures of a pipeline run.
///
/// Variants carrying a `symbol` are per-symbol: they are logged, recorded in
/// the run report, and the batch moves on. Only the batch-level variants
/// (`EmptyBatch`, `Cancelled`, `EconomicSource`, `InvalidOptions`,
/// `ThreadPool`) are returned from [`IngestionPipeline::run`].
///
/// [`IngestionPipeline::run`]: super::IngestionPipeline::run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{symbol}: fetch failed after {attempts} attempt(s): {source}")]
    FetchFailed {
        symbol: String,
        attempts: u32,
        #[source]
        source: DataError,
    },

    #[error("{symbol}: source returned no bars")]
    NoData { symbol: String },

    #[error("{symbol}: {usable} usable rows, need at least {required}")]
    InsufficientHistory {
        symbol: String,
        usable: usize,
        required: usize,
    },

    #[error("{symbol}: column '{column}' is constant, cannot normalize")]
    DegenerateColumn { symbol: String, column: Feature },

    #[error("{symbol}: normalization failed: {source}")]
    Normalize {
        symbol: String,
        #[source]
        source: NormalizeError,
    },

    #[error("{symbol}: cancelled")]
    SymbolCancelled { symbol: String },

    #[error("no symbol produced data ({attempted} attempted)")]
    EmptyBatch { attempted: usize },

    #[error("run cancelled before any symbol completed")]
    Cancelled,

    #[error("economic source failed: {0}")]
    EconomicSource(#[source] DataError),

    #[error("invalid pipeline options: {0}")]
    InvalidOptions(String),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

impl PipelineError {
    pub(crate) fn normalize(symbol: &str, source: NormalizeError) -> Self {
        match source {
            NormalizeError::DegenerateColumn { column, .. } => PipelineError::DegenerateColumn {
                symbol: symbol.to_string(),
                column,
            },
            other => PipelineError::Normalize {
                symbol: symbol.to_string(),
                source: other,
            },
        }
    }
}
