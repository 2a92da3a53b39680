//! Data source traits and structured error types.
//!
//! `MarketDataSource` abstracts over bar providers (Yahoo chart API, the
//! synthetic random walk, test fakes) so the pipeline never knows where bars
//! come from. `EconomicDataSource` does the same for the exogenous series.

use crate::domain::{Bar, BarSize, EconomicPoint, HistorySpan};
use chrono::{NaiveDate, NaiveDateTime};
use std::time::Duration;
use thiserror::Error;

/// Structured error types for collaborator failures.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("no qualifying instrument for '{symbol}'")]
    NoQualifyingInstrument { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("economic series unavailable: {0}")]
    EconomicUnavailable(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// Whether a retry of the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DataError::NetworkUnreachable(_) | DataError::RateLimited { .. } | DataError::Timeout(_)
        )
    }
}

/// One historical-bars request: `span` of `bar_size` bars ending at `end`.
#[derive(Debug, Clone, PartialEq)]
pub struct BarRequest {
    pub symbol: String,
    pub end: NaiveDateTime,
    pub span: HistorySpan,
    pub bar_size: BarSize,
    /// Upper bound on how long the source may block; `None` for its default.
    pub timeout: Option<Duration>,
}

impl BarRequest {
    pub fn start(&self) -> Result<NaiveDateTime, DataError> {
        self.span.start_from(self.end).ok_or_else(|| {
            DataError::InvalidRequest(format!("span {} before {} is out of range", self.span, self.end))
        })
    }
}

/// Historical bar provider.
///
/// Implementations return bars in ascending timestamp order. "No data" is an
/// empty vector, not an error.
pub trait MarketDataSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    fn fetch(&self, request: &BarRequest) -> Result<Vec<Bar>, DataError>;
}

/// Time-indexed exogenous series, at most one point per calendar date.
pub trait EconomicDataSource: Send + Sync {
    fn name(&self) -> &str;

    /// Points dated within `[start, end]`, ascending.
    fn range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<EconomicPoint>, DataError>;
}
