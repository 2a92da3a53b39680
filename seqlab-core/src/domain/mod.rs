//! Domain types: bars, per-symbol series, economic points, request parameters.

pub mod bar;
pub mod request;

pub use bar::{Bar, SeriesError, SymbolSeries};
pub use request::{BarSize, HistorySpan, SpanParseError, SpanUnit};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One observation of an exogenous indicator (e.g. a policy rate) for a calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EconomicPoint {
    pub date: NaiveDate,
    pub value: f64,
}
