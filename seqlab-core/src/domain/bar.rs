//! Bar, the fundamental market data unit, and the per-symbol ordered series.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV bar for a single symbol over one bar interval.
///
/// Immutable once fetched. `timestamp` is the bar's start time as reported by
/// the provider (exchange-local, no timezone attached).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Calendar date of the bar, used for the economic-series join.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Returns true if any OHLCV field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan()
            || self.high.is_nan()
            || self.low.is_nan()
            || self.close.is_nan()
            || self.volume.is_nan()
    }

    /// Returns true if every OHLCV field is finite (no NaN, no infinity).
    pub fn is_finite(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite())
    }

    /// Basic OHLCV sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
            && self.volume >= 0.0
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("bar {index} of '{symbol}' is not after its predecessor ({timestamp})")]
    NotIncreasing {
        symbol: String,
        index: usize,
        timestamp: NaiveDateTime,
    },
}

/// Ordered bars for one symbol: strictly increasing timestamps, no duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSeries {
    symbol: String,
    bars: Vec<Bar>,
}

impl SymbolSeries {
    /// Wrap bars that are already strictly ordered.
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<Self, SeriesError> {
        let symbol = symbol.into();
        for (i, pair) in bars.windows(2).enumerate() {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(SeriesError::NotIncreasing {
                    symbol,
                    index: i + 1,
                    timestamp: pair[1].timestamp,
                });
            }
        }
        Ok(Self { symbol, bars })
    }

    /// Drop bars with a non-finite field, sort by timestamp, and drop
    /// duplicate timestamps, keeping the last occurrence (providers resend
    /// the still-forming bar).
    pub fn canonicalize(symbol: impl Into<String>, mut bars: Vec<Bar>) -> Self {
        bars.retain(Bar::is_finite);
        bars.sort_by_key(|b| b.timestamp);
        let mut deduped: Vec<Bar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.timestamp == bar.timestamp => *last = bar,
                _ => deduped.push(bar),
            }
        }
        Self {
            symbol: symbol.into(),
            bars: deduped,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}
