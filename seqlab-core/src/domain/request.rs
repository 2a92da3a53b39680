//! Historical-bar request parameters: bar size and lookback span.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Bar interval requested from a market data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarSize {
    #[serde(rename = "1m")]
    Min1,
    #[serde(rename = "5m")]
    Min5,
    #[serde(rename = "15m")]
    Min15,
    #[serde(rename = "30m")]
    Min30,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "1d")]
    Day1,
}

impl BarSize {
    pub fn duration(self) -> Duration {
        match self {
            BarSize::Min1 => Duration::minutes(1),
            BarSize::Min5 => Duration::minutes(5),
            BarSize::Min15 => Duration::minutes(15),
            BarSize::Min30 => Duration::minutes(30),
            BarSize::Hour1 => Duration::hours(1),
            BarSize::Day1 => Duration::days(1),
        }
    }

    /// Interval token used by the Yahoo chart API.
    pub fn chart_interval(self) -> &'static str {
        match self {
            BarSize::Min1 => "1m",
            BarSize::Min5 => "5m",
            BarSize::Min15 => "15m",
            BarSize::Min30 => "30m",
            BarSize::Hour1 => "60m",
            BarSize::Day1 => "1d",
        }
    }

    pub fn is_intraday(self) -> bool {
        self != BarSize::Day1
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpanParseError {
    #[error("expected '<count> <unit>' (e.g. \"1 M\"), got '{0}'")]
    Malformed(String),
    #[error("unknown span unit '{0}' (expected S, D, W, M or Y)")]
    UnknownUnit(String),
    #[error("span count must be positive")]
    Zero,
    #[error("span '{0}' is longer than {max} days", max = HistorySpan::MAX_DAYS)]
    TooLong(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpanUnit {
    Seconds,
    Days,
    Weeks,
    Months,
    Years,
}

/// Lookback window ending at the request's end time, written the way
/// brokers spell it: `"30 D"`, `"2 W"`, `"1 M"`, `"1 Y"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HistorySpan {
    pub count: u32,
    pub unit: SpanUnit,
}

impl HistorySpan {
    /// Longest span the parser accepts: 100 years.
    pub const MAX_DAYS: i64 = 365 * 100;

    pub fn days(count: u32) -> Self {
        Self {
            count,
            unit: SpanUnit::Days,
        }
    }

    pub fn months(count: u32) -> Self {
        Self {
            count,
            unit: SpanUnit::Months,
        }
    }

    /// Calendar length of the span. Months count as 30 days, years as 365.
    /// `None` if it does not fit a `Duration`.
    pub fn duration(&self) -> Option<Duration> {
        let n = i64::from(self.count);
        match self.unit {
            SpanUnit::Seconds => Duration::try_seconds(n),
            SpanUnit::Days => Duration::try_days(n),
            SpanUnit::Weeks => Duration::try_weeks(n),
            SpanUnit::Months => Duration::try_days(30 * n),
            SpanUnit::Years => Duration::try_days(365 * n),
        }
    }

    /// Start of the window that ends at `end`, or `None` when that falls
    /// before the earliest representable date.
    pub fn start_from(&self, end: NaiveDateTime) -> Option<NaiveDateTime> {
        end.checked_sub_signed(self.duration()?)
    }
}

impl FromStr for HistorySpan {
    type Err = SpanParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let (count, unit) = match (parts.next(), parts.next(), parts.next()) {
            (Some(c), Some(u), None) => (c, u),
            _ => return Err(SpanParseError::Malformed(s.to_string())),
        };
        let count: u32 = count
            .parse()
            .map_err(|_| SpanParseError::Malformed(s.to_string()))?;
        if count == 0 {
            return Err(SpanParseError::Zero);
        }
        let unit = match unit.to_ascii_uppercase().as_str() {
            "S" => SpanUnit::Seconds,
            "D" => SpanUnit::Days,
            "W" => SpanUnit::Weeks,
            "M" => SpanUnit::Months,
            "Y" => SpanUnit::Years,
            other => return Err(SpanParseError::UnknownUnit(other.to_string())),
        };
        let span = Self { count, unit };
        match span.duration() {
            Some(d) if d.num_days() <= Self::MAX_DAYS => Ok(span),
            _ => Err(SpanParseError::TooLong(s.to_string())),
        }
    }
}

impl fmt::Display for HistorySpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            SpanUnit::Seconds => "S",
            SpanUnit::Days => "D",
            SpanUnit::Weeks => "W",
            SpanUnit::Months => "M",
            SpanUnit::Years => "Y",
        };
        write!(f, "{} {unit}", self.count)
    }
}

impl TryFrom<String> for HistorySpan {
    type Error = SpanParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HistorySpan> for String {
    fn from(span: HistorySpan) -> Self {
        span.to_string()
    }
}
