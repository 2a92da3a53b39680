//! Deterministic random-walk market data for offline runs and tests.
//!
//! The walk is seeded from the symbol name, so the same request always
//! yields the same bars and different symbols diverge.

use super::provider::{BarRequest, DataError, MarketDataSource};
use crate::domain::Bar;
use chrono::{Datelike, NaiveDateTime, NaiveTime, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

/// Regular-hours session: 09:30 to 16:00.
const SESSION_OPEN: (u32, u32) = (9, 30);
const SESSION_CLOSE: (u32, u32) = (16, 0);

#[derive(Debug, Clone, Default)]
pub struct SyntheticSource {
    empty: HashSet<String>,
    unknown: HashSet<String>,
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Symbols that exist but have no bars in any range.
    pub fn with_empty<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.empty.extend(symbols.into_iter().map(Into::into));
        self
    }

    /// Symbols the source does not list at all.
    pub fn with_unknown<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unknown.extend(symbols.into_iter().map(Into::into));
        self
    }
}

fn session_times(day: chrono::NaiveDate, step: chrono::Duration, intraday: bool) -> Vec<NaiveDateTime> {
    let (Some(open), Some(close)) = (
        NaiveTime::from_hms_opt(SESSION_OPEN.0, SESSION_OPEN.1, 0),
        NaiveTime::from_hms_opt(SESSION_CLOSE.0, SESSION_CLOSE.1, 0),
    ) else {
        return Vec::new();
    };
    if !intraday {
        return vec![day.and_time(open)];
    }
    let mut out = Vec::new();
    let mut t = day.and_time(open);
    let end = day.and_time(close);
    while t < end {
        out.push(t);
        t += step;
    }
    out
}

/// Random-walk bars for `symbol` at every session slot in `[start, end)`.
pub fn generate_bars(
    symbol: &str,
    start: NaiveDateTime,
    end: NaiveDateTime,
    step: chrono::Duration,
    intraday: bool,
) -> Vec<Bar> {
    // Deterministic seed from symbol name
    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut bars = Vec::new();
    let mut price = rng.gen_range(20.0..400.0_f64);
    let mut day = start.date();

    while day <= end.date() {
        let weekend = matches!(day.weekday(), Weekday::Sat | Weekday::Sun);
        let slots = if weekend {
            Vec::new()
        } else {
            session_times(day, step, intraday)
        };

        for timestamp in slots {
            if timestamp < start || timestamp >= end {
                continue;
            }
            let ret: f64 = rng.gen_range(-0.004..0.004);
            let open = price;
            let close = price * (1.0 + ret);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.002));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.002));
            let volume = rng.gen_range(10_000..500_000u64) as f64;

            bars.push(Bar {
                timestamp,
                open,
                high,
                low,
                close,
                volume,
            });
            price = close;
        }

        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    bars
}

impl MarketDataSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(&self, request: &BarRequest) -> Result<Vec<Bar>, DataError> {
        if self.unknown.contains(&request.symbol) {
            return Err(DataError::NoQualifyingInstrument {
                symbol: request.symbol.clone(),
            });
        }
        if self.empty.contains(&request.symbol) {
            return Ok(Vec::new());
        }
        Ok(generate_bars(
            &request.symbol,
            request.start()?,
            request.end,
            request.bar_size.duration(),
            request.bar_size.is_intraday(),
        ))
    }
}
