//! Technical indicators over a single symbol's bar series.
//!
//! Building blocks operate on `&[f64]` or `&[Bar]` and return a series of the
//! same length, with NaN wherever the trailing window is not yet full. The
//! [`IndicatorEngine`] turns those series into [`EnrichedRow`]s, where NaN
//! becomes an explicit `None`.
//!
//! [`EnrichedRow`]: crate::features::EnrichedRow

pub mod adx;
pub mod bollinger;
pub mod ema;
pub mod engine;
pub mod macd;
pub mod rolling;
pub mod stochastic;

pub use adx::{adx, directional_movement, true_range};
pub use bollinger::{bollinger, BollingerBands};
pub use ema::{ema, exp_smooth, wilder};
pub use engine::{IndicatorEngine, IndicatorParams};
pub use macd::{macd, Macd};
pub use rolling::{rolling_max, rolling_mean, rolling_min, rolling_std};
pub use stochastic::{stochastic, Stochastic};

/// Create synthetic 30-minute bars from close prices for testing.
///
/// Generates plausible OHLV: open = prev_close (or close for first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<crate::domain::Bar> {
    let data: Vec<(f64, f64, f64, f64)> = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            (open, open.max(close) + 1.0, open.min(close) - 1.0, close)
        })
        .collect();
    make_ohlc_bars(&data)
}

/// Create 30-minute bars from explicit (open, high, low, close) tuples.
#[cfg(test)]
pub fn make_ohlc_bars(data: &[(f64, f64, f64, f64)]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Bar {
            timestamp: base + chrono::Duration::minutes(30 * i as i64),
            open,
            high,
            low,
            close,
            volume: 1000.0,
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
