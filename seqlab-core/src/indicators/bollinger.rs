//! Bollinger Bands: moving average +/- standard deviation multiplier.
//!
//! - Middle: SMA(close, period)
//! - Upper: middle + mult * stddev(close, period)
//! - Lower: middle - mult * stddev(close, period)
//!
//! Uses sample stddev (divide by N - 1).
//! Lookback: period - 1.

use super::rolling::{rolling_mean, rolling_std};

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub middle: Vec<f64>,
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
}

pub fn bollinger(closes: &[f64], period: usize, multiplier: f64) -> BollingerBands {
    assert!(period >= 2, "Bollinger period must be >= 2");
    let middle = rolling_mean(closes, period);
    let std = rolling_std(closes, period);

    let upper = middle
        .iter()
        .zip(&std)
        .map(|(m, s)| m + multiplier * s)
        .collect();
    let lower = middle
        .iter()
        .zip(&std)
        .map(|(m, s)| m - multiplier * s)
        .collect();

    BollingerBands {
        middle,
        upper,
        lower,
    }
}
