//! Stochastic oscillator.
//!
//! %K = 100 * (close - lowest_low(k)) / (highest_high(k) - lowest_low(k))
//! %D = SMA(%K, d)
//!
//! A flat range (highest high == lowest low) leaves %K undefined (NaN),
//! which in turn poisons every %D window containing it.
//! Lookback: %K k - 1, %D k + d - 2.

use super::rolling::{rolling_max, rolling_mean, rolling_min};
use crate::domain::Bar;

#[derive(Debug, Clone, PartialEq)]
pub struct Stochastic {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
}

pub fn stochastic(bars: &[Bar], k_period: usize, d_period: usize) -> Stochastic {
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let lowest = rolling_min(&lows, k_period);
    let highest = rolling_max(&highs, k_period);

    let k: Vec<f64> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let range = highest[i] - lowest[i];
            if range.is_nan() || range == 0.0 {
                f64::NAN
            } else {
                100.0 * (bar.close - lowest[i]) / range
            }
        })
        .collect();
    let d = rolling_mean(&k, d_period);

    Stochastic { k, d }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, make_ohlc_bars, DEFAULT_EPSILON};

    #[test]
    fn close_at_high_is_100() {
        let bars = make_ohlc_bars(&[
            (10.0, 12.0, 9.0, 11.0),
            (11.0, 13.0, 10.0, 12.0),
            (12.0, 14.0, 11.0, 14.0),
        ]);
        let st = stochastic(&bars, 3, 1);
        assert!(st.k[1].is_nan());
        // lowest low 9, highest high 14, close 14
        assert_approx(st.k[2], 100.0, DEFAULT_EPSILON);
    }

    #[test]
    fn d_is_mean_of_k() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + (i as f64).sin() * 5.0).collect();
        let bars = make_bars(&closes);
        let st = stochastic(&bars, 5, 3);
        for i in 6..20 {
            let expected = (st.k[i] + st.k[i - 1] + st.k[i - 2]) / 3.0;
            assert_approx(st.d[i], expected, DEFAULT_EPSILON);
        }
        assert!(st.d[5].is_nan());
    }

    #[test]
    fn flat_range_is_undefined() {
        let bars = make_ohlc_bars(&[(5.0, 5.0, 5.0, 5.0); 6]);
        let st = stochastic(&bars, 3, 3);
        assert!(st.k.iter().all(|v| v.is_nan()));
        assert!(st.d.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn k_bounded_0_to_100() {
        let closes: Vec<f64> = (0..40).map(|i| 50.0 + (i as f64 * 0.3).cos() * 8.0).collect();
        let st = stochastic(&make_bars(&closes), 14, 3);
        for v in st.k.iter().filter(|v| !v.is_nan()) {
            assert!((0.0..=100.0).contains(v), "%K out of bounds: {v}");
        }
    }
}
