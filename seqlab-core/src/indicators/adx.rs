//! ADX: Average Directional Index.
//!
//! Steps:
//! 1. +DM / -DM from successive high/low differences, using the Wilder
//!    dominant-side rule: only the larger of the up move and the down move
//!    counts, and only when positive. Raw `high.diff()` / `low.diff()` values
//!    are not used as DM.
//! 2. Smooth +DM and -DM with Wilder's exponential method (alpha = 1/period)
//! 3. ATR = simple `period`-bar average of true range
//! 4. +DI = 100 * smoothed(+DM) / ATR, -DI = 100 * smoothed(-DM) / ATR
//! 5. DX = 100 * |+DI - -DI| / (+DI + -DI)
//! 6. ADX = simple `period`-bar average of DX
//!
//! A zero ATR or a zero DI sum leaves DX undefined (NaN).
//! Lookback: 2 * (period - 1).

use super::ema::wilder;
use super::rolling::rolling_mean;
use crate::domain::Bar;

/// Compute the True Range series from bars.
/// TR[0] = high[0] - low[0] (no previous close).
/// TR[t] = max(high[t]-low[t], |high[t]-close[t-1]|, |low[t]-close[t-1]|).
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let n = bars.len();
    let mut tr = vec![f64::NAN; n];

    if n == 0 {
        return tr;
    }

    tr[0] = bars[0].high - bars[0].low;

    for i in 1..n {
        let h = bars[i].high;
        let l = bars[i].low;
        let pc = bars[i - 1].close;
        tr[i] = if pc.is_nan() {
            h - l
        } else {
            (h - l).max((h - pc).abs()).max((l - pc).abs())
        };
    }

    tr
}

/// Directional movement: (+DM, -DM). Index 0 has no predecessor and is NaN.
pub fn directional_movement(bars: &[Bar]) -> (Vec<f64>, Vec<f64>) {
    let n = bars.len();
    let mut plus_dm = vec![f64::NAN; n];
    let mut minus_dm = vec![f64::NAN; n];

    for i in 1..n {
        let up = bars[i].high - bars[i - 1].high;
        let down = bars[i - 1].low - bars[i].low;

        if up.is_nan() || down.is_nan() {
            continue;
        }

        plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
        minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
    }

    (plus_dm, minus_dm)
}

pub fn adx(bars: &[Bar], period: usize) -> Vec<f64> {
    assert!(period >= 1, "ADX period must be >= 1");
    let n = bars.len();
    if n < 2 {
        return vec![f64::NAN; n];
    }

    let (plus_dm, minus_dm) = directional_movement(bars);
    let smooth_plus = wilder(&plus_dm, period);
    let smooth_minus = wilder(&minus_dm, period);
    let atr = rolling_mean(&true_range(bars), period);

    let dx: Vec<f64> = (0..n)
        .map(|i| {
            if atr[i].is_nan() || atr[i] == 0.0 {
                return f64::NAN;
            }
            let plus_di = 100.0 * smooth_plus[i] / atr[i];
            let minus_di = 100.0 * smooth_minus[i] / atr[i];
            let di_sum = plus_di + minus_di;
            if di_sum.is_nan() || di_sum == 0.0 {
                f64::NAN
            } else {
                100.0 * (plus_di - minus_di).abs() / di_sum
            }
        })
        .collect();

    rolling_mean(&dx, period)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_ohlc_bars, DEFAULT_EPSILON};

    #[test]
    fn true_range_basic() {
        let bars = make_ohlc_bars(&[
            (100.0, 105.0, 95.0, 102.0),  // TR = 105-95 = 10
            (102.0, 108.0, 100.0, 106.0), // TR = max(8, |108-102|, |100-102|) = 8
            (106.0, 107.0, 98.0, 99.0),   // TR = max(9, |107-106|, |98-106|) = 9
        ]);
        let tr = true_range(&bars);
        assert_approx(tr[0], 10.0, DEFAULT_EPSILON);
        assert_approx(tr[1], 8.0, DEFAULT_EPSILON);
        assert_approx(tr[2], 9.0, DEFAULT_EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        let bars = make_ohlc_bars(&[
            (98.0, 102.0, 97.0, 100.0),
            (110.0, 115.0, 108.0, 112.0), // TR = max(7, |115-100|, |108-100|) = 15
        ]);
        assert_approx(true_range(&bars)[1], 15.0, DEFAULT_EPSILON);
    }

    #[test]
    fn directional_movement_picks_dominant_side() {
        let bars = make_ohlc_bars(&[
            (10.0, 12.0, 8.0, 11.0),
            (11.0, 15.0, 7.0, 14.0), // up 3, down 1 -> +DM 3
            (14.0, 14.0, 4.0, 5.0),  // up -1, down 3 -> -DM 3
        ]);
        let (plus, minus) = directional_movement(&bars);
        assert!(plus[0].is_nan());
        assert_eq!((plus[1], minus[1]), (3.0, 0.0));
        assert_eq!((plus[2], minus[2]), (0.0, 3.0));
    }

    #[test]
    fn adx_bounds_and_warmup() {
        let mut data = Vec::new();
        for i in 0..60 {
            let base = 100.0 + (i as f64 * 0.4).sin() * 6.0 + i as f64 * 0.2;
            data.push((base - 0.5, base + 2.0, base - 2.0, base + 0.5));
        }
        let bars = make_ohlc_bars(&data);
        let result = adx(&bars, 14);

        assert!(result[..26].iter().all(|v| v.is_nan()));
        assert!(!result[26].is_nan());
        for (i, &v) in result.iter().enumerate().filter(|(_, v)| !v.is_nan()) {
            assert!((0.0..=100.0).contains(&v), "ADX out of bounds at bar {i}: {v}");
        }
    }

    #[test]
    fn adx_strong_trend_elevated() {
        let data: Vec<_> = (0..40)
            .map(|i| {
                let base = 100.0 + i as f64 * 5.0;
                (base - 1.0, base + 3.0, base - 3.0, base + 2.0)
            })
            .collect();
        let result = adx(&make_ohlc_bars(&data), 5);
        let last = result.iter().rev().find(|v| !v.is_nan()).copied();
        assert!(last.is_some_and(|v| v > 20.0), "expected elevated ADX, got {last:?}");
    }

    #[test]
    fn flat_series_is_undefined() {
        let bars = make_ohlc_bars(&[(5.0, 5.0, 5.0, 5.0); 40]);
        assert!(adx(&bars, 14).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn too_few_bars() {
        let bars = make_ohlc_bars(&[(100.0, 105.0, 95.0, 102.0)]);
        assert!(adx(&bars, 3).iter().all(|v| v.is_nan()));
    }
}
