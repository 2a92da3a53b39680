//! Exponential smoothing.
//!
//! Recursive: S[t] = alpha * x[t] + (1 - alpha) * S[t-1]
//! Seed: S[first] = x[first], where `first` is the first non-NaN input.
//! No warm-up truncation: every index from the seed onward is defined.
//! A NaN input after the seed carries the previous smoothed value forward.

/// Exponential smoothing with an explicit `alpha` in (0, 1].
pub fn exp_smooth(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut result = vec![f64::NAN; values.len()];
    let mut prev: Option<f64> = None;

    for (i, &v) in values.iter().enumerate() {
        let next = match prev {
            None if v.is_nan() => None,
            None => Some(v),
            Some(p) if v.is_nan() => Some(p),
            Some(p) => Some(alpha * v + (1.0 - alpha) * p),
        };
        if let Some(s) = next {
            result[i] = s;
        }
        prev = next;
    }

    result
}

/// EMA by span: alpha = 2 / (span + 1).
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    assert!(span >= 1, "EMA span must be >= 1");
    exp_smooth(values, 2.0 / (span as f64 + 1.0))
}

/// Wilder smoothing: alpha = 1 / period.
pub fn wilder(values: &[f64], period: usize) -> Vec<f64> {
    assert!(period >= 1, "Wilder period must be >= 1");
    exp_smooth(values, 1.0 / period as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn span_1_equals_input() {
        let result = ema(&[100.0, 200.0, 300.0], 1);
        assert_eq!(result, vec![100.0, 200.0, 300.0]);
    }

    #[test]
    fn span_3_seeded_by_first_value() {
        // alpha = 0.5, seed 10
        // S[1] = 0.5*11 + 0.5*10 = 10.5
        // S[2] = 0.5*12 + 0.5*10.5 = 11.25
        let result = ema(&[10.0, 11.0, 12.0], 3);
        assert_approx(result[0], 10.0, DEFAULT_EPSILON);
        assert_approx(result[1], 10.5, DEFAULT_EPSILON);
        assert_approx(result[2], 11.25, DEFAULT_EPSILON);
    }

    #[test]
    fn leading_nans_delay_the_seed() {
        let result = wilder(&[f64::NAN, 4.0, 8.0], 2);
        assert!(result[0].is_nan());
        assert_approx(result[1], 4.0, DEFAULT_EPSILON);
        assert_approx(result[2], 6.0, DEFAULT_EPSILON);
    }

    #[test]
    fn interior_nan_carries_previous_value() {
        let result = ema(&[10.0, f64::NAN, 10.0], 3);
        assert_approx(result[1], 10.0, DEFAULT_EPSILON);
        assert_approx(result[2], 10.0, DEFAULT_EPSILON);
    }

    #[test]
    fn constant_series_stays_constant() {
        let result = ema(&[42.0; 50], 26);
        assert!(result.iter().all(|v| (v - 42.0).abs() < 1e-9));
    }
}
