//! Trailing-window reductions over `f64` series.
//!
//! Every function returns a series of the same length as its input. Index `i`
//! covers `values[i + 1 - period..=i]`; the first `period - 1` outputs are NaN,
//! and any window containing a NaN yields NaN.

fn rolling_apply(values: &[f64], period: usize, reduce: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if period == 0 || n < period {
        return result;
    }

    for i in (period - 1)..n {
        let window = &values[i + 1 - period..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[i] = reduce(window);
    }

    result
}

pub fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    rolling_apply(values, period, |w| w.iter().sum::<f64>() / w.len() as f64)
}

/// Sample standard deviation (divides by `period - 1`). A period of 1 has no
/// defined sample deviation and yields all NaN.
pub fn rolling_std(values: &[f64], period: usize) -> Vec<f64> {
    if period < 2 {
        return vec![f64::NAN; values.len()];
    }
    rolling_apply(values, period, |w| {
        let mean = w.iter().sum::<f64>() / w.len() as f64;
        let ss: f64 = w.iter().map(|v| (v - mean) * (v - mean)).sum();
        (ss / (w.len() - 1) as f64).sqrt()
    })
}

pub fn rolling_min(values: &[f64], period: usize) -> Vec<f64> {
    rolling_apply(values, period, |w| w.iter().copied().fold(f64::INFINITY, f64::min))
}

pub fn rolling_max(values: &[f64], period: usize) -> Vec<f64> {
    rolling_apply(values, period, |w| {
        w.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    })
}
