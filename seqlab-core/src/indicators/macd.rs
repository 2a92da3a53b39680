//! MACD: difference of fast and slow EMAs, with a signal line.
//!
//! line = EMA(close, fast) - EMA(close, slow)
//! signal = EMA(line, signal)
//! histogram = line - signal
//!
//! The EMAs are seeded by the first close, so MACD is defined from bar 0.

use super::ema::ema;

#[derive(Debug, Clone, PartialEq)]
pub struct Macd {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    assert!(fast < slow, "MACD fast span must be shorter than slow span");
    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);

    let line: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let signal = ema(&line, signal);
    let histogram = line.iter().zip(&signal).map(|(l, s)| l - s).collect();

    Macd {
        line,
        signal,
        histogram,
    }
}
