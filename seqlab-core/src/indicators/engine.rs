//! Indicator engine: one symbol's bars in, enriched rows out.
//!
//! Pure and deterministic. Every column is computed from the symbol's own
//! trailing history; nothing here can see another symbol or a later bar.

use super::adx::adx;
use super::bollinger::bollinger;
use super::macd::macd;
use super::rolling::rolling_std;
use super::stochastic::stochastic;
use crate::domain::Bar;
use crate::features::EnrichedRow;
use serde::{Deserialize, Serialize};

/// Window lengths for every derived column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub bollinger_period: usize,
    pub bollinger_multiplier: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub stoch_k: usize,
    pub stoch_d: usize,
    pub adx_period: usize,
    pub std_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            bollinger_period: 20,
            bollinger_multiplier: 2.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            stoch_k: 14,
            stoch_d: 3,
            adx_period: 14,
            std_period: 20,
        }
    }
}

impl IndicatorParams {
    /// Leading rows that carry at least one undefined column.
    pub fn warmup(&self) -> usize {
        [
            self.bollinger_period - 1,
            self.std_period - 1,
            self.stoch_k + self.stoch_d - 2,
            2 * (self.adx_period - 1),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.bollinger_period < 2 || self.std_period < 2 {
            return Err("bollinger_period and std_period must be >= 2".into());
        }
        if self.macd_fast == 0 || self.macd_fast >= self.macd_slow || self.macd_signal == 0 {
            return Err("macd spans must satisfy 0 < fast < slow and signal > 0".into());
        }
        if self.stoch_k == 0 || self.stoch_d == 0 || self.adx_period == 0 {
            return Err("stochastic and ADX periods must be >= 1".into());
        }
        Ok(())
    }
}

/// NaN and infinities become `None`.
fn defined(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine {
    params: IndicatorParams,
}

impl IndicatorEngine {
    pub fn new(params: IndicatorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &IndicatorParams {
        &self.params
    }

    /// Enrich `bars` with indicator columns.
    ///
    /// `economic[i]` is the merged exogenous value for `bars[i]`; a shorter
    /// slice leaves the remaining rows without one.
    pub fn compute(&self, bars: &[Bar], economic: &[Option<f64>]) -> Vec<EnrichedRow> {
        let p = &self.params;
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        let bands = bollinger(&closes, p.bollinger_period, p.bollinger_multiplier);
        let m = macd(&closes, p.macd_fast, p.macd_slow, p.macd_signal);
        let stoch = stochastic(bars, p.stoch_k, p.stoch_d);
        let adx = adx(bars, p.adx_period);
        let std = rolling_std(&closes, p.std_period);

        bars.iter()
            .enumerate()
            .map(|(i, bar)| EnrichedRow {
                bar: bar.clone(),
                economic: economic.get(i).copied().flatten(),
                bb_mid: defined(bands.middle[i]),
                bb_upper: defined(bands.upper[i]),
                bb_lower: defined(bands.lower[i]),
                macd: defined(m.line[i]),
                macd_signal: defined(m.signal[i]),
                macd_hist: defined(m.histogram[i]),
                stoch_k: defined(stoch.k[i]),
                stoch_d: defined(stoch.d[i]),
                adx: defined(adx[i]),
                std: defined(std[i]),
            })
            .collect()
    }
}
