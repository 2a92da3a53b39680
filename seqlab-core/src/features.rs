//! Feature schema: enriched rows, the fixed feature-name → column mapping, and
//! the dense matrix handed to the normalizer.

use crate::domain::Bar;
use chrono::NaiveDateTime;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A bar with its merged economic value and every computed indicator.
///
/// `None` marks a cell that is undefined: indicator warm-up, a flat range, or
/// a date the economic series does not cover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRow {
    pub bar: Bar,
    pub economic: Option<f64>,
    pub bb_mid: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_lower: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_hist: Option<f64>,
    pub stoch_k: Option<f64>,
    pub stoch_d: Option<f64>,
    pub adx: Option<f64>,
    pub std: Option<f64>,
}

impl EnrichedRow {
    /// A row is usable when every column of `set` is defined and finite.
    pub fn is_usable(&self, set: &FeatureSet) -> bool {
        set.columns()
            .iter()
            .all(|f| f.value(self).is_some_and(f64::is_finite))
    }
}

/// Every column a row can contribute to the model input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Open,
    High,
    Low,
    Close,
    Volume,
    EconomicRate,
    BbMid,
    BbUpper,
    BbLower,
    Macd,
    MacdSignal,
    MacdHist,
    StochK,
    StochD,
    Adx,
    Std,
}

impl Feature {
    pub const ALL: [Feature; 16] = [
        Feature::Open,
        Feature::High,
        Feature::Low,
        Feature::Close,
        Feature::Volume,
        Feature::EconomicRate,
        Feature::BbMid,
        Feature::BbUpper,
        Feature::BbLower,
        Feature::Macd,
        Feature::MacdSignal,
        Feature::MacdHist,
        Feature::StochK,
        Feature::StochD,
        Feature::Adx,
        Feature::Std,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Feature::Open => "open",
            Feature::High => "high",
            Feature::Low => "low",
            Feature::Close => "close",
            Feature::Volume => "volume",
            Feature::EconomicRate => "economic_rate",
            Feature::BbMid => "bb_mid",
            Feature::BbUpper => "bb_upper",
            Feature::BbLower => "bb_lower",
            Feature::Macd => "macd",
            Feature::MacdSignal => "macd_signal",
            Feature::MacdHist => "macd_hist",
            Feature::StochK => "stoch_k",
            Feature::StochD => "stoch_d",
            Feature::Adx => "adx",
            Feature::Std => "std",
        }
    }

    pub fn value(self, row: &EnrichedRow) -> Option<f64> {
        match self {
            Feature::Open => Some(row.bar.open),
            Feature::High => Some(row.bar.high),
            Feature::Low => Some(row.bar.low),
            Feature::Close => Some(row.bar.close),
            Feature::Volume => Some(row.bar.volume),
            Feature::EconomicRate => row.economic,
            Feature::BbMid => row.bb_mid,
            Feature::BbUpper => row.bb_upper,
            Feature::BbLower => row.bb_lower,
            Feature::Macd => row.macd,
            Feature::MacdSignal => row.macd_signal,
            Feature::MacdHist => row.macd_hist,
            Feature::StochK => row.stoch_k,
            Feature::StochD => row.stoch_d,
            Feature::Adx => row.adx,
            Feature::Std => row.std,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered feature columns plus the column the model predicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSet {
    columns: Vec<Feature>,
    target: Feature,
}

impl FeatureSet {
    /// Builds a set from explicit columns. Returns `None` when `target` is not
    /// one of them or a column repeats.
    pub fn new(columns: Vec<Feature>, target: Feature) -> Option<Self> {
        let mut seen = columns.clone();
        seen.sort();
        seen.dedup();
        if seen.len() != columns.len() || !columns.contains(&target) {
            return None;
        }
        Some(Self { columns, target })
    }

    /// All sixteen columns, predicting `close`. The economic column is left
    /// out when no economic source is configured.
    pub fn standard(with_economic: bool) -> Self {
        let columns = Feature::ALL
            .into_iter()
            .filter(|f| with_economic || *f != Feature::EconomicRate)
            .collect();
        Self {
            columns,
            target: Feature::Close,
        }
    }

    pub fn columns(&self) -> &[Feature] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn target(&self) -> Feature {
        self.target
    }

    pub fn index_of(&self, feature: Feature) -> Option<usize> {
        self.columns.iter().position(|f| *f == feature)
    }

    pub fn target_index(&self) -> usize {
        // Constructors guarantee membership.
        self.index_of(self.target).unwrap_or(0)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|f| f.name()).collect()
    }
}

/// Usable rows of one symbol as a dense `rows x features` matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub timestamps: Vec<NaiveDateTime>,
    pub values: Array2<f64>,
}

impl FeatureMatrix {
    /// Keeps only rows passing [`EnrichedRow::is_usable`]; unusable rows are
    /// dropped, never imputed.
    pub fn from_rows(rows: &[EnrichedRow], set: &FeatureSet) -> Self {
        let usable: Vec<&EnrichedRow> = rows.iter().filter(|r| r.is_usable(set)).collect();
        let mut values = Array2::zeros((usable.len(), set.len()));
        for (i, row) in usable.iter().enumerate() {
            for (j, feature) in set.columns().iter().enumerate() {
                values[[i, j]] = feature.value(row).unwrap_or(f64::NAN);
            }
        }
        Self {
            timestamps: usable.iter().map(|r| r.bar.timestamp).collect(),
            values,
        }
    }

    pub fn rows(&self) -> usize {
        self.values.nrows()
    }
}
