//! Per-symbol min-max normalization.
//!
//! Each feature column is mapped to `(x - min) / (max - min)` using the
//! minimum and maximum seen over the fit rows. The fitted scaler is kept
//! per symbol so model outputs can be mapped back to prices.

use crate::features::Feature;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("cannot fit a scaler on zero rows")]
    Empty,

    #[error("column '{column}' is constant ({value}) over the fit rows")]
    DegenerateColumn { column: Feature, value: f64 },

    #[error("matrix has {actual} columns, scaler expects {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("fit rows {start}..{end} out of bounds for {rows} rows")]
    FitRange { start: usize, end: usize, rows: usize },

    #[error("column '{0}' is not part of this scaler")]
    UnknownColumn(Feature),
}

/// Which rows of a symbol the scaler is fit on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerFit {
    /// Every usable row. Test-period extremes leak into training inputs.
    #[default]
    FullHistory,
    /// Only rows that appear in a training sequence or target.
    TrainPrefix,
}

/// Fitted per-column `(min, max)` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    columns: Vec<Feature>,
    mins: Vec<f64>,
    maxs: Vec<f64>,
}

impl MinMaxScaler {
    /// Fit on every row of `values`. Columns are labelled by `columns`.
    pub fn fit(values: ArrayView2<f64>, columns: &[Feature]) -> Result<Self, NormalizeError> {
        if values.ncols() != columns.len() {
            return Err(NormalizeError::ShapeMismatch {
                expected: columns.len(),
                actual: values.ncols(),
            });
        }
        if values.nrows() == 0 {
            return Err(NormalizeError::Empty);
        }

        let mut mins = Vec::with_capacity(columns.len());
        let mut maxs = Vec::with_capacity(columns.len());
        for (col, feature) in values.axis_iter(Axis(1)).zip(columns) {
            let (lo, hi) = col
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                    (lo.min(v), hi.max(v))
                });
            if hi == lo {
                return Err(NormalizeError::DegenerateColumn {
                    column: *feature,
                    value: lo,
                });
            }
            mins.push(lo);
            maxs.push(hi);
        }

        Ok(Self {
            columns: columns.to_vec(),
            mins,
            maxs,
        })
    }

    pub fn columns(&self) -> &[Feature] {
        &self.columns
    }

    /// `(min, max)` for `feature`, if the scaler covers it.
    pub fn range(&self, feature: Feature) -> Option<(f64, f64)> {
        let j = self.columns.iter().position(|f| *f == feature)?;
        Some((self.mins[j], self.maxs[j]))
    }

    fn check_width(&self, ncols: usize) -> Result<(), NormalizeError> {
        if ncols != self.columns.len() {
            return Err(NormalizeError::ShapeMismatch {
                expected: self.columns.len(),
                actual: ncols,
            });
        }
        Ok(())
    }

    pub fn transform(&self, values: ArrayView2<f64>) -> Result<Array2<f64>, NormalizeError> {
        self.check_width(values.ncols())?;
        let mut out = values.to_owned();
        for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (lo, span) = (self.mins[j], self.maxs[j] - self.mins[j]);
            col.mapv_inplace(|v| (v - lo) / span);
        }
        Ok(out)
    }

    pub fn inverse_transform(&self, scaled: ArrayView2<f64>) -> Result<Array2<f64>, NormalizeError> {
        self.check_width(scaled.ncols())?;
        let mut out = scaled.to_owned();
        for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (lo, span) = (self.mins[j], self.maxs[j] - self.mins[j]);
            col.mapv_inplace(|v| v * span + lo);
        }
        Ok(out)
    }

    /// Map scaled values of one column (e.g. model predictions of `close`)
    /// back to original units.
    pub fn inverse_column(
        &self,
        feature: Feature,
        scaled: ArrayView1<f64>,
    ) -> Result<Array1<f64>, NormalizeError> {
        let (lo, hi) = self
            .range(feature)
            .ok_or(NormalizeError::UnknownColumn(feature))?;
        Ok(scaled.mapv(|v| v * (hi - lo) + lo))
    }
}

/// Fit on `fit_rows` of `values`, then scale every row.
pub fn fit_transform(
    values: ArrayView2<f64>,
    columns: &[Feature],
    fit_rows: Range<usize>,
) -> Result<(Array2<f64>, MinMaxScaler), NormalizeError> {
    if fit_rows.start > fit_rows.end || fit_rows.end > values.nrows() {
        return Err(NormalizeError::FitRange {
            start: fit_rows.start,
            end: fit_rows.end,
            rows: values.nrows(),
        });
    }
    let scaler = MinMaxScaler::fit(values.slice(ndarray::s![fit_rows, ..]), columns)?;
    let scaled = scaler.transform(values)?;
    Ok((scaled, scaler))
}

/// Fitted scalers keyed by symbol. Never shared between symbols.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScalerRegistry {
    scalers: BTreeMap<String, MinMaxScaler>,
}

impl ScalerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit a scaler for `symbol`, store it, and return the scaled matrix.
    /// A refit replaces the symbol's previous scaler.
    pub fn fit_transform(
        &mut self,
        symbol: &str,
        values: ArrayView2<f64>,
        columns: &[Feature],
        fit_rows: Range<usize>,
    ) -> Result<Array2<f64>, NormalizeError> {
        let (scaled, scaler) = fit_transform(values, columns, fit_rows)?;
        self.scalers.insert(symbol.to_string(), scaler);
        Ok(scaled)
    }

    pub fn insert(&mut self, symbol: impl Into<String>, scaler: MinMaxScaler) {
        self.scalers.insert(symbol.into(), scaler);
    }

    pub fn get(&self, symbol: &str) -> Option<&MinMaxScaler> {
        self.scalers.get(symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.scalers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.scalers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scalers.is_empty()
    }
}
