//! Parquet staging of enriched rows, for inspection outside the process.
//!
//! Layout: `{stage_dir}/symbol={SYMBOL}/enriched.parquet` plus a
//! `meta.json` sidecar. Writes are atomic (write to .tmp, rename into place).
//! Undefined indicator cells are stored as Parquet nulls.

use crate::domain::Bar;
use crate::features::EnrichedRow;
use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("staging I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("parquet: {0}")]
    Parquet(String),

    #[error("nothing staged for symbol '{symbol}'")]
    Missing { symbol: String },

    #[error("staged file invalid: {0}")]
    Validation(String),

    #[error("sidecar: {0}")]
    Sidecar(#[from] serde_json::Error),

    #[error("symbol '{0}' cannot be used as a stage directory name")]
    InvalidSymbol(String),
}

/// Sidecar describing one staged symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageMeta {
    pub symbol: String,
    pub rows: usize,
    pub first: Option<NaiveDateTime>,
    pub last: Option<NaiveDateTime>,
    pub data_hash: String,
    pub staged_at: NaiveDateTime,
}

const PRICE_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];
const OPTIONAL_COLUMNS: [&str; 11] = [
    "economic_rate",
    "bb_mid",
    "bb_upper",
    "bb_lower",
    "macd",
    "macd_signal",
    "macd_hist",
    "stoch_k",
    "stoch_d",
    "adx",
    "std",
];

fn optional_cells(row: &EnrichedRow) -> [Option<f64>; 11] {
    [
        row.economic,
        row.bb_mid,
        row.bb_upper,
        row.bb_lower,
        row.macd,
        row.macd_signal,
        row.macd_hist,
        row.stoch_k,
        row.stoch_d,
        row.adx,
        row.std,
    ]
}

#[derive(Debug, Clone)]
pub struct EnrichedStage {
    dir: PathBuf,
}

impl EnrichedStage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Symbols become one path component; separators would let a symbol
    /// such as `../x` land outside the stage directory.
    fn symbol_dir(&self, symbol: &str) -> Result<PathBuf, StageError> {
        if symbol.is_empty() || symbol.contains(['/', '\\', '\0']) {
            return Err(StageError::InvalidSymbol(symbol.to_string()));
        }
        Ok(self.dir.join(format!("symbol={symbol}")))
    }

    pub fn path(&self, symbol: &str) -> Result<PathBuf, StageError> {
        Ok(self.symbol_dir(symbol)?.join("enriched.parquet"))
    }

    fn meta_path(&self, symbol: &str) -> Result<PathBuf, StageError> {
        Ok(self.symbol_dir(symbol)?.join("meta.json"))
    }

    pub fn write(&self, symbol: &str, rows: &[EnrichedRow]) -> Result<StageMeta, StageError> {
        fs::create_dir_all(self.symbol_dir(symbol)?)?;

        let df = rows_to_dataframe(rows)?;
        let path = self.path(symbol)?;
        let tmp_path = path.with_extension("parquet.tmp");
        write_parquet(&df, &tmp_path)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            // Clean up temp file on rename failure
            let _ = fs::remove_file(&tmp_path);
            e
        })?;

        let meta = StageMeta {
            symbol: symbol.to_string(),
            rows: rows.len(),
            first: rows.first().map(|r| r.bar.timestamp),
            last: rows.last().map(|r| r.bar.timestamp),
            data_hash: blake3::hash(&serde_json::to_vec(rows)?).to_hex().to_string(),
            staged_at: chrono::Local::now().naive_local(),
        };
        fs::write(self.meta_path(symbol)?, serde_json::to_string_pretty(&meta)?)?;
        Ok(meta)
    }

    pub fn load(&self, symbol: &str) -> Result<Vec<EnrichedRow>, StageError> {
        let path = self.path(symbol)?;
        if !path.exists() {
            return Err(StageError::Missing {
                symbol: symbol.to_string(),
            });
        }
        let file = fs::File::open(&path)?;
        let df = ParquetReader::new(file)
            .finish()
            .map_err(|e| StageError::Parquet(format!("read: {e}")))?;
        dataframe_to_rows(&df)
    }

    pub fn meta(&self, symbol: &str) -> Option<StageMeta> {
        let content = fs::read_to_string(self.meta_path(symbol).ok()?).ok()?;
        serde_json::from_str(&content).ok()
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn rows_to_dataframe(rows: &[EnrichedRow]) -> Result<DataFrame, StageError> {
    let timestamps: Vec<i64> = rows
        .iter()
        .map(|r| r.bar.timestamp.and_utc().timestamp_millis())
        .collect();

    let mut columns = vec![Column::new("timestamp_ms".into(), timestamps)];
    for (j, name) in PRICE_COLUMNS.iter().enumerate() {
        let values: Vec<f64> = rows
            .iter()
            .map(|r| {
                let b = &r.bar;
                [b.open, b.high, b.low, b.close, b.volume][j]
            })
            .collect();
        columns.push(Column::new((*name).into(), values));
    }
    for (j, name) in OPTIONAL_COLUMNS.iter().enumerate() {
        let values: Vec<Option<f64>> = rows.iter().map(|r| optional_cells(r)[j]).collect();
        columns.push(Column::new((*name).into(), values));
    }

    DataFrame::new(columns).map_err(|e| StageError::Parquet(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), StageError> {
    let file = fs::File::create(path)?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| StageError::Parquet(format!("write parquet: {e}")))?;
    Ok(())
}

fn f64_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Float64Chunked, StageError> {
    df.column(name)
        .map_err(|_| StageError::Validation(format!("missing column '{name}'")))?
        .f64()
        .map_err(|e| StageError::Validation(format!("{name} column type: {e}")))
}

fn dataframe_to_rows(df: &DataFrame) -> Result<Vec<EnrichedRow>, StageError> {
    let ts = df
        .column("timestamp_ms")
        .map_err(|_| StageError::Validation("missing column 'timestamp_ms'".into()))?
        .i64()
        .map_err(|e| StageError::Validation(format!("timestamp column type: {e}")))?;

    let prices = PRICE_COLUMNS
        .iter()
        .map(|name| f64_column(df, name))
        .collect::<Result<Vec<_>, _>>()?;
    let optional = OPTIONAL_COLUMNS
        .iter()
        .map(|name| f64_column(df, name))
        .collect::<Result<Vec<_>, _>>()?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let millis = ts
            .get(i)
            .ok_or_else(|| StageError::Validation(format!("null timestamp at row {i}")))?;
        let timestamp = DateTime::from_timestamp_millis(millis)
            .map(|dt| dt.naive_utc())
            .ok_or_else(|| StageError::Validation(format!("invalid timestamp at row {i}")))?;
        let price = |j: usize| prices[j].get(i).unwrap_or(f64::NAN);
        let cell = |j: usize| optional[j].get(i);

        rows.push(EnrichedRow {
            bar: Bar {
                timestamp,
                open: price(0),
                high: price(1),
                low: price(2),
                close: price(3),
                volume: price(4),
            },
            economic: cell(0),
            bb_mid: cell(1),
            bb_upper: cell(2),
            bb_lower: cell(3),
            macd: cell(4),
            macd_signal: cell(5),
            macd_hist: cell(6),
            stoch_k: cell(7),
            stoch_d: cell(8),
            adx: cell(9),
            std: cell(10),
        });
    }
    Ok(rows)
}
