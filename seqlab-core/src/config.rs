//! Serializable pipeline configuration (TOML).
//!
//! Every section is `#[serde(default)]`, so an empty file is a valid
//! configuration that reproduces the stock broker limits and feature setup.

use crate::cancel::CancelToken;
use crate::data::FillPolicy;
use crate::domain::{BarSize, HistorySpan};
use crate::indicators::IndicatorParams;
use crate::normalize::ScalerFit;
use crate::pipeline::PipelineOptions;
use crate::rate_limit::{RateLimitPolicy, Window};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid symbol list: {0}")]
    Symbols(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub rate_limit: RateLimitConfig,
    pub fetch: FetchConfig,
    pub features: FeaturesConfig,
    pub economic: EconomicConfig,
    /// Stage enriched rows as Parquet under this directory.
    pub stage_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub global_limit: usize,
    pub global_interval_secs: u64,
    /// Zero disables the per-target window.
    pub per_target_limit: usize,
    pub per_target_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            global_limit: 60,
            global_interval_secs: 600,
            per_target_limit: 6,
            per_target_interval_secs: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub bar_size: BarSize,
    pub duration: HistorySpan,
    /// End of the requested window; the current local time when unset.
    pub end: Option<NaiveDateTime>,
    pub max_attempts: u32,
    pub workers: usize,
    /// Overall batch deadline.
    pub deadline_secs: Option<u64>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            bar_size: BarSize::Min30,
            duration: HistorySpan::months(1),
            end: None,
            max_attempts: 3,
            workers: 1,
            deadline_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    pub sequence_length: usize,
    pub split_ratio: f64,
    pub purge_overlap: bool,
    pub economic_fill: FillPolicy,
    pub scaler_fit: ScalerFit,
    pub indicators: IndicatorParams,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            sequence_length: 60,
            split_ratio: 0.8,
            purge_overlap: true,
            economic_fill: FillPolicy::CarryForward,
            scaler_fit: ScalerFit::FullHistory,
            indicators: IndicatorParams::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EconomicSourceKind {
    /// No economic column.
    #[default]
    None,
    /// `date,value` rows from `csv_path`.
    Csv,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomicConfig {
    pub source: EconomicSourceKind,
    pub csv_path: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        let rl = &self.rate_limit;
        if rl.global_limit == 0 || rl.global_interval_secs == 0 {
            return invalid("rate_limit.global_limit and global_interval_secs must be > 0".into());
        }
        if rl.per_target_limit > 0 && rl.per_target_interval_secs == 0 {
            return invalid("rate_limit.per_target_interval_secs must be > 0".into());
        }
        if self.fetch.max_attempts == 0 {
            return invalid("fetch.max_attempts must be >= 1".into());
        }
        if self.fetch.workers == 0 {
            return invalid("fetch.workers must be >= 1".into());
        }
        if self.fetch.duration.count == 0 {
            return invalid("fetch.duration must be positive".into());
        }
        let span_days = self.fetch.duration.duration().map(|d| d.num_days());
        if span_days.map_or(true, |days| days > HistorySpan::MAX_DAYS) {
            return invalid(format!(
                "fetch.duration must be at most {} days, got {}",
                HistorySpan::MAX_DAYS,
                self.fetch.duration
            ));
        }
        let f = &self.features;
        if f.sequence_length == 0 {
            return invalid("features.sequence_length must be >= 1".into());
        }
        if !(f.split_ratio > 0.0 && f.split_ratio < 1.0) {
            return invalid(format!("features.split_ratio must be in (0, 1), got {}", f.split_ratio));
        }
        f.indicators
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("features.indicators: {e}")))?;
        if self.economic.source == EconomicSourceKind::Csv && self.economic.csv_path.is_none() {
            return invalid("economic.source = \"csv\" requires economic.csv_path".into());
        }
        Ok(())
    }

    pub fn rate_limit_policy(&self) -> RateLimitPolicy {
        let rl = &self.rate_limit;
        RateLimitPolicy {
            global: Window::new(rl.global_limit, Duration::from_secs(rl.global_interval_secs)),
            per_target: (rl.per_target_limit > 0).then(|| {
                Window::new(
                    rl.per_target_limit,
                    Duration::from_secs(rl.per_target_interval_secs),
                )
            }),
        }
    }

    /// Pipeline options; `now` stands in for an unset `fetch.end`.
    pub fn options(&self, now: NaiveDateTime) -> PipelineOptions {
        PipelineOptions {
            end: self.fetch.end.unwrap_or(now),
            span: self.fetch.duration,
            bar_size: self.fetch.bar_size,
            max_attempts: self.fetch.max_attempts,
            workers: self.fetch.workers,
            sequence_length: self.features.sequence_length,
            split_ratio: self.features.split_ratio,
            purge_overlap: self.features.purge_overlap,
            fill: self.features.economic_fill,
            scaler_fit: self.features.scaler_fit,
            indicators: self.features.indicators,
        }
    }

    /// Cancel token carrying the batch deadline, if one is configured.
    pub fn cancel_token(&self) -> CancelToken {
        match self.fetch.deadline_secs {
            Some(secs) => CancelToken::with_timeout(Duration::from_secs(secs)),
            None => CancelToken::new(),
        }
    }
}

/// Read a JSON array of ticker symbols, e.g. `["SPY", "QQQ"]`.
pub fn load_symbols(path: &Path) -> Result<Vec<String>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_symbols(&text)
}

pub fn parse_symbols(text: &str) -> Result<Vec<String>, ConfigError> {
    let symbols: Vec<String> = serde_json::from_str(text)?;
    let symbols: Vec<String> = symbols
        .into_iter()
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();
    if symbols.is_empty() {
        return Err(ConfigError::Invalid("symbol list is empty".into()));
    }
    Ok(symbols)
}
