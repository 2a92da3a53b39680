//! SeqLab Core: rate-limited bar ingestion and sequence-dataset construction.
//!
//! This crate turns a list of ticker symbols into model-ready tensors:
//! - Dual sliding-window rate limiter shared by every fetch
//! - Market and economic data sources (Yahoo chart API, synthetic, CSV)
//! - Technical indicators (Bollinger, MACD, stochastic, ADX, rolling std)
//! - Per-symbol min-max normalization with retained scalers
//! - Sequence windowing and chronological, purged train/test partitioning
//! - Per-symbol state machine with skip-not-abort failure handling

pub mod cancel;
pub mod config;
pub mod data;
pub mod domain;
pub mod features;
pub mod fingerprint;
pub mod indicators;
pub mod normalize;
pub mod pipeline;
pub mod rate_limit;
pub mod window;

pub use cancel::CancelToken;
pub use config::{ConfigError, PipelineConfig};
pub use pipeline::{Dataset, IngestionPipeline, PipelineError, PipelineOptions, RunOutput};
