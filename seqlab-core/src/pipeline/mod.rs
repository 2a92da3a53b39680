//! Multi-symbol ingestion pipeline.
//!
//! Each symbol moves through its own state machine and is never allowed to
//! abort the batch. The only state shared between symbols is the rate
//! limiter's request ledger.

pub mod dataset;
pub mod error;
pub mod ingest;
pub mod report;

pub use crate::cancel::CancelToken;
pub use dataset::{Dataset, Segment};
pub use error::PipelineError;
pub use ingest::{IngestionPipeline, PipelineOptions, RunOutput};
pub use report::{RunReport, SkipReason, SymbolOutcome, SymbolState};
