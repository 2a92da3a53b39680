//! Collaborators at the edge of the pipeline: market and economic data
//! sources, the economic merge, and Parquet staging.

pub mod circuit_breaker;
pub mod economic;
pub mod merge;
pub mod provider;
pub mod stage;
pub mod synthetic;
pub mod yahoo;

pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use economic::{CsvEconomicSource, StaticEconomicSource};
pub use merge::{merge_economic, FillPolicy};
pub use provider::{BarRequest, DataError, EconomicDataSource, MarketDataSource};
pub use stage::{EnrichedStage, StageError, StageMeta};
pub use synthetic::SyntheticSource;
pub use yahoo::YahooSource;
