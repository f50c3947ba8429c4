//! Price ingestion, caching, validation, and alignment.

pub mod align;
pub mod cache;
pub mod ingest;
pub mod provider;
pub mod store;

pub use align::{align_returns, AlignedReturns};
pub use cache::{CacheMeta, CacheStatus, ParquetCache};
pub use ingest::{parse_price_csv, read_price_csv};
pub use provider::{DataSource, MemoryPriceSource, PriceSource, RawBar};
pub use store::{
    validate_series, LoadedSeries, Lookback, PriceSeriesStore, StoreOptions, ValidationReport,
};
