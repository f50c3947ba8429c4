//! Research pack core: domain types, price store, metrics, sentiment.
//!
//! - Domain types (price bars and series, headlines, the pack artifact)
//! - Parquet price cache, CSV import, and the validating series store
//! - Pure metric functions and the metrics engine
//! - Headline ingestion and sentiment aggregation

pub mod data;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod sentiment;

pub use error::{PackError, PackResult};
