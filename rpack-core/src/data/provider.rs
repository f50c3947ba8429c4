//! Raw price rows and the `PriceSource` trait.
//!
//! A price source hands back rows exactly as they were ingested: unsorted
//! across partitions, possibly with NaN or non-positive closes and repeated
//! dates. Validation is the store's job, not the source's.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{PackError, PackResult};

/// One ingested close, before validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub date: NaiveDate,
    pub close: f64,
}

impl RawBar {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// Where a set of cached rows came from. Recorded in the cache sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    CsvImport,
}

/// Anything that can return the raw close history of a ticker.
///
/// Implementations return rows in ingestion order within a date: when a date
/// appears more than once, the later row is the later ingestion.
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fails with `DataUnavailable` when nothing is stored for the ticker.
    fn raw_bars(&self, ticker: &str) -> PackResult<Vec<RawBar>>;
}

/// In-memory price source, used for tests and for wiring pre-loaded data.
#[derive(Debug, Default)]
pub struct MemoryPriceSource {
    bars: RwLock<HashMap<String, Vec<RawBar>>>,
}

impl MemoryPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append rows for a ticker (later calls count as later ingestion).
    pub fn insert(&self, ticker: &str, rows: impl IntoIterator<Item = RawBar>) {
        let mut map = self.bars.write().unwrap_or_else(|e| e.into_inner());
        map.entry(ticker.to_ascii_uppercase())
            .or_default()
            .extend(rows);
    }

    pub fn with(self, ticker: &str, rows: impl IntoIterator<Item = RawBar>) -> Self {
        self.insert(ticker, rows);
        self
    }
}

impl PriceSource for MemoryPriceSource {
    fn name(&self) -> &str {
        "memory"
    }

    fn raw_bars(&self, ticker: &str) -> PackResult<Vec<RawBar>> {
        let map = self.bars.read().unwrap_or_else(|e| e.into_inner());
        match map.get(&ticker.to_ascii_uppercase()) {
            Some(rows) if !rows.is_empty() => Ok(rows.clone()),
            _ => Err(PackError::DataUnavailable {
                ticker: ticker.to_string(),
            }),
        }
    }
}
