//! Parquet price cache with Hive-style partitioning.
//!
//! Layout: `{cache_dir}/symbol={TICKER}/{year}.parquet`
//!
//! - Atomic writes (write to .tmp, rename into place)
//! - Integrity validation on load (schema check, row count > 0)
//! - Quarantine for corrupt files ({filename}.quarantined)
//! - Metadata sidecar per ticker (hash, date range, source)
//!
//! The cache stores rows as ingested. It does not drop bad closes or collapse
//! repeated dates; `PriceSeriesStore` does that on the way out.

use super::provider::{DataSource, PriceSource, RawBar};
use crate::domain::normalize_ticker;
use crate::error::{PackError, PackResult};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Metadata sidecar for a cached ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bar_count: usize,
    pub data_hash: String,
    pub source: DataSource,
    pub cached_at: chrono::NaiveDateTime,
}

/// Cache status for a single ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatus {
    pub symbol: String,
    pub cached: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub bar_count: Option<usize>,
}

/// The Parquet cache.
#[derive(Debug, Clone)]
pub struct ParquetCache {
    cache_dir: PathBuf,
}

impl ParquetCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Partition directory for a ticker. Rejects tickers that could escape
    /// the cache root.
    fn symbol_dir(&self, symbol: &str) -> PackResult<PathBuf> {
        let symbol = normalize_ticker(symbol)?;
        Ok(self.cache_dir.join(format!("symbol={symbol}")))
    }

    fn meta_path(&self, symbol: &str) -> PackResult<PathBuf> {
        Ok(self.symbol_dir(symbol)?.join("meta.json"))
    }

    /// Replace the cached rows for a ticker.
    ///
    /// Rows are grouped by year, one Parquet file per year, keeping the input
    /// order inside each year.
    pub fn write(&self, symbol: &str, bars: &[RawBar], source: DataSource) -> PackResult<()> {
        let symbol = normalize_ticker(symbol)?;
        let (first, last) = match (
            bars.iter().map(|b| b.date).min(),
            bars.iter().map(|b| b.date).max(),
        ) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(PackError::Cache("no bars to cache".into())),
        };

        let sym_dir = self.symbol_dir(&symbol)?;
        fs::create_dir_all(&sym_dir)
            .map_err(|e| PackError::Cache(format!("failed to create dir: {e}")))?;

        let mut by_year: BTreeMap<i32, Vec<&RawBar>> = BTreeMap::new();
        for bar in bars {
            by_year.entry(bar.date.year()).or_default().push(bar);
        }

        for (year, year_bars) in &by_year {
            let df = bars_to_dataframe(year_bars)?;
            let path = sym_dir.join(format!("{year}.parquet"));
            let tmp_path = path.with_extension("parquet.tmp");

            write_parquet(&df, &tmp_path)?;

            fs::rename(&tmp_path, &path).map_err(|e| {
                let _ = fs::remove_file(&tmp_path);
                PackError::Cache(format!("atomic rename failed: {e}"))
            })?;
        }

        let meta = CacheMeta {
            symbol: symbol.clone(),
            start_date: first,
            end_date: last,
            bar_count: bars.len(),
            data_hash: blake3::hash(
                &serde_json::to_vec(bars)
                    .map_err(|e| PackError::Cache(format!("hash serialization: {e}")))?,
            )
            .to_hex()
            .to_string(),
            source,
            cached_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| PackError::Cache(format!("meta serialization: {e}")))?;
        let meta_path = sym_dir.join("meta.json");
        let meta_tmp = meta_path.with_extension("json.tmp");
        fs::write(&meta_tmp, meta_json)
            .map_err(|e| PackError::Cache(format!("meta write: {e}")))?;
        fs::rename(&meta_tmp, &meta_path)
            .map_err(|e| PackError::Cache(format!("meta rename: {e}")))?;

        tracing::debug!(%symbol, rows = bars.len(), years = by_year.len(), "cache written");
        Ok(())
    }

    /// Append freshly imported rows after the cached ones and rewrite.
    ///
    /// Existing rows come first so that a re-imported date is the
    /// latest-ingested value for that date.
    pub fn append(&self, symbol: &str, new_bars: &[RawBar]) -> PackResult<usize> {
        let mut merged = match self.load(symbol) {
            Ok(existing) => existing,
            Err(PackError::DataUnavailable { .. }) => Vec::new(),
            Err(e) => return Err(e),
        };
        merged.extend_from_slice(new_bars);
        self.write(symbol, &merged, DataSource::CsvImport)?;
        Ok(merged.len())
    }

    /// Load all cached rows for a ticker, stably sorted by date.
    pub fn load(&self, symbol: &str) -> PackResult<Vec<RawBar>> {
        let sym_dir = self.symbol_dir(symbol)?;
        if !sym_dir.exists() {
            return Err(PackError::DataUnavailable {
                ticker: symbol.to_string(),
            });
        }

        let mut all_bars = Vec::new();

        let entries =
            fs::read_dir(&sym_dir).map_err(|e| PackError::Cache(format!("read dir: {e}")))?;

        for entry in entries {
            let entry = entry.map_err(|e| PackError::Cache(format!("dir entry: {e}")))?;
            let path = entry.path();

            if path.extension().and_then(|e| e.to_str()) != Some("parquet") {
                continue;
            }

            match load_and_validate_parquet(&path) {
                Ok(bars) => all_bars.extend(bars),
                Err(e) => {
                    let quarantine = path.with_extension("parquet.quarantined");
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "quarantining corrupt cache file"
                    );
                    let _ = fs::rename(&path, &quarantine);
                }
            }
        }

        if all_bars.is_empty() {
            return Err(PackError::DataUnavailable {
                ticker: symbol.to_string(),
            });
        }

        // Stable: rows sharing a date live in the same year file and keep
        // their ingestion order.
        all_bars.sort_by_key(|b| b.date);
        Ok(all_bars)
    }

    pub fn get_meta(&self, symbol: &str) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(symbol).ok()?).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Tickers with a partition directory, sorted.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = fs::read_dir(&self.cache_dir)
            .into_iter()
            .flatten()
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                name.strip_prefix("symbol=").map(str::to_string)
            })
            .collect();
        symbols.sort();
        symbols
    }

    pub fn status(&self, symbols: &[&str]) -> Vec<CacheStatus> {
        symbols
            .iter()
            .map(|sym| {
                let meta = self.get_meta(sym);
                CacheStatus {
                    symbol: sym.to_ascii_uppercase(),
                    cached: meta.is_some(),
                    start_date: meta.as_ref().map(|m| m.start_date),
                    end_date: meta.as_ref().map(|m| m.end_date),
                    bar_count: meta.as_ref().map(|m| m.bar_count),
                }
            })
            .collect()
    }
}

impl PriceSource for ParquetCache {
    fn name(&self) -> &str {
        "parquet_cache"
    }

    fn raw_bars(&self, ticker: &str) -> PackResult<Vec<RawBar>> {
        self.load(ticker)
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn epoch() -> NaiveDate {
    // NaiveDate's default is 1970-01-01.
    NaiveDate::default()
}

fn bars_to_dataframe(bars: &[&RawBar]) -> PackResult<DataFrame> {
    let dates: Vec<i32> = bars
        .iter()
        .map(|b| (b.date - epoch()).num_days() as i32)
        .collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| PackError::Parquet(format!("date cast: {e}")))?,
        Column::new("close".into(), closes),
    ])
    .map_err(|e| PackError::Parquet(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &DataFrame, path: &Path) -> PackResult<()> {
    let file =
        fs::File::create(path).map_err(|e| PackError::Parquet(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| PackError::Parquet(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate_parquet(path: &Path) -> PackResult<Vec<RawBar>> {
    let file = fs::File::open(path).map_err(|e| PackError::Parquet(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| PackError::Parquet(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(PackError::Parquet("empty parquet file".into()));
    }
    for col_name in ["date", "close"] {
        if df.column(col_name).is_err() {
            return Err(PackError::Parquet(format!("missing column '{col_name}'")));
        }
    }

    dataframe_to_bars(&df)
}

fn dataframe_to_bars(df: &DataFrame) -> PackResult<Vec<RawBar>> {
    let map_err = |e: PolarsError| PackError::Parquet(format!("column read: {e}"));

    let dates = df.column("date").map_err(map_err)?;
    let closes = df.column("close").map_err(map_err)?;

    let date_ca = dates
        .date()
        .map_err(|e| PackError::Parquet(format!("date column type: {e}")))?;
    let close_ca = closes
        .f64()
        .map_err(|e| PackError::Parquet(format!("close column type: {e}")))?;

    let n = df.height();
    let mut bars = Vec::with_capacity(n);
    for i in 0..n {
        let date_days = date_ca
            .get(i)
            .ok_or_else(|| PackError::Parquet(format!("null date at row {i}")))?;
        bars.push(RawBar {
            date: epoch() + chrono::Duration::days(date_days as i64),
            // A null close stays visible to validation as NaN.
            close: close_ca.get(i).unwrap_or(f64::NAN),
        });
    }

    Ok(bars)
}
