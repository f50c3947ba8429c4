//! Build configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. CLI flags are applied on top by the caller before
//! `validate()` runs.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use rpack_core::data::{Lookback, StoreOptions};
use rpack_core::domain::normalize_ticker;
use rpack_core::metrics::DEFAULT_MIN_BETA_OVERLAP;

pub const DEFAULT_BENCHMARK: &str = "SPY";
pub const DEFAULT_WATCHLIST: &[&str] = &["AAPL", "MSFT", "NVDA", "TSLA"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {field} {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Settings for the external sentiment classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Base URL of the classification service. No URL, no classification.
    pub base_url: Option<String>,
    pub request_timeout_secs: u64,
    /// Scores with magnitude below this are tagged `unknown`.
    pub min_confidence: Option<f64>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_secs: 10,
            min_confidence: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Parquet price cache root.
    pub data_dir: PathBuf,
    /// Artifact root; packs go under `tickers/`.
    pub out_dir: PathBuf,
    /// Directory of `{TICKER}.json` headline files. Unset means no news.
    pub news_dir: Option<PathBuf>,
    pub benchmark: String,
    pub watchlist: Vec<String>,
    /// Calendar days of history; 0 keeps everything.
    pub lookback_days: u32,
    pub max_invalid_fraction: f64,
    pub duplicate_tolerance: f64,
    pub min_beta_overlap: usize,
    /// Keep only the most recent N bars in the artifact's `priceSeries`.
    pub display_points: Option<usize>,
    pub classifier: ClassifierConfig,
    pub news_timeout_secs: u64,
    pub classifier_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/cache"),
            out_dir: PathBuf::from("data/packs"),
            news_dir: None,
            benchmark: DEFAULT_BENCHMARK.to_string(),
            watchlist: DEFAULT_WATCHLIST.iter().map(|s| s.to_string()).collect(),
            lookback_days: 365,
            max_invalid_fraction: rpack_core::data::store::DEFAULT_MAX_INVALID_FRACTION,
            duplicate_tolerance: rpack_core::data::store::DEFAULT_DUPLICATE_TOLERANCE,
            min_beta_overlap: DEFAULT_MIN_BETA_OVERLAP,
            display_points: None,
            classifier: ClassifierConfig::default(),
            news_timeout_secs: 15,
            classifier_retries: 2,
            retry_base_delay_ms: 250,
        }
    }
}

impl BuildConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: &str| {
            Err(ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            })
        };

        if let Err(e) = normalize_ticker(&self.benchmark) {
            return invalid("benchmark", &e.to_string());
        }
        if let Some(e) = self.watchlist.iter().find_map(|t| normalize_ticker(t).err()) {
            return invalid("watchlist", &e.to_string());
        }
        if !(0.0..1.0).contains(&self.max_invalid_fraction) {
            return invalid("max_invalid_fraction", "must be in [0, 1)");
        }
        if !(0.0..1.0).contains(&self.duplicate_tolerance) {
            return invalid("duplicate_tolerance", "must be in [0, 1)");
        }
        if self.min_beta_overlap < 3 {
            return invalid("min_beta_overlap", "must be at least 3");
        }
        if self.display_points.is_some_and(|n| n < 2) {
            return invalid("display_points", "must be at least 2");
        }
        if self.news_timeout_secs == 0 {
            return invalid("news_timeout_secs", "must be positive");
        }
        if self.classifier.request_timeout_secs == 0 {
            return invalid("classifier.request_timeout_secs", "must be positive");
        }
        if self
            .classifier
            .min_confidence
            .is_some_and(|c| !(0.0..=1.0).contains(&c))
        {
            return invalid("classifier.min_confidence", "must be in [0, 1]");
        }
        if self.classifier_retries > 10 {
            return invalid("classifier_retries", "must be at most 10");
        }
        Ok(())
    }

    pub fn lookback(&self) -> Lookback {
        match self.lookback_days {
            0 => Lookback::All,
            days => Lookback::Days(days),
        }
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            max_invalid_fraction: self.max_invalid_fraction,
            duplicate_tolerance: self.duplicate_tolerance,
        }
    }

    pub fn news_timeout(&self) -> Duration {
        Duration::from_secs(self.news_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}
