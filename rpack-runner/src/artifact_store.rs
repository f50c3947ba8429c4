//! On-disk research pack artifacts.
//!
//! Layout:
//! ```text
//! {root}/tickers/{TICKER}.json
//! {root}/watchlist.json
//! ```
//!
//! Every write goes to a uniquely named temp file in the destination
//! directory, is fsynced, then renamed over the target. Readers see the old
//! artifact or the new one, never a torn write. Distinct tickers share no
//! state, so parallel builds need no locking.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

use rpack_core::domain::{normalize_ticker, ResearchPack};

use crate::watchlist::WatchlistSummary;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("no artifact for {ticker}")]
    NotFound { ticker: String },

    #[error("invalid ticker {ticker:?}: {reason}")]
    InvalidTicker { ticker: String, reason: String },

    #[error("artifact for {ticker} is malformed: {reason}")]
    Malformed { ticker: String, reason: String },

    #[error("artifact I/O at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("artifact serialization: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ArtifactError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// The display treats both as "run the build first".
    pub fn is_missing_or_malformed(&self) -> bool {
        matches!(
            self,
            ArtifactError::NotFound { .. } | ArtifactError::Malformed { .. }
        )
    }
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn tickers_dir(&self) -> PathBuf {
        self.root.join("tickers")
    }

    /// `tickers/{TICKER}.json`. Tickers that are not plain symbols are
    /// rejected so no write lands outside the root.
    pub fn path_for(&self, ticker: &str) -> Result<PathBuf, ArtifactError> {
        let ticker = normalize_ticker(ticker).map_err(|e| ArtifactError::InvalidTicker {
            ticker: ticker.to_string(),
            reason: e.to_string(),
        })?;
        Ok(self.tickers_dir().join(format!("{ticker}.json")))
    }

    pub fn watchlist_path(&self) -> PathBuf {
        self.root.join("watchlist.json")
    }

    /// Publish a pack, replacing any earlier one for the same ticker.
    pub fn write(&self, pack: &ResearchPack) -> Result<PathBuf, ArtifactError> {
        let path = self.path_for(pack.ticker())?;
        write_json_atomic(&path, pack)?;
        tracing::debug!(ticker = pack.ticker(), path = %path.display(), "artifact written");
        Ok(path)
    }

    pub fn read(&self, ticker: &str) -> Result<ResearchPack, ArtifactError> {
        let path = self.path_for(ticker)?;
        read_json(&path, &ticker.trim().to_ascii_uppercase())
    }

    pub fn write_watchlist(&self, summary: &WatchlistSummary) -> Result<PathBuf, ArtifactError> {
        let path = self.watchlist_path();
        write_json_atomic(&path, summary)?;
        Ok(path)
    }

    pub fn read_watchlist(&self) -> Result<WatchlistSummary, ArtifactError> {
        read_json(&self.watchlist_path(), "watchlist")
    }

    /// Tickers with a published artifact, sorted.
    pub fn list(&self) -> Result<Vec<String>, ArtifactError> {
        let dir = self.tickers_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ArtifactError::io(&dir, e)),
        };

        let mut tickers = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| ArtifactError::io(&dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !stem.starts_with('.') {
                    tickers.push(stem.to_string());
                }
            }
        }
        tickers.sort();
        Ok(tickers)
    }
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| ArtifactError::io(dir, e))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("artifact");
    let tmp = dir.join(format!(
        ".{file_name}.{}.{}.tmp",
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let written = (|| {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    written.map_err(|e| {
        let _ = fs::remove_file(&tmp);
        ArtifactError::io(path, e)
    })
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T, ArtifactError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ArtifactError::NotFound {
                ticker: what.to_string(),
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
            return Err(ArtifactError::Malformed {
                ticker: what.to_string(),
                reason: e.to_string(),
            })
        }
        Err(e) => return Err(ArtifactError::io(path, e)),
    };
    serde_json::from_str(&content).map_err(|e| ArtifactError::Malformed {
        ticker: what.to_string(),
        reason: e.to_string(),
    })
}
