//! Headline sources.

use serde::Deserialize;
use std::path::PathBuf;

use rpack_core::domain::{normalize_ticker, RawHeadline};
use rpack_core::{PackError, PackResult};

/// Where a build gets its raw headlines from.
pub trait HeadlineSource: Send + Sync {
    fn name(&self) -> &str;

    /// Headlines for one ticker in source order. No headlines at all is
    /// `Ok(vec![])`; an unreachable source is `NewsUnavailable`.
    fn fetch(&self, ticker: &str) -> PackResult<Vec<RawHeadline>>;
}

/// Reads `{dir}/{TICKER}.json`: either a bare array of headlines or an
/// object with a `headlines` array.
#[derive(Debug, Clone)]
pub struct JsonFileHeadlineSource {
    dir: PathBuf,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HeadlineFile {
    Bare(Vec<RawHeadline>),
    Wrapped { headlines: Vec<RawHeadline> },
}

impl JsonFileHeadlineSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, ticker: &str) -> PackResult<PathBuf> {
        Ok(self.dir.join(format!("{}.json", normalize_ticker(ticker)?)))
    }
}

impl HeadlineSource for JsonFileHeadlineSource {
    fn name(&self) -> &str {
        "json_file"
    }

    fn fetch(&self, ticker: &str) -> PackResult<Vec<RawHeadline>> {
        let path = self.path_for(ticker)?;
        let content = std::fs::read_to_string(&path).map_err(|e| {
            PackError::NewsUnavailable(format!("read {}: {e}", path.display()))
        })?;
        let file: HeadlineFile = serde_json::from_str(&content).map_err(|e| {
            PackError::NewsUnavailable(format!("parse {}: {e}", path.display()))
        })?;
        Ok(match file {
            HeadlineFile::Bare(items) | HeadlineFile::Wrapped { headlines: items } => items,
        })
    }
}
