//! Error taxonomy shared by the price store, metrics engine, and sentiment layer.
//!
//! Fatal-vs-non-fatal is decided by the caller (the pack builder), not here:
//! the same `NumericDomain` error aborts a mandatory metric but only drops beta.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackError {
    #[error("no price history for '{ticker}' (run `rpack import --ticker {ticker} --csv <file>` first)")]
    DataUnavailable { ticker: String },

    #[error("invalid ticker '{ticker}': {reason}")]
    InvalidTicker { ticker: String, reason: String },

    #[error("insufficient history for {what}: need at least {required} points, have {available}")]
    InsufficientHistory {
        what: &'static str,
        required: usize,
        available: usize,
    },

    #[error("corrupt data for '{ticker}': {reason}")]
    CorruptData { ticker: String, reason: String },

    #[error("numeric domain error in {what}: {reason}")]
    NumericDomain { what: &'static str, reason: String },

    #[error("news unavailable: {0}")]
    NewsUnavailable(String),

    #[error("invalid headline: {0}")]
    InvalidHeadline(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("parquet I/O error: {0}")]
    Parquet(String),

    #[error("import error: {0}")]
    Import(String),
}

impl PackError {
    pub(crate) fn corrupt(ticker: &str, reason: impl Into<String>) -> Self {
        PackError::CorruptData {
            ticker: ticker.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn numeric(what: &'static str, reason: impl Into<String>) -> Self {
        PackError::NumericDomain {
            what,
            reason: reason.into(),
        }
    }

    /// Errors that mean "the source data is bad", as opposed to storage failures.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            PackError::DataUnavailable { .. }
                | PackError::InsufficientHistory { .. }
                | PackError::CorruptData { .. }
        )
    }
}

pub type PackResult<T> = Result<T, PackError>;
