//! `PriceSeriesStore`: raw rows in, validated `PriceSeries` out.
//!
//! Pipeline per load:
//! 1. fetch raw rows from the source (`DataUnavailable` if none)
//! 2. stable sort by date, apply the lookback window
//! 3. drop non-positive / non-finite closes; `CorruptData` if the drop rate
//!    exceeds `max_invalid_fraction`
//! 4. collapse repeated dates to the latest-ingested close; `CorruptData` if
//!    the duplicates disagree beyond `duplicate_tolerance`
//! 5. `InsufficientHistory` if fewer than two bars remain
//!
//! Nothing is retried: bad source data stays bad.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::provider::{PriceSource, RawBar};
use crate::domain::{normalize_ticker, PriceBar, PriceSeries};
use crate::error::{PackError, PackResult};

pub const DEFAULT_MAX_INVALID_FRACTION: f64 = 0.10;
pub const DEFAULT_DUPLICATE_TOLERANCE: f64 = 0.001;

/// How much history to keep, counted back from the latest stored date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lookback {
    All,
    /// Calendar days ending at (and including) the latest stored date.
    Days(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoreOptions {
    /// Largest tolerated share of invalid closes in the window (inclusive).
    pub max_invalid_fraction: f64,
    /// Largest tolerated relative disagreement between closes on one date.
    pub duplicate_tolerance: f64,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_invalid_fraction: DEFAULT_MAX_INVALID_FRACTION,
            duplicate_tolerance: DEFAULT_DUPLICATE_TOLERANCE,
        }
    }
}

/// What validation did to the raw rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub raw_rows: usize,
    pub windowed_rows: usize,
    pub dropped_invalid: usize,
    pub duplicates_collapsed: usize,
}

#[derive(Debug, Clone)]
pub struct LoadedSeries {
    pub series: PriceSeries,
    pub report: ValidationReport,
}

#[derive(Clone)]
pub struct PriceSeriesStore {
    source: Arc<dyn PriceSource>,
    options: StoreOptions,
}

impl PriceSeriesStore {
    pub fn new(source: Arc<dyn PriceSource>, options: StoreOptions) -> Self {
        Self { source, options }
    }

    pub fn load(&self, ticker: &str, lookback: Lookback) -> PackResult<PriceSeries> {
        self.load_with_report(ticker, lookback).map(|l| l.series)
    }

    pub fn load_with_report(&self, ticker: &str, lookback: Lookback) -> PackResult<LoadedSeries> {
        let ticker = normalize_ticker(ticker)?;
        let raw = self.source.raw_bars(&ticker)?;
        validate_series(&ticker, raw, lookback, &self.options)
    }
}

/// Turn raw rows into a validated series. Pure; exposed for testing and for
/// callers that already hold rows in memory.
pub fn validate_series(
    ticker: &str,
    mut raw: Vec<RawBar>,
    lookback: Lookback,
    options: &StoreOptions,
) -> PackResult<LoadedSeries> {
    let mut report = ValidationReport {
        raw_rows: raw.len(),
        ..Default::default()
    };
    if raw.is_empty() {
        return Err(PackError::DataUnavailable {
            ticker: ticker.to_string(),
        });
    }

    raw.sort_by_key(|b| b.date);

    if let (Lookback::Days(days), Some(latest)) = (lookback, raw.last().map(|b| b.date)) {
        // A window reaching past the calendar's start keeps everything.
        if let Some(cutoff) = latest.checked_sub_signed(Duration::days(i64::from(days))) {
            raw.retain(|b| b.date > cutoff);
        }
    }
    report.windowed_rows = raw.len();

    let before = raw.len();
    raw.retain(|b| PriceBar::is_valid_close(b.close));
    report.dropped_invalid = before - raw.len();

    if before > 0 {
        let drop_rate = report.dropped_invalid as f64 / before as f64;
        if drop_rate > options.max_invalid_fraction {
            return Err(PackError::corrupt(
                ticker,
                format!(
                    "{} of {} bars have invalid closes ({:.1}% > {:.1}% threshold)",
                    report.dropped_invalid,
                    before,
                    drop_rate * 100.0,
                    options.max_invalid_fraction * 100.0
                ),
            ));
        }
    }

    let mut bars: Vec<PriceBar> = Vec::with_capacity(raw.len());
    let mut group_start = 0;
    while group_start < raw.len() {
        let date = raw[group_start].date;
        let mut group_end = group_start + 1;
        while group_end < raw.len() && raw[group_end].date == date {
            group_end += 1;
        }

        let group = &raw[group_start..group_end];
        let kept = group[group.len() - 1].close;
        for other in &group[..group.len() - 1] {
            let diff = (other.close - kept).abs() / other.close.max(kept);
            if diff > options.duplicate_tolerance {
                return Err(PackError::corrupt(
                    ticker,
                    format!(
                        "duplicate closes on {date} disagree ({} vs {}, {:.3}% apart)",
                        other.close,
                        kept,
                        diff * 100.0
                    ),
                ));
            }
        }
        report.duplicates_collapsed += group.len() - 1;
        bars.push(PriceBar::new(date, kept)?);
        group_start = group_end;
    }

    if bars.len() < PriceSeries::MIN_LEN {
        return Err(PackError::InsufficientHistory {
            what: "price series",
            required: PriceSeries::MIN_LEN,
            available: bars.len(),
        });
    }

    if report.dropped_invalid > 0 || report.duplicates_collapsed > 0 {
        tracing::debug!(
            ticker,
            dropped = report.dropped_invalid,
            collapsed = report.duplicates_collapsed,
            "price rows cleaned"
        );
    }

    Ok(LoadedSeries {
        series: PriceSeries::new(ticker, bars)?,
        report,
    })
}
