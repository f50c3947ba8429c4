//! Validated daily close-price history.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{PackError, PackResult};

/// One daily close. The close is always finite and strictly positive,
/// including when read back from JSON.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedBar")]
pub struct PriceBar {
    date: NaiveDate,
    close: f64,
}

#[derive(Deserialize)]
struct UncheckedBar {
    date: NaiveDate,
    close: f64,
}

impl TryFrom<UncheckedBar> for PriceBar {
    type Error = PackError;

    fn try_from(bar: UncheckedBar) -> PackResult<Self> {
        PriceBar::new(bar.date, bar.close)
    }
}

impl PriceBar {
    pub fn new(date: NaiveDate, close: f64) -> PackResult<Self> {
        if !Self::is_valid_close(close) {
            return Err(PackError::CorruptData {
                ticker: String::new(),
                reason: format!("close {close} on {date} is not a positive finite number"),
            });
        }
        Ok(Self { date, close })
    }

    /// Non-positive, NaN, and infinite closes are rejected, never zeroed.
    pub fn is_valid_close(close: f64) -> bool {
        close.is_finite() && close > 0.0
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn close(&self) -> f64 {
        self.close
    }
}

/// Chronologically ordered close history for one instrument.
///
/// Dates are strictly increasing and there are at least two bars. There is no
/// way to mutate a series once built.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    ticker: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub const MIN_LEN: usize = 2;

    pub fn new(ticker: impl Into<String>, bars: Vec<PriceBar>) -> PackResult<Self> {
        let ticker = ticker.into();
        if bars.len() < Self::MIN_LEN {
            return Err(PackError::InsufficientHistory {
                what: "price series",
                required: Self::MIN_LEN,
                available: bars.len(),
            });
        }
        if let Some(w) = bars.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(PackError::corrupt(
                &ticker,
                format!(
                    "dates not strictly increasing ({} followed by {})",
                    w[0].date, w[1].date
                ),
            ));
        }
        Ok(Self { ticker, bars })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always false: a series holds at least two bars.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn first(&self) -> &PriceBar {
        &self.bars[0]
    }

    pub fn last(&self) -> &PriceBar {
        &self.bars[self.bars.len() - 1]
    }

    pub fn last_close(&self) -> f64 {
        self.last().close
    }

    /// The most recent `n` bars (all of them when `n` exceeds the length).
    pub fn tail(&self, n: usize) -> &[PriceBar] {
        let start = self.bars.len().saturating_sub(n);
        &self.bars[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn bar_rejects_non_positive_and_nan() {
        assert!(PriceBar::new(d(2), 0.0).is_err());
        assert!(PriceBar::new(d(2), -1.0).is_err());
        assert!(PriceBar::new(d(2), f64::NAN).is_err());
        assert!(PriceBar::new(d(2), f64::INFINITY).is_err());
        assert_eq!(PriceBar::new(d(2), 1.5).unwrap().close(), 1.5);
    }

    #[test]
    fn series_requires_two_bars() {
        let err = PriceSeries::new("ACME", vec![PriceBar::new(d(2), 10.0).unwrap()]).unwrap_err();
        assert!(matches!(
            err,
            PackError::InsufficientHistory { available: 1, .. }
        ));
    }

    #[test]
    fn series_rejects_unordered_dates() {
        let bars = vec![
            PriceBar::new(d(3), 10.0).unwrap(),
            PriceBar::new(d(2), 11.0).unwrap(),
        ];
        let err = PriceSeries::new("ACME", bars).unwrap_err();
        assert!(matches!(err, PackError::CorruptData { .. }));
    }

    #[test]
    fn deserialized_bar_is_validated() {
        let ok: PriceBar = serde_json::from_str(r#"{"date":"2024-01-02","close":1.5}"#).unwrap();
        assert_eq!(ok.close(), 1.5);
        for close in ["0.0", "-5.0"] {
            let json = format!(r#"{{"date":"2024-01-02","close":{close}}}"#);
            assert!(serde_json::from_str::<PriceBar>(&json).is_err());
        }
    }

    #[test]
    fn tail_truncates_from_the_front() {
        let bars = (2..=6)
            .map(|day| PriceBar::new(d(day), day as f64).unwrap())
            .collect();
        let series = PriceSeries::new("ACME", bars).unwrap();
        assert_eq!(series.tail(2).len(), 2);
        assert_eq!(series.tail(2)[0].date(), d(5));
        assert_eq!(series.tail(100).len(), 5);
        assert_eq!(series.last_close(), 6.0);
    }
}
