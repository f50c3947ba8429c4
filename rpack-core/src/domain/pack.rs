//! The research pack artifact and its parts.
//!
//! Field names serialize in camelCase to match the artifact read by display
//! surfaces. Optional parts are `Option`s: `betaVsBenchmark` is written as
//! `null` when absent, `news` is omitted entirely.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::headline::ClassifiedHeadline;
use super::price::PriceBar;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub cumulative_return: f64,
    pub max_drawdown: f64,
    pub annualized_volatility: f64,
    pub beta_vs_benchmark: Option<f64>,
    pub last_close: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentCounts {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

impl SentimentCounts {
    pub fn labelled(&self) -> usize {
        self.positive + self.neutral + self.negative
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentRatios {
    pub positive: f64,
    pub neutral: f64,
    pub negative: f64,
}

/// Tally of classified headlines.
///
/// `total` covers every input headline, `unknown` included. Ratios are over
/// `positive + neutral + negative` only, and are all zero when that is zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentSummary {
    pub counts: SentimentCounts,
    #[serde(default)]
    pub unknown: usize,
    pub ratios: SentimentRatios,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsSection {
    pub headlines: Vec<ClassifiedHeadline>,
    pub sentiment_summary: SentimentSummary,
}

/// Immutable per-ticker snapshot. A later build supersedes it; nothing edits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchPack {
    ticker: String,
    as_of: DateTime<Utc>,
    metrics: Metrics,
    #[serde(deserialize_with = "chronological_bars")]
    price_series: Vec<PriceBar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    news: Option<NewsSection>,
}

impl ResearchPack {
    pub fn new(
        ticker: impl Into<String>,
        as_of: DateTime<Utc>,
        metrics: Metrics,
        price_series: Vec<PriceBar>,
        news: Option<NewsSection>,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            as_of,
            metrics,
            price_series,
            news,
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn as_of(&self) -> DateTime<Utc> {
        self.as_of
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn price_series(&self) -> &[PriceBar] {
        &self.price_series
    }

    pub fn news(&self) -> Option<&NewsSection> {
        self.news.as_ref()
    }
}

/// Each bar is checked by `PriceBar`'s own deserializer; this adds the
/// strictly-increasing date order.
fn chronological_bars<'de, D>(deserializer: D) -> Result<Vec<PriceBar>, D::Error>
where
    D: Deserializer<'de>,
{
    let bars = Vec::<PriceBar>::deserialize(deserializer)?;
    if let Some(w) = bars.windows(2).find(|w| w[1].date() <= w[0].date()) {
        return Err(serde::de::Error::custom(format!(
            "priceSeries dates not strictly increasing ({} followed by {})",
            w[0].date(),
            w[1].date()
        )));
    }
    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn pack(news: Option<NewsSection>) -> ResearchPack {
        let bars = vec![
            PriceBar::new(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), 100.0).unwrap(),
            PriceBar::new(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(), 101.0).unwrap(),
        ];
        ResearchPack::new(
            "ACME",
            Utc.with_ymd_and_hms(2024, 1, 4, 12, 0, 0).unwrap(),
            Metrics {
                cumulative_return: 0.01,
                max_drawdown: 0.0,
                annualized_volatility: 0.2,
                beta_vs_benchmark: None,
                last_close: 101.0,
            },
            bars,
            news,
        )
    }

    #[test]
    fn wire_shape_uses_camel_case_and_null_beta() {
        let json = serde_json::to_value(pack(None)).unwrap();
        assert_eq!(json["ticker"], "ACME");
        assert_eq!(json["asOf"], "2024-01-04T12:00:00Z");
        assert!(json["metrics"]["betaVsBenchmark"].is_null());
        assert_eq!(json["metrics"]["lastClose"], 101.0);
        assert_eq!(json["priceSeries"][0]["date"], "2024-01-02");
        assert_eq!(json["priceSeries"][1]["close"], 101.0);
        assert!(json.get("news").is_none());
    }

    #[test]
    fn news_section_serializes_summary() {
        let news = NewsSection {
            headlines: vec![],
            sentiment_summary: SentimentSummary::default(),
        };
        let json = serde_json::to_value(pack(Some(news))).unwrap();
        assert_eq!(json["news"]["sentimentSummary"]["total"], 0);
        assert_eq!(json["news"]["sentimentSummary"]["counts"]["positive"], 0);
    }

    #[test]
    fn invalid_price_series_is_rejected_on_read() {
        let good = serde_json::to_value(pack(None)).unwrap();

        let mut negative = good.clone();
        negative["priceSeries"][0]["close"] = serde_json::json!(-5.0);
        assert!(serde_json::from_value::<ResearchPack>(negative).is_err());

        let mut zero = good.clone();
        zero["priceSeries"][1]["close"] = serde_json::json!(0.0);
        assert!(serde_json::from_value::<ResearchPack>(zero).is_err());

        let mut reversed = good;
        let bars = reversed["priceSeries"].as_array_mut().unwrap();
        bars.reverse();
        let err = serde_json::from_value::<ResearchPack>(reversed).unwrap_err();
        assert!(err.to_string().contains("strictly increasing"));
    }

    #[test]
    fn pack_reads_back_from_json() {
        let original = pack(None);
        let json = serde_json::to_string(&original).unwrap();
        let back: ResearchPack = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
    }
}
