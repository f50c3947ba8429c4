//! Cross-ticker summary written after a batch build.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rpack_core::domain::ResearchPack;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistRow {
    pub ticker: String,
    pub last_close: f64,
    pub cumulative_return: f64,
    pub max_drawdown: f64,
    pub annualized_volatility: f64,
    pub as_of: DateTime<Utc>,
}

impl From<&ResearchPack> for WatchlistRow {
    fn from(pack: &ResearchPack) -> Self {
        let m = pack.metrics();
        Self {
            ticker: pack.ticker().to_string(),
            last_close: m.last_close,
            cumulative_return: m.cumulative_return,
            max_drawdown: m.max_drawdown,
            annualized_volatility: m.annualized_volatility,
            as_of: pack.as_of(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistSummary {
    pub watchlist: Vec<WatchlistRow>,
    pub generated_at: DateTime<Utc>,
    /// Every requested ticker, built or not. Rows exist only for the ones
    /// that built.
    pub tickers: Vec<String>,
}

impl WatchlistSummary {
    pub fn from_packs<'a>(
        requested: &[String],
        packs: impl IntoIterator<Item = &'a ResearchPack>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            watchlist: packs.into_iter().map(WatchlistRow::from).collect(),
            generated_at,
            tickers: requested.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use rpack_core::domain::{Metrics, PriceBar};

    #[test]
    fn rows_follow_pack_order_and_serialize_camel_case() {
        let as_of = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let bars = vec![
            PriceBar::new(NaiveDate::from_ymd_opt(2024, 2, 28).unwrap(), 10.0).unwrap(),
            PriceBar::new(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(), 11.0).unwrap(),
        ];
        let pack = |t: &str| {
            ResearchPack::new(
                t,
                as_of,
                Metrics {
                    cumulative_return: 0.1,
                    max_drawdown: 0.0,
                    annualized_volatility: 0.3,
                    beta_vs_benchmark: Some(1.2),
                    last_close: 11.0,
                },
                bars.clone(),
                None,
            )
        };
        let packs = [pack("MSFT"), pack("AAPL")];
        let requested = vec!["MSFT".to_string(), "NVDA".to_string(), "AAPL".to_string()];
        let summary = WatchlistSummary::from_packs(&requested, &packs, as_of);
        assert_eq!(summary.tickers, vec!["MSFT", "NVDA", "AAPL"]);
        assert_eq!(summary.watchlist.len(), 2);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["watchlist"][0]["lastClose"], 11.0);
        assert_eq!(json["watchlist"][1]["ticker"], "AAPL");
        assert_eq!(json["generatedAt"], "2024-03-01T00:00:00Z");
    }
}
