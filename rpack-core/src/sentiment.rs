//! Headline ingestion and sentiment aggregation.

use crate::domain::{
    ClassifiedHeadline, Headline, NewsSection, RawHeadline, SentimentCounts, SentimentLabel,
    SentimentRatios, SentimentSummary,
};
use crate::error::PackError;

/// Keep headlines with a usable title, in source order. Rejected ones come
/// back as `InvalidHeadline` errors so the caller can record them.
pub fn ingest_headlines(raw: Vec<RawHeadline>) -> (Vec<Headline>, Vec<PackError>) {
    let mut accepted = Vec::with_capacity(raw.len());
    let mut rejected = Vec::new();
    for (idx, item) in raw.into_iter().enumerate() {
        match Headline::try_from(item) {
            Ok(h) => accepted.push(h),
            Err(e) => {
                tracing::warn!(index = idx, error = %e, "headline dropped");
                rejected.push(e);
            }
        }
    }
    (accepted, rejected)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SentimentAggregator;

impl SentimentAggregator {
    pub fn aggregate(headlines: &[ClassifiedHeadline]) -> SentimentSummary {
        Self::summarize(headlines.iter().map(|h| h.sentiment))
    }

    /// Tally labels. Ratios divide by the labelled count only; `unknown` is
    /// still part of `total`. With nothing labelled every ratio is 0.
    pub fn summarize(labels: impl IntoIterator<Item = SentimentLabel>) -> SentimentSummary {
        let mut counts = SentimentCounts::default();
        let mut unknown = 0usize;
        for label in labels {
            match label {
                SentimentLabel::Positive => counts.positive += 1,
                SentimentLabel::Neutral => counts.neutral += 1,
                SentimentLabel::Negative => counts.negative += 1,
                SentimentLabel::Unknown => unknown += 1,
            }
        }

        let denom = counts.labelled();
        let ratios = if denom == 0 {
            SentimentRatios::default()
        } else {
            let d = denom as f64;
            SentimentRatios {
                positive: counts.positive as f64 / d,
                neutral: counts.neutral as f64 / d,
                negative: counts.negative as f64 / d,
            }
        };

        SentimentSummary {
            counts,
            unknown,
            ratios,
            total: denom + unknown,
        }
    }

    /// Build the pack's news section. Headline order is kept as given.
    pub fn news_section(headlines: Vec<ClassifiedHeadline>) -> NewsSection {
        let sentiment_summary = Self::aggregate(&headlines);
        NewsSection {
            headlines,
            sentiment_summary,
        }
    }
}
