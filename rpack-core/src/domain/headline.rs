//! News headlines before and after sentiment classification.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PackError, PackResult};

/// Classifier output label. `Unknown` is a real label, not an absence: a
/// headline that could not be labelled still counts toward the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
    Unknown,
}

impl SentimentLabel {
    /// Map a classifier label onto the four known classes (case-insensitive).
    /// Anything unrecognised becomes `Unknown`.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "positive" | "pos" | "bullish" => SentimentLabel::Positive,
            "neutral" | "neu" => SentimentLabel::Neutral,
            "negative" | "neg" | "bearish" => SentimentLabel::Negative,
            _ => SentimentLabel::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Headline as delivered by a news source; nothing is guaranteed yet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawHeadline {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
}

/// A headline with a non-empty title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    publisher: Option<String>,
}

impl Headline {
    pub fn new(
        title: impl Into<String>,
        url: Option<String>,
        publisher: Option<String>,
    ) -> PackResult<Self> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return Err(PackError::InvalidHeadline(format!(
                "missing title (url: {})",
                url.as_deref().unwrap_or("-")
            )));
        }
        Ok(Self {
            title,
            url: non_blank(url),
            publisher: non_blank(publisher),
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn publisher(&self) -> Option<&str> {
        self.publisher.as_deref()
    }
}

impl TryFrom<RawHeadline> for Headline {
    type Error = PackError;

    fn try_from(raw: RawHeadline) -> PackResult<Self> {
        Headline::new(raw.title.unwrap_or_default(), raw.url, raw.publisher)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// What the external classifier says about one headline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
}

/// Headline tagged with a sentiment label, as stored in the pack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedHeadline {
    #[serde(flatten)]
    pub headline: Headline,
    pub sentiment: SentimentLabel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment_score: Option<f64>,
}

impl ClassifiedHeadline {
    pub fn unknown(headline: Headline) -> Self {
        Self {
            headline,
            sentiment: SentimentLabel::Unknown,
            sentiment_score: None,
        }
    }

    /// Apply one classifier result to a headline.
    ///
    /// A missing or unrecognised label, a non-finite or out-of-range score
    /// (outside [-1, 1]), or a score whose magnitude is below `min_confidence`
    /// all produce `Unknown`.
    pub fn from_classification(
        headline: Headline,
        classification: &Classification,
        min_confidence: Option<f64>,
    ) -> Self {
        let score = match classification.score {
            Some(s) if !s.is_finite() || !(-1.0..=1.0).contains(&s) => {
                return Self::unknown(headline);
            }
            other => other,
        };

        let mut label = classification
            .label
            .as_deref()
            .map(SentimentLabel::parse)
            .unwrap_or(SentimentLabel::Unknown);

        if let (Some(min), Some(s)) = (min_confidence, score) {
            if s.abs() < min {
                label = SentimentLabel::Unknown;
            }
        }

        Self {
            headline,
            sentiment: label,
            sentiment_score: score,
        }
    }
}
