//! Domain types: price history, headlines, and the research pack itself.

pub mod headline;
pub mod pack;
pub mod price;
pub mod ticker;

pub use headline::{Classification, ClassifiedHeadline, Headline, RawHeadline, SentimentLabel};
pub use pack::{
    Metrics, NewsSection, ResearchPack, SentimentCounts, SentimentRatios, SentimentSummary,
};
pub use price::{PriceBar, PriceSeries};
pub use ticker::normalize_ticker;
