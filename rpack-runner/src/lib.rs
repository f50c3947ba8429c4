//! Research pack runner: build orchestration on top of `rpack-core`.
//!
//! - Build configuration (TOML)
//! - Headline sources and the sentiment classifier boundary
//! - Per-ticker pack builder with non-fatal news and beta stages
//! - Atomic artifact store and watchlist summary
//! - Parallel batch builds and text rendering for `show`

pub mod artifact_store;
pub mod batch;
pub mod builder;
pub mod classifier;
pub mod config;
pub mod display;
pub mod news;
pub mod watchlist;

pub use artifact_store::{ArtifactError, ArtifactStore};
pub use batch::{BatchReport, BatchRunner};
pub use builder::{
    BuildContext, BuildError, BuildOutcome, BuildStage, BuildWarning, ResearchPackBuilder,
    StageError,
};
pub use classifier::{
    classify_with_retry, ClassifierError, HeadlineClassifier, HttpClassifier, RetryPolicy,
};
pub use config::{BuildConfig, ClassifierConfig, ConfigError};
pub use news::{HeadlineSource, JsonFileHeadlineSource};
pub use watchlist::{WatchlistRow, WatchlistSummary};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn builder_is_send_sync() {
        assert_send::<ResearchPackBuilder>();
        assert_sync::<ResearchPackBuilder>();
    }

    #[test]
    fn outcome_types_are_send() {
        assert_send::<BuildOutcome>();
        assert_send::<BuildError>();
        assert_send::<BatchReport>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<BuildConfig>();
        assert_sync::<BuildConfig>();
        assert_send::<ArtifactStore>();
        assert_sync::<ArtifactStore>();
    }
}
