//! Per-ticker research pack build.
//!
//! Stages run in order, each feeding the next:
//!
//! ```text
//! load prices -> load benchmark -> compute metrics -> fetch news
//!   -> classify news -> assemble -> persist
//! ```
//!
//! Price loading, the mandatory metrics, and persisting are fatal: the run
//! stops with a `BuildError` naming the stage. The benchmark, beta, and the
//! whole news stage are optional: their failures become `BuildWarning`s on
//! the outcome and the pack is still written.
//!
//! All run state lives in a `BuildContext` created per call, so any number of
//! builds for distinct tickers can run at once on one builder.

use chrono::{DateTime, SubsecRound, Utc};
use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use rpack_core::data::{ParquetCache, PriceSeriesStore, PriceSource};
use rpack_core::domain::{
    normalize_ticker, ClassifiedHeadline, NewsSection, PriceSeries, ResearchPack,
};
use rpack_core::metrics::{BetaStatus, MetricsEngine};
use rpack_core::sentiment::{ingest_headlines, SentimentAggregator};
use rpack_core::PackError;

use crate::artifact_store::{ArtifactError, ArtifactStore};
use crate::classifier::{
    classify_with_retry, ClassifierError, HeadlineClassifier, HttpClassifier, RetryPolicy,
};
use crate::config::BuildConfig;
use crate::news::{HeadlineSource, JsonFileHeadlineSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildStage {
    LoadPrices,
    LoadBenchmark,
    ComputeMetrics,
    FetchNews,
    ClassifyNews,
    Assemble,
    Persist,
}

impl BuildStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStage::LoadPrices => "load_prices",
            BuildStage::LoadBenchmark => "load_benchmark",
            BuildStage::ComputeMetrics => "compute_metrics",
            BuildStage::FetchNews => "fetch_news",
            BuildStage::ClassifyNews => "classify_news",
            BuildStage::Assemble => "assemble",
            BuildStage::Persist => "persist",
        }
    }
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Underlying cause of a failed stage.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Pack(#[from] PackError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// A fatal failure: the ticker gets no new pack.
#[derive(Debug, Error)]
#[error("{ticker}: {stage} failed: {source}")]
pub struct BuildError {
    pub ticker: String,
    pub stage: BuildStage,
    #[source]
    pub source: StageError,
}

impl BuildError {
    fn new(ticker: &str, stage: BuildStage, source: impl Into<StageError>) -> Self {
        Self {
            ticker: ticker.to_string(),
            stage,
            source: source.into(),
        }
    }
}

/// Something that degraded the pack without stopping the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildWarning {
    pub stage: BuildStage,
    pub message: String,
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.message)
    }
}

#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub pack: ResearchPack,
    pub artifact_path: PathBuf,
    pub warnings: Vec<BuildWarning>,
}

/// State of a single run. Created by `build_at`, dropped when it returns.
#[derive(Debug)]
pub struct BuildContext {
    pub ticker: String,
    pub as_of: DateTime<Utc>,
    warnings: Vec<BuildWarning>,
}

impl BuildContext {
    /// Fails at `LoadPrices` when `ticker` is not a plain symbol, before
    /// anything is read or written.
    pub fn new(ticker: &str, as_of: DateTime<Utc>) -> Result<Self, BuildError> {
        let ticker = normalize_ticker(ticker)
            .map_err(|e| BuildError::new(ticker.trim(), BuildStage::LoadPrices, e))?;
        Ok(Self {
            ticker,
            as_of,
            warnings: Vec::new(),
        })
    }

    pub fn warn(&mut self, stage: BuildStage, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(ticker = %self.ticker, %stage, "{message}");
        self.warnings.push(BuildWarning { stage, message });
    }

    fn fail(&self, stage: BuildStage, source: impl Into<StageError>) -> BuildError {
        BuildError::new(&self.ticker, stage, source)
    }
}

/// Builds and persists research packs. Shareable across threads.
pub struct ResearchPackBuilder {
    config: BuildConfig,
    store: PriceSeriesStore,
    engine: MetricsEngine,
    artifacts: ArtifactStore,
    headlines: Option<Arc<dyn HeadlineSource>>,
    classifier: Option<Arc<dyn HeadlineClassifier>>,
}

impl ResearchPackBuilder {
    /// Builder with an explicit price source and no news stage.
    pub fn new(config: BuildConfig, prices: Arc<dyn PriceSource>) -> Self {
        let store = PriceSeriesStore::new(prices, config.store_options());
        let engine = MetricsEngine::new(config.min_beta_overlap);
        let artifacts = ArtifactStore::new(&config.out_dir);
        Self {
            config,
            store,
            engine,
            artifacts,
            headlines: None,
            classifier: None,
        }
    }

    /// Wire everything from configuration: the Parquet cache under
    /// `data_dir`, headline files under `news_dir`, and the HTTP classifier
    /// when `classifier.base_url` is set.
    pub fn from_config(config: BuildConfig) -> Result<Self, ClassifierError> {
        let cache = ParquetCache::new(&config.data_dir);
        let news_dir = config.news_dir.clone();
        let classifier = match &config.classifier.base_url {
            Some(url) => Some(HttpClassifier::new(
                url.clone(),
                Duration::from_secs(config.classifier.request_timeout_secs),
            )?),
            None => None,
        };

        let mut builder = Self::new(config, Arc::new(cache));
        if let Some(dir) = news_dir {
            builder = builder.with_headline_source(Arc::new(JsonFileHeadlineSource::new(dir)));
        }
        if let Some(classifier) = classifier {
            builder = builder.with_classifier(Arc::new(classifier));
        }
        Ok(builder)
    }

    pub fn with_headline_source(mut self, source: Arc<dyn HeadlineSource>) -> Self {
        self.headlines = Some(source);
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn HeadlineClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Build with `asOf` = now, truncated to whole seconds.
    pub fn build(&self, ticker: &str) -> Result<BuildOutcome, BuildError> {
        self.build_at(ticker, Utc::now().trunc_subsecs(0))
    }

    pub fn build_at(&self, ticker: &str, as_of: DateTime<Utc>) -> Result<BuildOutcome, BuildError> {
        let mut ctx = BuildContext::new(ticker, as_of)?;
        let span = tracing::info_span!("build", ticker = %ctx.ticker);
        let _enter = span.enter();

        tracing::info!(stage = %BuildStage::LoadPrices, "loading prices");
        let loaded = self
            .store
            .load_with_report(&ctx.ticker, self.config.lookback())
            .map_err(|e| ctx.fail(BuildStage::LoadPrices, e))?;
        let series = loaded.series;
        if loaded.report.dropped_invalid > 0 {
            ctx.warn(
                BuildStage::LoadPrices,
                format!(
                    "dropped {} of {} bars with invalid closes",
                    loaded.report.dropped_invalid, loaded.report.windowed_rows
                ),
            );
        }

        let benchmark = self.load_benchmark(&mut ctx, &series);

        tracing::info!(stage = %BuildStage::ComputeMetrics, bars = series.len(), "computing metrics");
        let report = self
            .engine
            .compute(&series, benchmark.as_ref())
            .map_err(|e| ctx.fail(BuildStage::ComputeMetrics, e))?;
        match &report.beta {
            BetaStatus::InsufficientOverlap { overlap, required } => ctx.warn(
                BuildStage::ComputeMetrics,
                format!("beta omitted: {overlap} overlapping dates, need {required}"),
            ),
            BetaStatus::Undefined { reason } => ctx.warn(
                BuildStage::ComputeMetrics,
                format!("beta omitted: {reason}"),
            ),
            BetaStatus::Computed | BetaStatus::NoBenchmark => {}
        }

        let news = self.news_stage(&mut ctx);

        tracing::info!(stage = %BuildStage::Assemble, "assembling pack");
        let price_series = match self.config.display_points {
            Some(n) => series.tail(n).to_vec(),
            None => series.bars().to_vec(),
        };
        let pack = ResearchPack::new(
            ctx.ticker.clone(),
            ctx.as_of,
            report.metrics,
            price_series,
            news,
        );

        tracing::info!(stage = %BuildStage::Persist, "writing artifact");
        let artifact_path = self
            .artifacts
            .write(&pack)
            .map_err(|e| ctx.fail(BuildStage::Persist, e))?;

        tracing::info!(
            path = %artifact_path.display(),
            warnings = ctx.warnings.len(),
            "build complete"
        );
        Ok(BuildOutcome {
            pack,
            artifact_path,
            warnings: ctx.warnings,
        })
    }

    fn load_benchmark(&self, ctx: &mut BuildContext, series: &PriceSeries) -> Option<PriceSeries> {
        let symbol = self.config.benchmark.trim().to_ascii_uppercase();
        if symbol == ctx.ticker {
            return Some(series.clone());
        }

        tracing::info!(stage = %BuildStage::LoadBenchmark, benchmark = %symbol, "loading benchmark");
        match self.store.load(&symbol, self.config.lookback()) {
            Ok(bench) => Some(bench),
            Err(e) => {
                ctx.warn(
                    BuildStage::LoadBenchmark,
                    format!("benchmark {symbol} unavailable, beta omitted: {e}"),
                );
                None
            }
        }
    }

    /// Fetch and classify headlines on a worker thread, waiting at most
    /// `news_timeout`. Every failure path returns `None` with a warning.
    fn news_stage(&self, ctx: &mut BuildContext) -> Option<NewsSection> {
        let source = match &self.headlines {
            Some(source) => Arc::clone(source),
            None => {
                tracing::debug!("no headline source configured");
                return None;
            }
        };
        tracing::info!(stage = %BuildStage::FetchNews, source = source.name(), "fetching news");

        let job = NewsJob {
            ticker: ctx.ticker.clone(),
            source,
            classifier: self.classifier.clone(),
            policy: RetryPolicy {
                max_retries: self.config.classifier_retries,
                base_delay: self.config.retry_base_delay(),
            },
            min_confidence: self.config.classifier.min_confidence,
        };
        let timeout = self.config.news_timeout();
        let deadline = Instant::now() + timeout;

        let (tx, rx) = mpsc::channel();
        let span = tracing::Span::current();
        let spawned = std::thread::Builder::new()
            .name(format!("news-{}", ctx.ticker))
            .spawn(move || {
                let _enter = span.enter();
                // The receiver is gone if the build already timed out.
                let _ = tx.send(job.run(deadline));
            });
        if let Err(e) = spawned {
            ctx.warn(BuildStage::FetchNews, format!("news worker failed to start: {e}"));
            return None;
        }

        match rx.recv_timeout(timeout) {
            Ok(Ok(output)) => {
                for rejected in output.rejected {
                    ctx.warn(BuildStage::FetchNews, rejected.to_string());
                }
                tracing::debug!(
                    headlines = output.section.headlines.len(),
                    unknown = output.section.sentiment_summary.unknown,
                    "news classified"
                );
                Some(output.section)
            }
            Ok(Err(warning)) => {
                ctx.warn(warning.stage, format!("news omitted: {}", warning.message));
                None
            }
            Err(RecvTimeoutError::Timeout) => {
                ctx.warn(
                    BuildStage::ClassifyNews,
                    format!("news omitted: timed out after {}s", timeout.as_secs_f64()),
                );
                None
            }
            Err(RecvTimeoutError::Disconnected) => {
                ctx.warn(BuildStage::FetchNews, "news omitted: worker exited without a result");
                None
            }
        }
    }
}

struct NewsOutput {
    section: NewsSection,
    rejected: Vec<PackError>,
}

/// Everything the news worker needs, owned so it can leave the build thread.
struct NewsJob {
    ticker: String,
    source: Arc<dyn HeadlineSource>,
    classifier: Option<Arc<dyn HeadlineClassifier>>,
    policy: RetryPolicy,
    min_confidence: Option<f64>,
}

impl NewsJob {
    fn run(self, deadline: Instant) -> Result<NewsOutput, BuildWarning> {
        let raw = self.source.fetch(&self.ticker).map_err(|e| BuildWarning {
            stage: BuildStage::FetchNews,
            message: e.to_string(),
        })?;
        let (headlines, rejected) = ingest_headlines(raw);

        let classified: Vec<ClassifiedHeadline> = match &self.classifier {
            // Without a classifier every headline is kept, unlabelled.
            None => headlines.into_iter().map(ClassifiedHeadline::unknown).collect(),
            Some(classifier) => {
                tracing::info!(
                    stage = %BuildStage::ClassifyNews,
                    classifier = classifier.name(),
                    headlines = headlines.len(),
                    "classifying headlines"
                );
                let results =
                    classify_with_retry(classifier.as_ref(), &headlines, self.policy, deadline)
                        .map_err(|e| BuildWarning {
                            stage: BuildStage::ClassifyNews,
                            message: e.to_string(),
                        })?;
                headlines
                    .into_iter()
                    .zip(&results)
                    .map(|(h, c)| ClassifiedHeadline::from_classification(h, c, self.min_confidence))
                    .collect()
            }
        };

        Ok(NewsOutput {
            section: SentimentAggregator::news_section(classified),
            rejected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, NaiveDate, TimeZone};
    use rpack_core::data::{MemoryPriceSource, RawBar};
    use rpack_core::domain::{Classification, Headline, RawHeadline, SentimentLabel};

    fn rows(n: usize, f: impl Fn(usize) -> f64) -> Vec<RawBar> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n)
            .map(|i| RawBar::new(base + ChronoDuration::days(i as i64), f(i)))
            .collect()
    }

    fn config(dir: &std::path::Path) -> BuildConfig {
        BuildConfig {
            out_dir: dir.to_path_buf(),
            lookback_days: 0,
            news_timeout_secs: 2,
            retry_base_delay_ms: 1,
            ..BuildConfig::default()
        }
    }

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    struct FixedNews(Vec<RawHeadline>);

    impl HeadlineSource for FixedNews {
        fn name(&self) -> &str {
            "fixed"
        }
        fn fetch(&self, _ticker: &str) -> rpack_core::PackResult<Vec<RawHeadline>> {
            Ok(self.0.clone())
        }
    }

    struct AlwaysPositive;

    impl HeadlineClassifier for AlwaysPositive {
        fn name(&self) -> &str {
            "positive"
        }
        fn classify(&self, h: &[Headline]) -> Result<Vec<Classification>, ClassifierError> {
            Ok(h
                .iter()
                .map(|_| Classification {
                    label: Some("POSITIVE".into()),
                    score: Some(0.9),
                })
                .collect())
        }
    }

    fn titled(t: &str) -> RawHeadline {
        RawHeadline {
            title: Some(t.into()),
            ..Default::default()
        }
    }

    #[test]
    fn missing_prices_fail_at_load_stage() {
        let dir = tempfile::tempdir().unwrap();
        let builder = ResearchPackBuilder::new(config(dir.path()), Arc::new(MemoryPriceSource::new()));
        let err = builder.build_at("acme", as_of()).unwrap_err();
        assert_eq!(err.ticker, "ACME");
        assert_eq!(err.stage, BuildStage::LoadPrices);
        assert!(matches!(
            err.source,
            StageError::Pack(PackError::DataUnavailable { .. })
        ));
        assert!(!builder.artifacts().path_for("ACME").unwrap().exists());
    }

    #[test]
    fn path_like_ticker_fails_before_any_io() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let prices = MemoryPriceSource::new().with("ACME", rows(30, |i| 10.0 + i as f64));
        let builder = ResearchPackBuilder::new(config(&out), Arc::new(prices));

        let err = builder.build_at("../acme", as_of()).unwrap_err();
        assert_eq!(err.stage, BuildStage::LoadPrices);
        assert!(matches!(
            err.source,
            StageError::Pack(PackError::InvalidTicker { .. })
        ));
        assert!(!out.exists());
        assert!(!dir.path().join("acme.json").exists());
    }

    #[test]
    fn two_bars_fail_at_metrics_stage() {
        let dir = tempfile::tempdir().unwrap();
        let prices = MemoryPriceSource::new().with("ACME", rows(2, |i| 10.0 + i as f64));
        let builder = ResearchPackBuilder::new(config(dir.path()), Arc::new(prices));
        let err = builder.build_at("ACME", as_of()).unwrap_err();
        assert_eq!(err.stage, BuildStage::ComputeMetrics);
    }

    #[test]
    fn missing_benchmark_is_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        let prices = MemoryPriceSource::new().with("ACME", rows(30, |i| 10.0 + i as f64));
        let builder = ResearchPackBuilder::new(config(dir.path()), Arc::new(prices));
        let outcome = builder.build_at("ACME", as_of()).unwrap();
        assert_eq!(outcome.pack.metrics().beta_vs_benchmark, None);
        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.stage == BuildStage::LoadBenchmark));
        assert!(outcome.artifact_path.exists());
    }

    #[test]
    fn benchmark_itself_has_beta_one() {
        let dir = tempfile::tempdir().unwrap();
        let prices =
            MemoryPriceSource::new().with("SPY", rows(40, |i| 400.0 + (i as f64).sin() * 4.0));
        let builder = ResearchPackBuilder::new(config(dir.path()), Arc::new(prices));
        let outcome = builder.build_at("spy", as_of()).unwrap();
        let beta = outcome.pack.metrics().beta_vs_benchmark.unwrap();
        assert!((beta - 1.0).abs() < 1e-12);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn news_without_classifier_is_all_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let prices = MemoryPriceSource::new().with("ACME", rows(10, |i| 10.0 + i as f64));
        let builder = ResearchPackBuilder::new(config(dir.path()), Arc::new(prices))
            .with_headline_source(Arc::new(FixedNews(vec![titled("a"), titled("b")])));
        let outcome = builder.build_at("ACME", as_of()).unwrap();
        let news = outcome.pack.news().unwrap();
        assert_eq!(news.sentiment_summary.unknown, 2);
        assert_eq!(news.sentiment_summary.total, 2);
    }

    #[test]
    fn untitled_headline_is_dropped_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let prices = MemoryPriceSource::new().with("ACME", rows(10, |i| 10.0 + i as f64));
        let builder = ResearchPackBuilder::new(config(dir.path()), Arc::new(prices))
            .with_headline_source(Arc::new(FixedNews(vec![
                titled("first"),
                RawHeadline::default(),
                titled("second"),
            ])))
            .with_classifier(Arc::new(AlwaysPositive));
        let outcome = builder.build_at("ACME", as_of()).unwrap();

        let news = outcome.pack.news().unwrap();
        assert_eq!(news.headlines.len(), 2);
        assert_eq!(news.headlines[1].headline.title(), "second");
        assert!(news
            .headlines
            .iter()
            .all(|h| h.sentiment == SentimentLabel::Positive));
        assert_eq!(news.sentiment_summary.ratios.positive, 1.0);
        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.message.contains("invalid headline")));
    }

    #[test]
    fn huge_lookback_keeps_full_history() {
        let dir = tempfile::tempdir().unwrap();
        let prices = MemoryPriceSource::new().with("ACME", rows(30, |i| 10.0 + i as f64));
        let mut cfg = config(dir.path());
        cfg.lookback_days = u32::MAX;
        cfg.validate().unwrap();
        let builder = ResearchPackBuilder::new(cfg, Arc::new(prices));
        let outcome = builder.build_at("ACME", as_of()).unwrap();
        assert_eq!(outcome.pack.price_series().len(), 30);
    }

    #[test]
    fn display_points_truncates_series_only() {
        let dir = tempfile::tempdir().unwrap();
        let prices = MemoryPriceSource::new().with("ACME", rows(50, |i| 10.0 + i as f64));
        let mut cfg = config(dir.path());
        cfg.display_points = Some(5);
        let builder = ResearchPackBuilder::new(cfg, Arc::new(prices));
        let outcome = builder.build_at("ACME", as_of()).unwrap();
        assert_eq!(outcome.pack.price_series().len(), 5);
        // Metrics still cover the full window.
        assert!((outcome.pack.metrics().cumulative_return - 4.9).abs() < 1e-12);
    }
}
