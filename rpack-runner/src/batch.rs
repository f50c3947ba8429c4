//! Parallel builds over a list of tickers.

use chrono::{SubsecRound, Utc};
use rayon::prelude::*;
use std::path::PathBuf;

use crate::artifact_store::ArtifactError;
use crate::builder::{BuildError, BuildOutcome, ResearchPackBuilder};
use crate::watchlist::WatchlistSummary;

/// Per-ticker results in input order, plus the watchlist write.
#[derive(Debug)]
pub struct BatchReport {
    pub outcomes: Vec<(String, Result<BuildOutcome, BuildError>)>,
    /// `None` when disabled or when no ticker built successfully.
    pub watchlist: Option<Result<PathBuf, ArtifactError>>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|(_, r)| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn successes(&self) -> impl Iterator<Item = &BuildOutcome> {
        self.outcomes.iter().filter_map(|(_, r)| r.as_ref().ok())
    }
}

pub struct BatchRunner<'a> {
    builder: &'a ResearchPackBuilder,
    parallel: bool,
    write_watchlist: bool,
}

impl<'a> BatchRunner<'a> {
    pub fn new(builder: &'a ResearchPackBuilder) -> Self {
        Self {
            builder,
            parallel: true,
            write_watchlist: true,
        }
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_watchlist(mut self, write: bool) -> Self {
        self.write_watchlist = write;
        self
    }

    /// Build every distinct ticker, then write the watchlist summary from
    /// the successes. One ticker failing never stops the others.
    pub fn run(&self, tickers: &[String]) -> BatchReport {
        let tickers = distinct_upper(tickers);
        let as_of = Utc::now().trunc_subsecs(0);
        tracing::info!(tickers = tickers.len(), parallel = self.parallel, "batch build");

        let build = |ticker: &String| (ticker.clone(), self.builder.build_at(ticker, as_of));
        let outcomes: Vec<_> = if self.parallel {
            tickers.par_iter().map(build).collect()
        } else {
            tickers.iter().map(build).collect()
        };

        for (ticker, result) in &outcomes {
            if let Err(e) = result {
                tracing::error!(%ticker, stage = %e.stage, error = %e.source, "build failed");
            }
        }

        let mut report = BatchReport {
            outcomes,
            watchlist: None,
        };
        if self.write_watchlist && report.succeeded() > 0 {
            let summary = WatchlistSummary::from_packs(
                &tickers,
                report.successes().map(|o| &o.pack),
                Utc::now(),
            );
            report.watchlist = Some(self.builder.artifacts().write_watchlist(&summary));
        }

        tracing::info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "batch complete"
        );
        report
    }
}

/// Upper-case and drop repeats, keeping first-seen order.
fn distinct_upper(tickers: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tickers
        .iter()
        .map(|t| t.trim().to_ascii_uppercase())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_keeps_first_occurrence() {
        let input: Vec<String> = ["msft", "AAPL", "MSFT", " ", "nvda"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(distinct_upper(&input), vec!["MSFT", "AAPL", "NVDA"]);
    }
}
