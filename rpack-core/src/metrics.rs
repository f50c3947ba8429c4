//! Price-derived risk statistics: pure functions, no I/O.
//!
//! Every output is finite. Any division by zero or non-finite intermediate is
//! a `NumericDomain` error rather than a NaN/inf leaking into the artifact.
//! Beta is the one optional metric: insufficient overlap or an undefined
//! regression leaves it absent without failing the rest.

use serde::{Deserialize, Serialize};

use crate::data::align::{align_returns, shared_dates, AlignedReturns};
use crate::domain::{Metrics, PriceSeries};
use crate::error::{PackError, PackResult};

/// Trading-day annualization constant.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Fewer shared instrument/benchmark dates than this and beta is not reported.
pub const DEFAULT_MIN_BETA_OVERLAP: usize = 20;

/// Why beta is (or is not) in the metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BetaStatus {
    Computed,
    NoBenchmark,
    InsufficientOverlap { overlap: usize, required: usize },
    Undefined { reason: String },
}

/// Metrics plus the beta diagnosis.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsReport {
    pub metrics: Metrics,
    pub beta: BetaStatus,
}

#[derive(Debug, Clone, Copy)]
pub struct MetricsEngine {
    min_beta_overlap: usize,
}

impl Default for MetricsEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_BETA_OVERLAP)
    }
}

impl MetricsEngine {
    pub fn new(min_beta_overlap: usize) -> Self {
        // Sample covariance needs two return pairs, i.e. three shared dates.
        Self {
            min_beta_overlap: min_beta_overlap.max(3),
        }
    }

    /// Compute every metric for `instrument`, with beta against `benchmark`
    /// when one is given.
    ///
    /// Cumulative return, drawdown, and volatility are mandatory: their
    /// failures are returned as errors. Beta failures only show up in
    /// `MetricsReport::beta`.
    pub fn compute(
        &self,
        instrument: &PriceSeries,
        benchmark: Option<&PriceSeries>,
    ) -> PackResult<MetricsReport> {
        let closes = instrument.closes();
        let cumulative_return = cumulative_return(&closes)?;
        let max_drawdown = max_drawdown(&closes)?;
        let annualized_volatility = annualized_volatility(&closes)?;

        let (beta_vs_benchmark, beta) = match benchmark {
            None => (None, BetaStatus::NoBenchmark),
            Some(bench) => {
                let overlap = shared_dates(instrument, bench);
                if overlap < self.min_beta_overlap {
                    (
                        None,
                        BetaStatus::InsufficientOverlap {
                            overlap,
                            required: self.min_beta_overlap,
                        },
                    )
                } else {
                    match beta(&align_returns(instrument, bench)) {
                        Ok(b) => (Some(b), BetaStatus::Computed),
                        Err(e) => (
                            None,
                            BetaStatus::Undefined {
                                reason: e.to_string(),
                            },
                        ),
                    }
                }
            }
        };

        Ok(MetricsReport {
            metrics: Metrics {
                cumulative_return,
                max_drawdown,
                annualized_volatility,
                beta_vs_benchmark,
                last_close: instrument.last_close(),
            },
            beta,
        })
    }
}

fn require(what: &'static str, required: usize, available: usize) -> PackResult<()> {
    if available < required {
        return Err(PackError::InsufficientHistory {
            what,
            required,
            available,
        });
    }
    Ok(())
}

fn finite(what: &'static str, value: f64) -> PackResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PackError::numeric(what, format!("non-finite result {value}")))
    }
}

fn ratio(what: &'static str, num: f64, den: f64) -> PackResult<f64> {
    if den == 0.0 {
        return Err(PackError::numeric(what, "division by zero"));
    }
    finite(what, num / den)
}

// ─── Individual metric functions ────────────────────────────────────

/// `last / first - 1` over the whole window.
pub fn cumulative_return(closes: &[f64]) -> PackResult<f64> {
    require("cumulative return", 2, closes.len())?;
    let first = closes[0];
    let last = closes[closes.len() - 1];
    Ok(ratio("cumulative return", last, first)? - 1.0)
}

/// Worst peak-to-trough decline as a fraction ≤ 0, in one forward pass.
///
/// A non-decreasing series yields exactly 0.
pub fn max_drawdown(closes: &[f64]) -> PackResult<f64> {
    require("max drawdown", 2, closes.len())?;
    let mut peak = closes[0];
    let mut max_dd = 0.0_f64;

    for &close in closes {
        if close > peak {
            peak = close;
        }
        let dd = ratio("max drawdown", close - peak, peak)?;
        if dd < max_dd {
            max_dd = dd;
        }
    }
    Ok(max_dd)
}

/// `ln(close_t / close_{t-1})` for each consecutive pair.
pub fn log_returns(closes: &[f64]) -> Vec<f64> {
    closes.windows(2).map(|w| (w[1] / w[0]).ln()).collect()
}

/// Sample standard deviation of daily log returns, scaled by √252.
///
/// Needs at least two returns, i.e. three closes.
pub fn annualized_volatility(closes: &[f64]) -> PackResult<f64> {
    let returns = log_returns(closes);
    require("annualized volatility", 2, returns.len())?;
    for &r in &returns {
        finite("annualized volatility", r)?;
    }
    let variance = sample_variance(&returns);
    finite(
        "annualized volatility",
        variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt(),
    )
}

/// `cov(instrument, benchmark) / var(benchmark)` over aligned return pairs.
///
/// Fails with `NumericDomain` when the benchmark returns have zero variance.
pub fn beta(aligned: &AlignedReturns) -> PackResult<f64> {
    require("beta", 2, aligned.len())?;
    let var_b = sample_variance(&aligned.benchmark);
    if !var_b.is_finite() || var_b.abs() < f64::EPSILON {
        return Err(PackError::numeric(
            "beta",
            "benchmark returns have zero variance",
        ));
    }
    let cov = sample_covariance(&aligned.instrument, &aligned.benchmark);
    ratio("beta", cov, var_b)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_variance(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0)
}

fn sample_covariance(a: &[f64], b: &[f64]) -> f64 {
    let ma = mean(a);
    let mb = mean(b);
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - ma) * (y - mb))
        .sum::<f64>()
        / (a.len() as f64 - 1.0)
}
