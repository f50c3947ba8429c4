//! Date alignment of two return series.
//!
//! Returns are computed on each series separately, keyed by the date of the
//! later bar, then intersected on date. A date missing from either side is
//! simply absent from the result: nothing is forward-filled.

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

use crate::domain::PriceSeries;

/// Pairs of same-day returns for an instrument and its benchmark.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignedReturns {
    pub dates: Vec<NaiveDate>,
    pub instrument: Vec<f64>,
    pub benchmark: Vec<f64>,
}

impl AlignedReturns {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Number of dates on which both series have a close.
pub fn shared_dates(instrument: &PriceSeries, benchmark: &PriceSeries) -> usize {
    let bench: HashSet<NaiveDate> = benchmark.bars().iter().map(|b| b.date()).collect();
    instrument
        .bars()
        .iter()
        .filter(|b| bench.contains(&b.date()))
        .count()
}

/// Simple daily returns `close_t / close_{t-1} - 1`, keyed by `t`.
pub fn dated_simple_returns(series: &PriceSeries) -> Vec<(NaiveDate, f64)> {
    series
        .bars()
        .windows(2)
        .map(|w| (w[1].date(), w[1].close() / w[0].close() - 1.0))
        .collect()
}

/// Intersect the two return series on date, in ascending date order.
pub fn align_returns(instrument: &PriceSeries, benchmark: &PriceSeries) -> AlignedReturns {
    let bench: HashMap<NaiveDate, f64> = dated_simple_returns(benchmark).into_iter().collect();

    let mut aligned = AlignedReturns::default();
    for (date, r) in dated_simple_returns(instrument) {
        if let Some(&b) = bench.get(&date) {
            aligned.dates.push(date);
            aligned.instrument.push(r);
            aligned.benchmark.push(b);
        }
    }
    aligned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PriceBar;

    fn series(ticker: &str, points: &[(u32, f64)]) -> PriceSeries {
        let bars = points
            .iter()
            .map(|&(day, c)| PriceBar::new(NaiveDate::from_ymd_opt(2024, 1, day).unwrap(), c).unwrap())
            .collect();
        PriceSeries::new(ticker, bars).unwrap()
    }

    #[test]
    fn intersects_on_return_dates() {
        let acme = series("ACME", &[(2, 100.0), (3, 110.0), (4, 99.0), (5, 99.0)]);
        // Benchmark missing the 4th.
        let spy = series("SPY", &[(2, 400.0), (3, 404.0), (5, 408.04)]);

        let aligned = align_returns(&acme, &spy);
        assert_eq!(aligned.len(), 2);
        assert_eq!(aligned.dates[0], NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert!((aligned.instrument[0] - 0.10).abs() < 1e-12);
        assert!((aligned.benchmark[0] - 0.01).abs() < 1e-12);
        // 5th: instrument 99 -> 99, benchmark 404 -> 408.04 (spanning the gap).
        assert_eq!(aligned.instrument[1], 0.0);
    }

    #[test]
    fn disjoint_series_align_to_nothing() {
        let a = series("A", &[(2, 1.0), (3, 2.0)]);
        let b = series("B", &[(10, 1.0), (11, 2.0)]);
        assert!(align_returns(&a, &b).is_empty());
        assert_eq!(shared_dates(&a, &b), 0);
    }

    #[test]
    fn shared_dates_counts_closes_not_returns() {
        let acme = series("ACME", &[(2, 100.0), (3, 110.0), (4, 99.0), (5, 99.0)]);
        let spy = series("SPY", &[(2, 400.0), (3, 404.0), (5, 408.04)]);
        assert_eq!(shared_dates(&acme, &spy), 3);
        assert_eq!(shared_dates(&acme, &acme), 4);
    }
}
