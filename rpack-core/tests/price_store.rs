//! CSV import through the Parquet cache into validated series.

use std::io::Write;
use std::sync::Arc;

use rpack_core::data::{
    read_price_csv, Lookback, ParquetCache, PriceSeriesStore, StoreOptions,
};
use rpack_core::metrics::MetricsEngine;
use rpack_core::PackError;

fn write_csv(dir: &std::path::Path, name: &str, rows: &[(String, String)]) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "Date,Open,Close,Volume").unwrap();
    for (date, close) in rows {
        writeln!(f, "{date},0,{close},100").unwrap();
    }
    path
}

fn dated(n: usize, close: impl Fn(usize) -> String) -> Vec<(String, String)> {
    let base = chrono::NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
    (0..n)
        .map(|i| {
            let date = base + chrono::Duration::days(i as i64);
            (date.format("%Y-%m-%d").to_string(), close(i))
        })
        .collect()
}

#[test]
fn import_cache_load_and_compute() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ParquetCache::new(dir.path().join("cache"));

    let csv = write_csv(
        dir.path(),
        "acme.csv",
        &dated(300, |i| format!("{:.2}", 100.0 + i as f64 * 0.1)),
    );
    let rows = read_price_csv(&csv).unwrap();
    cache.append("acme", &rows).unwrap();

    let store = PriceSeriesStore::new(Arc::new(cache.clone()), StoreOptions::default());
    let loaded = store.load_with_report("ACME", Lookback::Days(365)).unwrap();
    assert_eq!(loaded.series.len(), 300);
    assert_eq!(loaded.report.dropped_invalid, 0);

    let report = MetricsEngine::default().compute(&loaded.series, None).unwrap();
    assert_eq!(report.metrics.max_drawdown, 0.0);
    assert!(report.metrics.cumulative_return > 0.0);

    let meta = cache.get_meta("ACME").unwrap();
    assert_eq!(meta.bar_count, 300);
    assert_eq!(meta.data_hash.len(), 64);
}

#[test]
fn blank_closes_flow_through_to_validation() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ParquetCache::new(dir.path());

    // Every fifth close is blank: 20% invalid.
    let csv = write_csv(
        dir.path(),
        "bad.csv",
        &dated(50, |i| if i % 5 == 0 { String::new() } else { "10.0".into() }),
    );
    cache.append("BAD", &read_price_csv(&csv).unwrap()).unwrap();

    let store = PriceSeriesStore::new(Arc::new(cache), StoreOptions::default());
    assert!(matches!(
        store.load("BAD", Lookback::All),
        Err(PackError::CorruptData { .. })
    ));
}

#[test]
fn reimport_overrides_within_tolerance() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ParquetCache::new(dir.path());

    let first = write_csv(dir.path(), "a.csv", &dated(10, |_| "50.00".into()));
    cache.append("ACME", &read_price_csv(&first).unwrap()).unwrap();
    let again = write_csv(dir.path(), "b.csv", &dated(10, |_| "50.02".into()));
    cache.append("ACME", &read_price_csv(&again).unwrap()).unwrap();

    let store = PriceSeriesStore::new(Arc::new(cache), StoreOptions::default());
    let loaded = store.load_with_report("ACME", Lookback::All).unwrap();
    assert_eq!(loaded.series.len(), 10);
    assert_eq!(loaded.report.duplicates_collapsed, 10);
    assert_eq!(loaded.series.last_close(), 50.02);
}

#[test]
fn unknown_ticker_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let store = PriceSeriesStore::new(
        Arc::new(ParquetCache::new(dir.path())),
        StoreOptions::default(),
    );
    let err = store.load("nope", Lookback::All).unwrap_err();
    assert!(err.is_data_error());
    assert!(err.to_string().contains("NOPE"));
}
