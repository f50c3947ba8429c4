//! CSV import of daily closes.
//!
//! Expects a header row with a `date` column and a `close` column (matched
//! case-insensitively; `Close`, `close_price` and `price` are accepted too).
//! Other columns are ignored. Closes that do not parse are kept as NaN so the
//! store's drop-rate accounting sees them; dates that do not parse fail the
//! import.

use chrono::NaiveDate;
use std::io::Read;
use std::path::Path;

use super::provider::RawBar;
use crate::error::{PackError, PackResult};

const DATE_COLUMNS: &[&str] = &["date", "timestamp", "day"];
const CLOSE_COLUMNS: &[&str] = &["close", "close_price", "price"];

/// Read closes from a CSV file, in file order.
pub fn read_price_csv(path: &Path) -> PackResult<Vec<RawBar>> {
    let file = std::fs::File::open(path)
        .map_err(|e| PackError::Import(format!("open {}: {e}", path.display())))?;
    parse_price_csv(file)
}

/// Read closes from any CSV reader, in input order.
pub fn parse_price_csv<R: Read>(input: R) -> PackResult<Vec<RawBar>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(input);

    let headers = rdr
        .headers()
        .map_err(|e| PackError::Import(format!("header row: {e}")))?
        .clone();
    let find = |names: &[&str]| {
        headers
            .iter()
            .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
    };
    let date_idx =
        find(DATE_COLUMNS).ok_or_else(|| PackError::Import("no 'date' column".into()))?;
    let close_idx =
        find(CLOSE_COLUMNS).ok_or_else(|| PackError::Import("no 'close' column".into()))?;

    let mut bars = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| PackError::Import(format!("row {}: {e}", line + 2)))?;
        let raw_date = record.get(date_idx).unwrap_or_default();
        let date = parse_date(raw_date).ok_or_else(|| {
            PackError::Import(format!("row {}: unparseable date '{raw_date}'", line + 2))
        })?;
        let close = record
            .get(close_idx)
            .and_then(|c| c.parse::<f64>().ok())
            .unwrap_or(f64::NAN);
        bars.push(RawBar::new(date, close));
    }

    if bars.is_empty() {
        return Err(PackError::Import("CSV contains no rows".into()));
    }
    Ok(bars)
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time part.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dates_and_closes_ignoring_extra_columns() {
        let csv = "Date,Open,Close,Volume\n\
                   2024-01-02,1,100.5,10\n\
                   2024-01-03 00:00:00,1,101.25,10\n";
        let bars = parse_price_csv(csv.as_bytes()).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[1].close, 101.25);
    }

    #[test]
    fn unparseable_close_becomes_nan() {
        let csv = "date,close\n2024-01-02,\n2024-01-03,n/a\n2024-01-04,-3\n";
        let bars = parse_price_csv(csv.as_bytes()).unwrap();
        assert!(bars[0].close.is_nan());
        assert!(bars[1].close.is_nan());
        assert_eq!(bars[2].close, -3.0);
    }

    #[test]
    fn bad_date_fails_import() {
        let csv = "date,close\nyesterday,1.0\n";
        assert!(matches!(
            parse_price_csv(csv.as_bytes()),
            Err(PackError::Import(_))
        ));
    }

    #[test]
    fn missing_close_column_fails() {
        let csv = "date,open\n2024-01-02,1.0\n";
        assert!(parse_price_csv(csv.as_bytes()).is_err());
    }
}
