//! Ticker symbols.
//!
//! A ticker names files under the cache and artifact roots, so only
//! `[A-Z0-9.^-]` is accepted after upper-casing.

use crate::error::{PackError, PackResult};

pub const MAX_TICKER_LEN: usize = 16;

/// Trim and upper-case `raw`, rejecting anything that is not a plain symbol.
pub fn normalize_ticker(raw: &str) -> PackResult<String> {
    let ticker = raw.trim().to_ascii_uppercase();
    let invalid = |reason: &str| PackError::InvalidTicker {
        ticker: raw.to_string(),
        reason: reason.to_string(),
    };

    if ticker.is_empty() {
        return Err(invalid("empty"));
    }
    if ticker.len() > MAX_TICKER_LEN {
        return Err(invalid("too long"));
    }
    if !ticker.bytes().all(is_ticker_byte) {
        return Err(invalid("only letters, digits, '.', '^' and '-' are allowed"));
    }
    if ticker.bytes().all(|b| b == b'.') {
        return Err(invalid("not a symbol"));
    }
    Ok(ticker)
}

fn is_ticker_byte(b: u8) -> bool {
    b.is_ascii_uppercase() || b.is_ascii_digit() || matches!(b, b'.' | b'^' | b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_symbols() {
        assert_eq!(normalize_ticker(" brk.b ").unwrap(), "BRK.B");
        assert_eq!(normalize_ticker("^GSPC").unwrap(), "^GSPC");
        assert_eq!(normalize_ticker("RDS-A").unwrap(), "RDS-A");
    }

    #[test]
    fn rejects_path_like_input() {
        for bad in ["../x", "a/b", "..", ".", "x\\y", "", "   ", "SP Y"] {
            assert!(
                matches!(normalize_ticker(bad), Err(PackError::InvalidTicker { .. })),
                "{bad:?} accepted"
            );
        }
    }

    #[test]
    fn rejects_overlong() {
        assert!(normalize_ticker(&"A".repeat(MAX_TICKER_LEN + 1)).is_err());
        assert!(normalize_ticker(&"A".repeat(MAX_TICKER_LEN)).is_ok());
    }
}
