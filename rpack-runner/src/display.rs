//! Plain-text rendering of a stored research pack.

use std::fmt::Write;

use rpack_core::domain::ResearchPack;

use crate::artifact_store::ArtifactStore;

/// `0.1234` -> `"12.34%"`.
pub fn pct(x: f64) -> String {
    format!("{:.2}%", x * 100.0)
}

/// Shown when a ticker has no readable artifact.
pub fn not_found_message(ticker: &str) -> String {
    let ticker = ticker.trim().to_ascii_uppercase();
    format!("No data found for {ticker}. Run: rpack build {ticker}")
}

pub fn render_pack(pack: &ResearchPack) -> String {
    let m = pack.metrics();
    let mut out = String::new();

    let _ = writeln!(out, "{}", pack.ticker());
    let _ = writeln!(out, "As of: {}", pack.as_of().format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "  Last close:            {:.2}", m.last_close);
    let _ = writeln!(out, "  Cumulative return:     {}", pct(m.cumulative_return));
    let _ = writeln!(out, "  Max drawdown:          {}", pct(m.max_drawdown));
    let _ = writeln!(out, "  Annualized volatility: {}", pct(m.annualized_volatility));
    match m.beta_vs_benchmark {
        Some(beta) => {
            let _ = writeln!(out, "  Beta vs benchmark:     {beta:.2}");
        }
        None => {
            let _ = writeln!(out, "  Beta vs benchmark:     n/a");
        }
    }

    if let Some(news) = pack.news() {
        let s = &news.sentiment_summary;
        let _ = writeln!(out);
        let _ = writeln!(out, "News & sentiment");
        let _ = write!(
            out,
            "  Positive: {} · Neutral: {} · Negative: {}",
            s.counts.positive, s.counts.neutral, s.counts.negative
        );
        if s.unknown > 0 {
            let _ = write!(out, " · Unknown: {}", s.unknown);
        }
        let _ = writeln!(out);
        for h in &news.headlines {
            let _ = write!(out, "  [{}] {}", h.sentiment, h.headline.title());
            if let Some(publisher) = h.headline.publisher() {
                let _ = write!(out, " ({publisher})");
            }
            let _ = writeln!(out);
            if let Some(url) = h.headline.url() {
                let _ = writeln!(out, "      {url}");
            }
        }
    }
    out
}

/// Read and render; a missing or unreadable artifact becomes the
/// "run the build" message rather than an error.
pub fn show(store: &ArtifactStore, ticker: &str) -> Result<String, String> {
    match store.read(ticker) {
        Ok(pack) => Ok(render_pack(&pack)),
        Err(e) if e.is_missing_or_malformed() => {
            tracing::debug!(error = %e, "artifact not readable");
            Err(not_found_message(ticker))
        }
        Err(e) => Err(format!("{}\n({e})", not_found_message(ticker))),
    }
}
