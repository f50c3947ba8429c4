//! rpack CLI: import prices, build research packs, show them.
//!
//! Commands:
//! - `import` - read a CSV of daily closes into the Parquet cache
//! - `build` - build packs for tickers (default: the configured watchlist)
//! - `show` - render a stored pack
//! - `cache status` - report cached tickers and date ranges

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rpack_core::data::{read_price_csv, ParquetCache};
use rpack_core::domain::normalize_ticker;
use rpack_runner::display;
use rpack_runner::{ArtifactStore, BatchRunner, BuildConfig, ResearchPackBuilder};

const DEFAULT_CONFIG_FILE: &str = "rpack.toml";

#[derive(Parser)]
#[command(name = "rpack", about = "Research pack builder: price metrics and news sentiment")]
struct Cli {
    /// Build config (TOML). Defaults to ./rpack.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset (e.g. info, debug, rpack_runner=trace).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import daily closes from a CSV file into the price cache.
    Import {
        #[arg(long)]
        ticker: String,

        /// CSV with `date` and `close` columns.
        #[arg(long)]
        csv: PathBuf,

        /// Price cache directory (overrides config).
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Build research packs.
    Build {
        /// Tickers to build. Defaults to the configured watchlist.
        tickers: Vec<String>,

        #[arg(long)]
        data_dir: Option<PathBuf>,

        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Directory of `{TICKER}.json` headline files.
        #[arg(long)]
        news_dir: Option<PathBuf>,

        /// Sentiment classifier base URL.
        #[arg(long)]
        classifier_url: Option<String>,

        #[arg(long)]
        benchmark: Option<String>,

        /// Calendar days of history (0 = all).
        #[arg(long)]
        lookback_days: Option<u32>,

        /// Keep only the last N bars in the artifact's price series.
        #[arg(long)]
        display_points: Option<usize>,

        /// Build one ticker at a time.
        #[arg(long, default_value_t = false)]
        sequential: bool,
    },
    /// Show a stored research pack.
    Show {
        ticker: String,

        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Print the raw artifact JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Price cache management.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show cached tickers, date ranges, and bar counts.
    Status {
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Import {
            ticker,
            csv,
            data_dir,
        } => run_import(&ticker, &csv, data_dir.unwrap_or(config.data_dir)),
        Commands::Build {
            tickers,
            data_dir,
            out_dir,
            news_dir,
            classifier_url,
            benchmark,
            lookback_days,
            display_points,
            sequential,
        } => {
            let mut config = config;
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            if let Some(dir) = out_dir {
                config.out_dir = dir;
            }
            if news_dir.is_some() {
                config.news_dir = news_dir;
            }
            if classifier_url.is_some() {
                config.classifier.base_url = classifier_url;
            }
            if let Some(b) = benchmark {
                config.benchmark = b;
            }
            if let Some(days) = lookback_days {
                config.lookback_days = days;
            }
            if display_points.is_some() {
                config.display_points = display_points;
            }
            config.validate()?;
            run_build(config, tickers, sequential)
        }
        Commands::Show {
            ticker,
            out_dir,
            json,
        } => run_show(&ticker, out_dir.unwrap_or(config.out_dir), json),
        Commands::Cache { action } => match action {
            CacheAction::Status { data_dir } => {
                run_cache_status(&data_dir.unwrap_or(config.data_dir))
            }
        },
    }
}

/// `RUST_LOG` wins over `--log-level`. Logs go to stderr so `show` output
/// stays pipeable.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> Result<BuildConfig> {
    match path {
        Some(path) => BuildConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            Ok(BuildConfig::from_file(Path::new(DEFAULT_CONFIG_FILE))?)
        }
        None => Ok(BuildConfig::default()),
    }
}

fn run_import(ticker: &str, csv: &Path, data_dir: PathBuf) -> Result<()> {
    let ticker = normalize_ticker(ticker)?;
    let rows = read_price_csv(csv)?;
    let cache = ParquetCache::new(data_dir);
    let total = cache.append(&ticker, &rows)?;
    tracing::info!(%ticker, imported = rows.len(), total, "import complete");
    println!(
        "Imported {} rows for {ticker} ({total} cached) into {}",
        rows.len(),
        cache.cache_dir().display()
    );
    Ok(())
}

fn run_build(config: BuildConfig, tickers: Vec<String>, sequential: bool) -> Result<()> {
    let explicit = !tickers.is_empty();
    let tickers = if explicit {
        tickers
    } else {
        config.watchlist.clone()
    };
    if tickers.is_empty() {
        bail!("no tickers given and the configured watchlist is empty");
    }

    let builder = ResearchPackBuilder::from_config(config)?;
    let report = BatchRunner::new(&builder)
        .with_parallelism(!sequential)
        .with_watchlist(!explicit)
        .run(&tickers);

    for (ticker, result) in &report.outcomes {
        match result {
            Ok(outcome) => {
                println!("{ticker}: wrote {}", outcome.artifact_path.display());
                for warning in &outcome.warnings {
                    println!("  warning {warning}");
                }
            }
            Err(e) => eprintln!("{ticker}: FAILED at {}: {}", e.stage, e.source),
        }
    }
    match &report.watchlist {
        Some(Ok(path)) => println!("watchlist: {}", path.display()),
        Some(Err(e)) => eprintln!("watchlist not written: {e}"),
        None => {}
    }
    println!(
        "{} succeeded, {} failed",
        report.succeeded(),
        report.failed()
    );

    if report.failed() > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn run_show(ticker: &str, out_dir: PathBuf, json: bool) -> Result<()> {
    let store = ArtifactStore::new(out_dir);

    if json {
        return match store.read(ticker) {
            Ok(pack) => {
                println!("{}", serde_json::to_string_pretty(&pack)?);
                Ok(())
            }
            Err(_) => {
                eprintln!("{}", display::not_found_message(ticker));
                std::process::exit(1);
            }
        };
    }

    match display::show(&store, ticker) {
        Ok(text) => {
            print!("{text}");
            Ok(())
        }
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(1);
        }
    }
}

fn run_cache_status(data_dir: &Path) -> Result<()> {
    if !data_dir.exists() {
        println!("Cache directory does not exist: {}", data_dir.display());
        return Ok(());
    }

    let cache = ParquetCache::new(data_dir);
    let symbols = cache.symbols();
    let refs: Vec<&str> = symbols.iter().map(String::as_str).collect();
    let statuses = cache.status(&refs);

    println!("{:<10} {:<26} {:>8}", "SYMBOL", "DATE RANGE", "BARS");
    println!("{}", "-".repeat(46));
    for s in &statuses {
        let range = match (s.start_date, s.end_date) {
            (Some(start), Some(end)) => format!("{start} to {end}"),
            _ => "(no meta)".to_string(),
        };
        let bars = s
            .bar_count
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".into());
        println!("{:<10} {:<26} {:>8}", s.symbol, range, bars);
    }
    println!("{}", "-".repeat(46));
    println!("{} symbols in {}", statuses.len(), data_dir.display());
    Ok(())
}
