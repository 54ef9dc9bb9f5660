//! Zero Screener - end-of-day screening over the local market store.
//!
//! Prints results as JSON on stdout; logs go to stderr.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use zero_common::config::Config;
use zero_common::logging::init_logging_with_exclusions;
use zero_common::Error;
use zero_screener::data::{LocalStorage, LocalStorageConfig};
use zero_screener::screener::{ScreenerConfig, ScreenerEngine, StrategyContext};

/// Adaptive A-share screener.
#[derive(Parser, Debug)]
#[command(name = "zero-screener")]
#[command(author = "theonlyhennygod")]
#[command(version)]
#[command(about = "Regime-adaptive end-of-day stock screener.", long_about = None)]
struct Cli {
    /// Override the SQLite database path
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Screen one evaluation date against its baseline date
    Run {
        /// Evaluation date T (YYYY-MM-DD or YYYYMMDD)
        #[arg(long, value_parser = parse_date_arg)]
        date: NaiveDate,

        /// Baseline date T-1 (YYYY-MM-DD or YYYYMMDD)
        #[arg(long, value_parser = parse_date_arg)]
        baseline_date: NaiveDate,

        /// Market regime (0 = bear, 1 = sideways, 2 = bull)
        #[arg(long)]
        regime: Option<i64>,

        /// Run the intraday structure check on the selection
        #[arg(long)]
        intraday: bool,
    },

    /// Screen several date pairs, continuing past failures
    Batch {
        /// Comma-separated T:T-1 pairs, e.g. 20251219:20251218,20251222:20251219
        #[arg(long)]
        pairs: String,

        /// Market regime (0 = bear, 1 = sideways, 2 = bull)
        #[arg(long)]
        regime: Option<i64>,

        /// Run the intraday structure check on each selection
        #[arg(long)]
        intraday: bool,
    },

    /// Show the parameter profile of a regime
    Profile {
        /// Market regime (0 = bear, 1 = sideways, 2 = bull)
        #[arg(long)]
        regime: Option<i64>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(exit_code(&e));
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load_with_env().map_err(|e| Error::Config(format!("{:#}", e)))?;
    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    tracing::info!("Zero Screener v{}", env!("CARGO_PKG_VERSION"));

    let mut screener_config = ScreenerConfig::from_global(&config);

    match cli.command {
        Commands::Run {
            date,
            baseline_date,
            regime,
            intraday,
        } => {
            apply_overrides(&mut screener_config, regime, intraday);
            let engine = build_engine(&config, cli.db, &screener_config).await?;
            let result = engine
                .run(date, baseline_date)
                .await
                .map_err(Error::from)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Batch {
            pairs,
            regime,
            intraday,
        } => {
            let pairs = parse_pairs(&pairs).map_err(|e| e.with_context("parsing --pairs"))?;
            apply_overrides(&mut screener_config, regime, intraday);
            let engine = build_engine(&config, cli.db, &screener_config).await?;
            let entries = engine.run_batch(&pairs).await;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Commands::Profile { regime } => {
            let id = regime.unwrap_or(screener_config.regime);
            let context = StrategyContext::from_id(id).map_err(Error::from)?;
            eprintln!("{}", context.describe());
            println!("{}", serde_json::to_string_pretty(context.profile())?);
        }
    }

    Ok(())
}

/// Exit code for a failed run; unknown errors exit with 1.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<Error>())
        .map_or(1, Error::exit_code)
}

fn apply_overrides(config: &mut ScreenerConfig, regime: Option<i64>, intraday: bool) {
    if let Some(r) = regime {
        config.regime = r;
    }
    if intraday {
        config.intraday_enabled = true;
    }
}

async fn build_engine(
    config: &Config,
    db_override: Option<String>,
    screener_config: &ScreenerConfig,
) -> Result<ScreenerEngine<LocalStorage>> {
    // validate regime before opening the store
    let resolved = screener_config.resolve().map_err(Error::from)?;
    tracing::info!("{}", resolved.context.describe());

    let storage_config = match db_override.or_else(|| config.screener_section().db_path) {
        Some(path) => LocalStorageConfig::with_path(path),
        None => LocalStorageConfig::default(),
    };
    let storage = LocalStorage::new(storage_config).context("Failed to open screener store")?;
    let stats = storage.get_stats().await?;
    tracing::info!(
        db_path = %storage.db_path().display(),
        baselines = stats.baseline_count,
        snapshots = stats.snapshot_count,
        bars = stats.bar_count,
        "Opened screener store"
    );

    Ok(ScreenerEngine::new(screener_config, Arc::new(storage)).map_err(Error::from)?)
}

fn parse_date(s: &str) -> zero_common::Result<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y%m%d"))
        .map_err(|_| Error::InvalidInput(format!("invalid date '{}'", s)))
}

fn parse_date_arg(s: &str) -> std::result::Result<NaiveDate, String> {
    parse_date(s).map_err(|e| e.to_string())
}

/// Parse `T:T-1` pairs separated by commas.
fn parse_pairs(s: &str) -> zero_common::Result<Vec<(NaiveDate, NaiveDate)>> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|pair| {
            let (target, baseline) = pair.split_once(':').ok_or_else(|| {
                Error::InvalidInput(format!("expected T:T-1 pair, got '{}'", pair))
            })?;
            Ok((parse_date(target)?, parse_date(baseline)?))
        })
        .collect()
}
