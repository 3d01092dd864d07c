//! Historify admin CLI
//!
//! Provides commands for:
//! - `overview`: List stored series
//! - `load-bars` / `load-ticks`: Dump a time range as JSON
//! - `delete-bars` / `delete-ticks`: Remove a series
//! - `rebuild-overview`: Recompute overviews from stored rows
//! - `drop`: Remove every namespace

use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset};
use clap::{Parser, Subcommand, ValueEnum};
use historify_store::{
    logging, DatabaseSettings, DuckDb, ErrorResponse, Exchange, Interval, MarketDataStore,
    StoreError,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;

/// Historify CLI
#[derive(Parser)]
#[command(name = "historify")]
#[command(about = "Bar and tick history stored in DuckDB")]
#[command(version)]
struct Cli {
    /// JSON settings file with `database.*` keys; defaults to HISTORIFY_DB_* variables
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List series overviews
    Overview {
        #[arg(value_enum)]
        kind: OverviewKind,
    },
    /// Load bars in an inclusive time range
    LoadBars {
        #[command(flatten)]
        series: BarSeries,
        #[command(flatten)]
        range: TimeRange,
    },
    /// Load ticks in an inclusive time range
    LoadTicks {
        #[command(flatten)]
        series: TickSeries,
        #[command(flatten)]
        range: TimeRange,
    },
    /// Delete a bar series and its overview
    DeleteBars {
        #[command(flatten)]
        series: BarSeries,
    },
    /// Delete a tick series and its overview
    DeleteTicks {
        #[command(flatten)]
        series: TickSeries,
    },
    /// Recompute every overview from stored rows
    RebuildOverview,
    /// Drop every namespace of the configured database
    Drop {
        /// Confirm the irreversible drop
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OverviewKind {
    Bars,
    Ticks,
}

#[derive(clap::Args)]
struct BarSeries {
    #[arg(long)]
    symbol: String,
    /// Exchange code, e.g. NASDAQ
    #[arg(long)]
    exchange: Exchange,
    /// Interval code: 1m, 1h, d, w
    #[arg(long)]
    interval: Interval,
}

#[derive(clap::Args)]
struct TickSeries {
    #[arg(long)]
    symbol: String,
    #[arg(long)]
    exchange: Exchange,
}

#[derive(clap::Args)]
struct TimeRange {
    /// RFC 3339 start, e.g. 2024-01-02T09:30:00-05:00
    #[arg(long)]
    start: DateTime<FixedOffset>,
    /// RFC 3339 end
    #[arg(long)]
    end: DateTime<FixedOffset>,
}

fn main() -> ExitCode {
    logging::init("historify_store=info");

    let cli = Cli::parse();

    match run(cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            let response = match e.downcast_ref::<StoreError>() {
                Some(store_err) => ErrorResponse::from(store_err),
                None => ErrorResponse {
                    code: "CLI_ERROR".to_string(),
                    message: format!("{e:#}"),
                },
            };
            println!("{}", json!(response));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<Value> {
    let settings = match &cli.config {
        Some(path) => DatabaseSettings::from_json_file(path)?,
        None => DatabaseSettings::from_env()?,
    };
    let store = DuckDb::new(&settings)?;
    let tz = store.timezone();

    let output = match cli.command {
        Commands::Overview { kind: OverviewKind::Bars } => json!(store.list_bar_overviews()?),
        Commands::Overview { kind: OverviewKind::Ticks } => json!(store.list_tick_overviews()?),
        Commands::LoadBars { series, range } => json!(store.load_bars(
            &series.symbol,
            series.exchange,
            series.interval,
            range.start.with_timezone(&tz),
            range.end.with_timezone(&tz),
        )?),
        Commands::LoadTicks { series, range } => json!(store.load_ticks(
            &series.symbol,
            series.exchange,
            range.start.with_timezone(&tz),
            range.end.with_timezone(&tz),
        )?),
        Commands::DeleteBars { series } => {
            let deleted = store.delete_bars(&series.symbol, series.exchange, series.interval)?;
            json!({ "deleted": deleted })
        }
        Commands::DeleteTicks { series } => {
            let deleted = store.delete_ticks(&series.symbol, series.exchange)?;
            json!({ "deleted": deleted })
        }
        Commands::RebuildOverview => {
            let (bars, ticks) = store.rebuild_overviews()?;
            json!({ "bar_series": bars, "tick_series": ticks })
        }
        Commands::Drop { yes } => {
            if !yes {
                bail!("refusing to drop {} without --yes", store.namespaces().all().join(", "));
            }
            let reports = store.drop_all()?;
            let failed = reports.iter().filter(|r| r.error.is_some()).count();
            if failed > 0 {
                tracing::warn!("{} namespace(s) could not be dropped", failed);
            }
            serde_json::to_value(&reports).context("failed to serialize drop reports")?
        }
    };

    Ok(output)
}
