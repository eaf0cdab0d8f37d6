//! Command-line front end for the analysis report.
//!
//! Usage:
//!   flow-report report --sort surge_score --top 20
//!   flow-report signals 600000 000001
//!   flow-report freshness
//!
//! The store comes from `--config`, else from `DATABASE_URL` / `DUCKDB_PATH` /
//! `SQLITE_DB_PATH`, and `--db` overrides the path.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flow_core::{format_trade_date, Config, SourceTable, StoreBackend, StoreConfig};
use flow_signals::{
    build_full_report, instrument_history, market_breadth, signals_for_codes, Order, SortKey,
};
use flow_store::{latest_common_trade_date, open_store, table_max_dates};
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "flow-report")]
#[command(about = "End-of-day fund flow reconciliation and signal report")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file, overriding the configured path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Treat `--db` as a DuckDB file instead of SQLite
    #[arg(long, global = true)]
    duckdb: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Full-market report
    Report {
        /// Numeric column to rank by
        #[arg(long)]
        sort: Option<SortKey>,
        /// Rank ascending instead of descending
        #[arg(long)]
        ascending: bool,
        /// Only print the first N rows
        #[arg(long)]
        top: Option<usize>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Signals for specific codes
    Signals {
        /// Codes, in any common notation
        #[arg(required = true)]
        codes: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Per-table latest dates and the safe analysis date
    Freshness,
    /// Up/down breadth on the latest trading day
    Breadth,
    /// Date-joined history for one instrument
    History {
        code: String,
        /// Only print the last N days
        #[arg(long, default_value = "20")]
        tail: usize,
    },
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config {
            store: StoreConfig::from_env().context("reading store settings from environment")?,
            ..Config::default()
        },
    };
    if let Some(db) = &cli.db {
        config.store.path = db.clone();
        config.store.backend = if cli.duckdb {
            StoreBackend::DuckDb
        } else {
            StoreBackend::Sqlite
        };
    }
    config.validate()?;
    Ok(config)
}

/// `RUST_LOG` when set, else info.
fn log_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let store = open_store(&config.store)
        .with_context(|| format!("opening {}", config.store.describe()))?;

    match cli.command {
        Commands::Report {
            sort,
            ascending,
            top,
            json,
        } => {
            let mut report = build_full_report(&store, &config);
            if let Some(key) = sort {
                let order = if ascending {
                    Order::Ascending
                } else {
                    Order::Descending
                };
                report.sort_by(key, order);
            }
            if let Some(n) = top {
                report.rows.truncate(n);
            }

            if json {
                println!("{}", report.to_json()?);
                return Ok(());
            }
            println!(
                "as of {}  (safe date {})",
                report.as_of.map(format_trade_date).unwrap_or_else(|| "-".into()),
                report.safe_date.map(format_trade_date).unwrap_or_else(|| "-".into()),
            );
            println!(
                "{:<8} {:<12} {:<24} {:>10} {:>8} {:>10} {:>10}",
                "code", "name", "signal", "close", "chg%", "fin/mv%", "surge"
            );
            for row in &report.rows {
                println!(
                    "{:<8} {:<12} {:<24} {:>10.2} {:>8.2} {:>10.3} {:>10.2}",
                    row.code, row.name, row.label, row.close, row.chg_pct, row.fin_mv_pct,
                    row.surge_score
                );
            }
        }
        Commands::Signals { codes, json } => {
            let rows = signals_for_codes(&store, &codes, &config);
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for row in &rows {
                    println!("{:<8} {:<24} {:>10.2}", row.code, row.label, row.surge_score);
                }
            }
        }
        Commands::Freshness => {
            for (table, date) in table_max_dates(&store) {
                println!(
                    "{:<16} {}",
                    table.table_name(),
                    date.map(format_trade_date).unwrap_or_else(|| "unavailable".into())
                );
            }
            let safe = latest_common_trade_date(&store, &SourceTable::ALL);
            println!(
                "{:<16} {}",
                "safe date",
                safe.map(format_trade_date).unwrap_or_else(|| "data not ready".into())
            );
        }
        Commands::Breadth => {
            let breadth = market_breadth(&store);
            println!(
                "{} up={} down={} total={} date={}",
                breadth.sentiment,
                breadth.up,
                breadth.down,
                breadth.total,
                breadth.trade_date.map(format_trade_date).unwrap_or_else(|| "-".into())
            );
        }
        Commands::History { code, tail } => {
            let Some(history) = instrument_history(&store, &code) else {
                info!(code = %code, "No history found");
                return Ok(());
            };
            println!(
                "{} {} [{} / {}]",
                history.instrument.code,
                history.instrument.name,
                history.sector,
                history.instrument.industry
            );
            let skip = history.rows.len().saturating_sub(tail);
            for row in &history.rows[skip..] {
                println!(
                    "{}  close={:.2}  fin_bal={:.0}  net_fin={:.0}  nb_hold={:.0}",
                    format_trade_date(row.trade_date),
                    row.close,
                    row.financing_balance,
                    row.net_financing_buy,
                    row.nb_hold_value
                );
            }
        }
    }
    Ok(())
}
