//! glycotrack batch job
//!
//! Recomputes stored daily metrics for every patient once and exits.
//! Useful from cron when the API server runs with the scheduler disabled.

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::Parser;
use glycotrack::config::Config;
use glycotrack::scheduler::{previous_day, recompute_day};
use glycotrack::store::SqliteStore;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "glycotrack")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Recompute daily glucose metrics for all patients")]
struct Args {
    /// Day to recompute (YYYY-MM-DD, default: yesterday UTC)
    #[arg(short, long)]
    date: Option<NaiveDate>,

    /// Config file (default: search the standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    glycotrack::logging::init_tracing(&config.logging).context("failed to open log file")?;

    tracing::info!("glycotrack v{}", env!("CARGO_PKG_VERSION"));

    let db_path = config.store.resolved_db_path();
    tracing::info!("Database: {:?}", db_path);
    let store = SqliteStore::open(&db_path)?;
    if config.store.seed_foods {
        store.seed_sample_foods()?;
    }

    let date = args.date.unwrap_or_else(|| previous_day(Utc::now()));
    let summary = recompute_day(&store, date);

    println!("{}", serde_json::to_string_pretty(&summary)?);

    if !summary.errors.is_empty() {
        anyhow::bail!("{} patient(s) failed", summary.errors.len());
    }
    Ok(())
}
