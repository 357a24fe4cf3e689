//! matchline-cohort - Cohort aggregation batch job
//!
//! Offline job, run on a schedule: reads every cohort definition, generates
//! each one's synthetic average profile under the sampling thresholds, and
//! logs an end-of-run summary. Exits non-zero only when the batch itself
//! cannot run; individual cohort skips and failures are reported, not
//! fatal.

use anyhow::Result;
use clap::Parser;
use matchline_cohort::{CohortAggregator, CohortConfig};
use matchline_common::config::Config;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "matchline-cohort", about = "Generate synthetic cohort profiles")]
struct Args {
    /// TOML config file path
    #[arg(long, env = "MATCHLINE_CONFIG")]
    config: Option<PathBuf>,

    /// Database path override
    #[arg(long)]
    database: Option<PathBuf>,

    /// Generate a single cohort instead of the whole batch
    #[arg(long)]
    cohort: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    info!("Starting matchline-cohort batch job");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(database) = args.database {
        config.database_path = database;
    }
    info!("Database: {}", config.database_path.display());

    let pool = matchline_common::db::init_database(&config.database_path).await?;
    let aggregator = CohortAggregator::new(pool, CohortConfig::from(&config));

    match args.cohort {
        Some(cohort_guid) => {
            let outcome = aggregator.generate_cohort_profile(&cohort_guid).await?;
            if outcome.success {
                info!(usage_days = outcome.usage_days_written, "Cohort generated");
            } else {
                info!(reason = ?outcome.reason, "Cohort skipped");
            }
        }
        None => {
            let summary = aggregator.run_batch().await?;
            info!(
                generated = summary.generated,
                skipped = summary.skipped,
                failed = summary.failed,
                "Batch finished"
            );
        }
    }

    Ok(())
}
