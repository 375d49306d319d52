//! Command-line driver for the comparison pipeline.
//!
//! Sweeps are invoked on demand (`sweep`), on a fixed interval (`watch`), or
//! as part of an operator backfill/reprocess run.

use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use kiosk_core::types::DbId;
use kiosk_pipeline::backfill::BackfillReport;
use kiosk_pipeline::worker::SweepSummary;
use kiosk_pipeline::{Pipeline, PipelineConfig};
use tokio_util::sync::CancellationToken;

/// Default seconds between sweeps in `watch` mode.
pub const DEFAULT_WATCH_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Parser)]
#[command(name = "kiosk-worker", version, about = "Return verification worker")]
pub struct Cli {
    /// Maximum database connections.
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Claim and process pending comparison jobs once.
    Sweep {
        /// Jobs to claim (defaults to SWEEP_BATCH_SIZE).
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Sweep repeatedly until interrupted.
    Watch {
        #[arg(long, default_value_t = DEFAULT_WATCH_INTERVAL_SECS)]
        interval_secs: u64,
    },
    /// Queue comparisons for returned items that were never scored.
    Backfill {
        /// Rows to consider.
        #[arg(long)]
        limit: Option<i64>,
        /// Process the queued jobs before exiting.
        #[arg(long)]
        run: bool,
    },
    /// Start a new comparison lifecycle for already scored rows.
    Reprocess {
        /// Only this transaction.
        #[arg(long)]
        transaction_id: Option<DbId>,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long)]
        run: bool,
    },
}

/// Install the tracing subscriber. `LOG_FORMAT=json` selects JSON output.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "kiosk_worker=debug,kiosk_pipeline=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Connect, migrate, and run one command to completion.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = kiosk_db::create_pool(&database_url, cli.max_connections)
        .await
        .context("Failed to connect to database")?;
    kiosk_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let config = PipelineConfig::from_env().context("Invalid pipeline configuration")?;
    tracing::info!(
        photo_root = %config.photo_root.display(),
        batch = config.sweep_batch_size,
        concurrency = config.sweep_concurrency,
        stale_after_secs = config.stale_after_secs,
        "Pipeline configured",
    );
    let pipeline = Pipeline::new(pool, config);

    match cli.command {
        Command::Sweep { limit } => {
            let summary = pipeline.sweep(limit).await?;
            log_sweep(&summary);
        }
        Command::Watch { interval_secs } => {
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Received Ctrl-C, stopping after the current sweep");
                }
                on_signal.cancel();
            });
            pipeline
                .watch(Duration::from_secs(interval_secs.max(1)), cancel)
                .await;
        }
        Command::Backfill { limit, run } => {
            let report = pipeline.backfill(limit, run).await?;
            log_report(&report);
        }
        Command::Reprocess {
            transaction_id,
            limit,
            run,
        } => {
            let report = pipeline.reprocess(transaction_id, limit, run).await?;
            log_report(&report);
        }
    }

    Ok(())
}

fn log_sweep(summary: &SweepSummary) {
    for outcome in &summary.outcomes {
        tracing::info!(outcome = %serde_json::to_string(outcome).unwrap_or_default(), "Job");
    }
    tracing::info!(
        claimed = summary.claimed,
        completed = summary.completed,
        failed = summary.failed,
        superseded = summary.superseded,
        "Summary",
    );
}

fn log_report(report: &BackfillReport) {
    if let Some(sweep) = &report.sweep {
        log_sweep(sweep);
    }
    tracing::info!(
        mode = ?report.mode,
        rows = report.rows.len(),
        queued = report.summary.queued,
        skipped = report.summary.skipped,
        updated = report.summary.updated,
        errors = report.summary.errors,
        "Summary",
    );
}
