//! lrs-events - turns pending line features into LRS linear events
//!
//! One run: read features whose processed date is unset, locate both end
//! points on their routes, pair them into from/to measure spans per route
//! and side, create the events through apply-edits, then stamp the source
//! features with the generated event ids.
//!
//! Module structure:
//! - `domain/` - Location records, event groups, geometry
//! - `io/` - Locate and apply-edits clients, SQLite feature store, journal
//! - `services/` - Pairing, write-back, run pipeline
//! - `infra/` - Config, run metrics

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use lrs_events::infra::Config;
use lrs_events::io::{EditSubmitter, FeatureStore, HttpTransport, Journal, LocateClient};
use lrs_events::services::{Pipeline, RunMode};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Create LRS events from pending line features
#[derive(Parser, Debug)]
#[command(name = "lrs-events", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,

    /// Locate and pair only; do not submit edits or write back
    #[arg(long)]
    dry_run: bool,
}

fn print_error(err: &anyhow::Error) {
    eprintln!("*****************ERROR*****************");
    eprintln!("{err}");
    for cause in err.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
}

async fn run(args: Args) -> anyhow::Result<i32> {
    let config = Config::from_file(&args.config)?;
    info!(
        config_file = %config.config_file(),
        database = %config.database(),
        table = %config.table(),
        event_layer_id = %config.event_layer_id(),
        tolerance = %config.tolerance(),
        passthrough = ?config.passthrough(),
        dry_run = %args.dry_run,
        "config_loaded"
    );

    // Captured once; every feature written back in this run gets the same stamp
    let run_at = Utc::now();

    let transport = Arc::new(
        HttpTransport::new(config.timeout(), config.retry_policy())
            .context("Unable to create HTTP client")?,
    );
    let locate = LocateClient::new(transport.clone(), config.locate_url(), config.tolerance());
    let edits = EditSubmitter::new(
        transport,
        config.apply_edits_url(),
        config.event_layer_id(),
        config.event_fields().clone(),
        config.passthrough().to_vec(),
    );
    let journal = Journal::new(config.journal_file());

    let mut store = FeatureStore::open(
        config.database(),
        config.table(),
        config.source_fields().clone(),
        config.passthrough().to_vec(),
    )
    .context("Unable to open source features")?;

    let mode = if args.dry_run { RunMode::DryRun } else { RunMode::Submit };
    let pipeline = Pipeline::new(locate, edits, journal);
    let result = pipeline.run(&mut store, run_at, mode).await;
    pipeline.metrics().summary().log();

    let outcome = result.context("Run aborted")?;
    println!("{}", outcome.message());
    if outcome.exit_code() != 0 {
        eprintln!("*****************ERROR*****************");
        eprintln!(
            "Unable to update source features; created events are listed in {}",
            pipeline.journal().file_path()
        );
    }
    Ok(outcome.exit_code())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize structured logging with configurable level via RUST_LOG env var
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(git_hash = %env!("GIT_HASH"), "lrs-events starting");

    let args = Args::parse();
    let code = match run(args).await {
        Ok(code) => code,
        Err(e) => {
            print_error(&e);
            1
        }
    };

    info!(exit_code = %code, "lrs-events finished");
    std::process::exit(code);
}
