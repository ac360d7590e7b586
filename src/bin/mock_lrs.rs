//! Mock LRS server
//!
//! Answers geometryToMeasure and applyEdits for local end-to-end runs.
//! Measures are the probe's x coordinate.
//!
//! Usage:
//!   cargo run --bin mock-lrs -- --port 6080

use clap::Parser;
use lrs_events::io::mock_lrs::{serve, MockBehavior, MockState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mock-lrs")]
#[command(about = "Mock LRS locate/apply-edits service for local runs")]
struct Args {
    /// TCP port to listen on
    #[arg(short, long, default_value = "6080")]
    port: u16,

    /// Answer the first N requests with 503
    #[arg(long, default_value = "0")]
    transient_failures: usize,

    /// Reply to apply-edits with success=false
    #[arg(long)]
    reject_edits: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let args = Args::parse();
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], args.port))).await?;
    let state = Arc::new(MockState::new(MockBehavior {
        transient_failures: args.transient_failures,
        reject_edits: args.reject_edits,
    }));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    serve(listener, state, shutdown_rx).await?;
    Ok(())
}
