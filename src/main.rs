//! Allocator demo server protected by the memory limiter.
//!
//! ```text
//!     client ──POST /allocate──▶ throttle middleware ──▶ allocate & hold buffer
//!                                      ▲
//!     SubscriptionDefault ──▶ controller ──▶ operator
//!
//!     client ──GET /stats──▶ MemLimiterStats JSON
//! ```
//!
//! Ctrl+C or a fatal controller error stops the server, then the memory
//! limiter is shut down.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use memlimiter::config::{load_config, AllocatorConfig};
use memlimiter::observability::{logging, metrics};
use memlimiter::service::{new_service_from_config, ServiceOptions};
use memlimiter::stats::SubscriptionDefault;
use memlimiter::utils::{BoxError, ChannelTerminator};

#[derive(Parser)]
#[command(name = "memlimiter-allocator")]
#[command(about = "Allocation-on-request service guarded by memlimiter", long_about = None)]
struct Args {
    /// Path to a TOML or JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => AllocatorConfig::default(),
    };

    logging::init(&config.observability.log_level)?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        stats_period = ?config.stats_period,
        memlimiter_enabled = config.memlimiter.controller_nextgc.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel::<BoxError>();
    let terminator = Arc::new(ChannelTerminator::new(fatal_tx));
    let subscription = Arc::new(SubscriptionDefault::new(config.stats_period));

    let memlimiter_config = config
        .memlimiter
        .controller_nextgc
        .as_ref()
        .map(|_| &config.memlimiter);

    let service = new_service_from_config(
        memlimiter_config,
        terminator,
        subscription,
        ServiceOptions::default(),
    )?;

    let app = memlimiter::allocator::router(service.clone(), &config);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                res = tokio::signal::ctrl_c() => match res {
                    Ok(()) => tracing::info!("Shutdown signal received"),
                    Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C"),
                },
                Some(err) = fatal_rx.recv() => {
                    tracing::error!(error = %err, "Fatal memlimiter error, shutting down");
                }
            }
        })
        .await?;

    service.quit().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
