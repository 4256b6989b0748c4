//! Risk-gated spot trading gateway.
//!
//! Receives alert webhooks, admits them through the safety gate, sizes and
//! places protective limit orders, and runs a background monitor that
//! enforces SL/TP exits by polling the exchange.

mod engine;
mod exchange;
mod models;
mod monitor;
mod notify;
mod retry;
mod risk;
mod server;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::engine::Engine;
use crate::exchange::WazirxGateway;
use crate::monitor::Monitor;
use crate::notify::Notifier;
use crate::retry::RetryPolicy;
use crate::risk::{RiskLimits, SymbolTable};

/// Webhook-driven spot trading gateway CLI.
#[derive(Parser)]
#[command(name = "tradegate")]
#[command(about = "Execute alert signals on a spot exchange under risk controls", long_about = None)]
struct Cli {
    /// Port for the webhook/health HTTP server
    #[arg(short, long, default_value = "8080", env = "PORT")]
    port: u16,

    /// Dry run (simulate fills, never touch the live exchange)
    #[arg(long, env = "DRY_RUN")]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Max attempts for exchange calls
    #[arg(long, default_value = "3")]
    retry_attempts: u32,

    /// Base retry backoff in milliseconds (linear: delay = base * attempt)
    #[arg(long, default_value = "500")]
    retry_base_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let limits = RiskLimits::from_env();
    info!(
        dry_run = cli.dry_run,
        trading_enabled = limits.trading_enabled,
        max_positions = limits.max_open_positions,
        "starting tradegate"
    );

    let gateway = Arc::new(WazirxGateway::from_env(cli.dry_run)?);
    let notifier = Arc::new(Notifier::from_env());
    let retry = RetryPolicy::new(cli.retry_attempts, Duration::from_millis(cli.retry_base_ms));

    let engine = Arc::new(Engine::new(
        gateway.clone(),
        notifier.clone(),
        limits,
        SymbolTable::builtin(),
        retry,
        cli.dry_run,
    ));

    // Startup balance probe, best effort.
    match engine.gateway().fetch_balance().await {
        Ok(balance) => info!(free = %balance.free, "connected to exchange"),
        Err(e) => warn!(error = %e, "exchange connection check failed"),
    }

    // Background monitor with a shared shutdown flag.
    let shutdown = Arc::new(AtomicBool::new(false));
    let monitor = Monitor::new(Arc::clone(&engine), Arc::clone(&shutdown));
    let monitor_handle = tokio::spawn(monitor.run());

    notifier.send_detached("🚀 <b>tradegate started</b>".to_string());

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "webhook server listening");

    let app = server::router(Arc::clone(&engine));
    let shutdown_flag = Arc::clone(&shutdown);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("shutdown signal received");
            shutdown_flag.store(true, Ordering::SeqCst);
        })
        .await
        .context("server error")?;

    if let Err(e) = monitor_handle.await {
        error!(error = %e, "monitor task join failed");
    }
    info!("shutdown complete");
    Ok(())
}
