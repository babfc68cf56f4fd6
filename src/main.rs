// =============================================================================
// Polaris Indicator Engine — Main Entry Point
// =============================================================================
//
// Boot order: environment -> config -> stores -> recompute engine -> API
// server -> periodic refresh -> dispatch loop. The dispatch loop owns the
// main task; everything else runs as spawned background tasks.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod config;
mod dispatch;
mod engine;
mod error;
mod indicators;
mod notify;
mod store;
mod types;
mod window;

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::rest::ApiState;
use crate::config::EngineConfig;
use crate::dispatch::{run_dispatch_loop, Dispatcher};
use crate::engine::RecomputeEngine;
use crate::notify::BroadcastNotifier;
use crate::store::{MemoryIndicatorStore, MemoryPriceStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Polaris Indicator Engine — Starting Up           ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config_path = "engine_config.json";
    let mut config = EngineConfig::load(config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        EngineConfig::default()
    });

    // First run: persist the defaults so the deployment has a config file to
    // edit. Never overwrite an existing (possibly corrupt) file.
    if !std::path::Path::new(config_path).exists() {
        if let Err(e) = config.save(config_path) {
            warn!(error = %e, "could not write default config file");
        }
    }

    // Override symbols from env if available.
    if let Ok(syms) = std::env::var("POLARIS_SYMBOLS") {
        config.symbols = syms
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if config.symbols.is_empty() {
        config.symbols = vec!["BTC/USD".into()];
    }

    info!(symbols = ?config.symbols, intervals = ?config.intervals, "Configured series grid");

    // ── 2. Stores ────────────────────────────────────────────────────────
    // Process-local stores; an external ingestion process (or a relational
    // backend wired in behind the same traits) provides the bars.
    let price_store = Arc::new(MemoryPriceStore::new());
    let indicator_store = Arc::new(MemoryIndicatorStore::new());

    // ── 3. Recompute engine ──────────────────────────────────────────────
    let engine = Arc::new(RecomputeEngine::new(
        price_store.clone(),
        indicator_store.clone(),
        config.indicator_params.clone(),
        config.window.clone(),
    ));

    let notifier = Arc::new(BroadcastNotifier::new(64));

    // Drain the notification feed in-process; the external transport that
    // would carry these snapshots to subscribers is out of scope.
    let mut notifications = notifier.subscribe();
    tokio::spawn(async move {
        use tokio::sync::broadcast::error::RecvError;
        loop {
            match notifications.recv().await {
                Ok(n) => {
                    debug!(topic = %n.topic, fields = n.payload.len(), "notification delivered");
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "notification sink lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // ── 4. Command channel & API server ──────────────────────────────────
    let (command_tx, command_rx) = mpsc::channel::<String>(256);

    let api_state = Arc::new(ApiState {
        command_tx: command_tx.clone(),
        price_store: price_store.clone(),
        indicator_store: indicator_store.clone(),
        start_time: Instant::now(),
    });

    let bind_addr =
        std::env::var("POLARIS_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());

    tokio::spawn(async move {
        let app = api::rest::router(api_state);
        let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(addr = %bind_addr, error = %e, "Failed to bind API server");
                return;
            }
        };
        info!(addr = %bind_addr, "API server listening");
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    // ── 5. Startup sweep ─────────────────────────────────────────────────
    // Bring every configured series up to date: backfill missing ones,
    // tail-update the rest. Failures are logged per key and never abort the
    // sweep.
    let sweep_keys = config.series_keys();
    for (key, result) in engine.ensure_all(&sweep_keys, config.market_id) {
        match result {
            Ok(outcome) => info!(key = %key, status = %outcome, "startup sweep"),
            Err(e) => error!(key = %key, error = %e, "startup sweep failed for key"),
        }
    }

    // ── 6. Periodic refresh ──────────────────────────────────────────────
    if config.refresh_secs > 0 {
        let refresh_tx = command_tx.clone();
        let period = tokio::time::Duration::from_secs(config.refresh_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // First tick fires immediately; the startup sweep already ran.
            interval.tick().await;
            loop {
                interval.tick().await;
                if refresh_tx.send("update_all".to_string()).await.is_err() {
                    warn!("dispatch loop gone; stopping periodic refresh");
                    break;
                }
            }
        });
        info!(refresh_secs = config.refresh_secs, "Periodic update sweep scheduled");
    }

    // ── 7. Dispatch loop (owns the main task) ────────────────────────────
    let dispatcher = Dispatcher::new(
        engine,
        indicator_store,
        notifier,
        config.market_id,
        sweep_keys,
    );

    drop(command_tx);
    run_dispatch_loop(command_rx, dispatcher).await;

    Ok(())
}
