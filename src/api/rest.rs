// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// Thin ingress in front of the dispatch loop. Commands are validated here
// (malformed input is rejected immediately with 400) and then queued onto the
// single-consumer channel; execution order is the queue order. Bar ingestion
// stands in for the external ingestion process when the engine runs against
// the in-memory price store.
//
// CORS is configured permissively for development; tighten `allowed_origins`
// in production.
// =============================================================================

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::dispatch::parse_command;
use crate::store::{IndicatorStore, MemoryIndicatorStore, MemoryPriceStore};
use crate::types::{Interval, PriceBar};

/// Shared state for the API handlers.
pub struct ApiState {
    pub command_tx: mpsc::Sender<String>,
    pub price_store: Arc<MemoryPriceStore>,
    pub indicator_store: Arc<MemoryIndicatorStore>,
    pub start_time: Instant,
}

// =============================================================================
// Router construction
// =============================================================================

/// Build the REST router with CORS middleware and shared state.
pub fn router(state: Arc<ApiState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/command", post(submit_command))
        .route("/api/v1/bars", post(ingest_bars))
        .route("/api/v1/indicators", get(indicator_series))
        .route("/api/v1/indicators/latest", get(latest_indicator))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        uptime_secs: state.start_time.elapsed().as_secs(),
        server_time: chrono::Utc::now().timestamp_millis(),
    };
    Json(resp)
}

// =============================================================================
// Command ingress
// =============================================================================

#[derive(Deserialize)]
struct CommandRequest {
    text: String,
}

#[derive(Serialize)]
struct CommandResponse {
    status: &'static str,
    command: String,
}

async fn submit_command(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<CommandRequest>,
) -> impl IntoResponse {
    // Reject malformed commands at the door instead of queueing dead work.
    if let Err(e) = parse_command(&req.text) {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response();
    }

    match state.command_tx.send(req.text.clone()).await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(CommandResponse {
                status: "queued",
                command: req.text,
            }),
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "command channel closed; rejecting command");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": "dispatcher unavailable" })),
            )
                .into_response()
        }
    }
}

// =============================================================================
// Bar ingestion (external-process stand-in for the in-memory store)
// =============================================================================

#[derive(Serialize)]
struct SeriesTotal {
    symbol: String,
    interval: &'static str,
    bars: usize,
}

async fn ingest_bars(
    State(state): State<Arc<ApiState>>,
    Json(bars): Json<Vec<PriceBar>>,
) -> impl IntoResponse {
    let inserted = bars.len();

    let mut keys: Vec<(String, Interval, u32)> = bars
        .iter()
        .map(|b| (b.symbol.clone(), b.interval, b.market_id))
        .collect();
    keys.sort();
    keys.dedup();

    state.price_store.insert_bars(bars);

    let totals: Vec<SeriesTotal> = keys
        .into_iter()
        .map(|(symbol, interval, market_id)| SeriesTotal {
            bars: state.price_store.bar_count(&symbol, interval, market_id),
            symbol,
            interval: interval.label(),
        })
        .collect();

    Json(serde_json::json!({ "inserted": inserted, "series": totals }))
}

// =============================================================================
// Indicator series
// =============================================================================

#[derive(Deserialize)]
struct SeriesQuery {
    symbol: String,
    interval: String,
}

fn parse_interval(raw: &str) -> Result<Interval, axum::response::Response> {
    Interval::from_str(raw).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response()
    })
}

async fn indicator_series(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<SeriesQuery>,
) -> impl IntoResponse {
    let interval = match parse_interval(&query.interval) {
        Ok(interval) => interval,
        Err(resp) => return resp,
    };

    let points = state.indicator_store.get_all(&query.symbol, interval);
    Json(serde_json::json!({ "count": points.len(), "points": points })).into_response()
}

async fn latest_indicator(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<SeriesQuery>,
) -> impl IntoResponse {
    let interval = match parse_interval(&query.interval) {
        Ok(interval) => interval,
        Err(resp) => return resp,
    };

    match state.indicator_store.get_latest(&query.symbol, interval) {
        Ok(Some(point)) => Json(point).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": format!("no indicators for {}@{}", query.symbol, interval)
            })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}
