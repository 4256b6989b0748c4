//! HTTP transport: webhook intake plus health/positions/close_all.
//!
//! The transport stays thin. Every decision (admission, sizing, placement)
//! lives in the engine; handlers translate JSON to engine calls and engine
//! outcomes to status codes: 400 for gate/validation/sizing rejections, 500
//! for gateway exhaustion or unexpected failure.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::engine::{Engine, SignalError};
use crate::models::{Side, Signal};

/// Raw webhook payload from the alert source.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookAlert {
    pub action: String,
    pub symbol: String,
    pub price: Decimal,
    #[serde(default)]
    pub sl: Option<Decimal>,
    #[serde(default)]
    pub tp: Option<Decimal>,
}

#[derive(Debug, Serialize)]
struct WebhookAccepted {
    status: &'static str,
    order_id: String,
    symbol: String,
    side: String,
    quantity: Decimal,
    entry_price: Decimal,
    sl: Decimal,
    tp: Decimal,
    trades_today: u32,
}

#[derive(Debug, Serialize)]
struct HealthSnapshot {
    status: &'static str,
    balance_usdt: Decimal,
    daily_pnl_usdt: Decimal,
    trades_today: u32,
    winning_trades: u32,
    losing_trades: u32,
    active_orders: usize,
    max_positions: usize,
    trading_enabled: bool,
    dry_run: bool,
}

#[derive(Debug, Serialize)]
struct PositionEntry {
    order_id: String,
    symbol: String,
    side: String,
    quantity: Decimal,
    entry_price: Decimal,
    sl_price: Decimal,
    tp_price: Decimal,
    status: String,
    timestamp: chrono::DateTime<chrono::Utc>,
}

/// Build the application router.
pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/webhook", post(webhook))
        .route("/health", get(health))
        .route("/positions", get(positions))
        .route("/close_all", post(close_all))
        .with_state(engine)
}

/// Parse the alert action into a side. Anything but BUY/SELL is invalid.
fn parse_action(action: &str) -> Option<Side> {
    match action.trim().to_uppercase().as_str() {
        "BUY" => Some(Side::Buy),
        "SELL" => Some(Side::Sell),
        _ => None,
    }
}

async fn webhook(
    State(engine): State<Arc<Engine>>,
    Json(alert): Json<WebhookAlert>,
) -> impl IntoResponse {
    info!(action = %alert.action, symbol = %alert.symbol, price = %alert.price, "webhook alert");

    let Some(action) = parse_action(&alert.action) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"status": "error", "reason": "Invalid action"})),
        );
    };
    if alert.price <= Decimal::ZERO {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"status": "error", "reason": "Invalid price"})),
        );
    }

    let limits = engine.limits();
    let signal = Signal::from_alert(
        alert.symbol,
        action,
        alert.price,
        alert.sl,
        alert.tp,
        limits.default_sl_pct,
        limits.default_tp_pct,
    );

    match engine.handle_signal(signal).await {
        Ok(receipt) => {
            let order = receipt.order;
            let body = WebhookAccepted {
                status: "success",
                order_id: order.id.clone(),
                symbol: order.symbol.clone(),
                side: order.side.as_str().to_string(),
                quantity: order.requested_qty,
                entry_price: order.entry_price,
                sl: order.sl_price,
                tp: order.tp_price,
                trades_today: receipt.trades_today,
            };
            (
                StatusCode::OK,
                Json(serde_json::to_value(body).unwrap_or_default()),
            )
        }
        Err(SignalError::Rejected(reason)) => {
            warn!(%reason, "signal rejected");
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"status": "rejected", "reason": reason.to_string()})),
            )
        }
        Err(SignalError::Exchange(e)) => {
            error!(error = %e, "signal handling failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "error", "message": e.to_string()})),
            )
        }
    }
}

async fn health(State(engine): State<Arc<Engine>>) -> impl IntoResponse {
    // Best-effort balance probe: a gateway hiccup must not fail the probe.
    let balance = match engine.gateway().fetch_balance().await {
        Ok(b) => b.free,
        Err(e) => {
            warn!(error = %e, "balance fetch failed during health check");
            Decimal::ZERO
        }
    };
    let stats = engine.daily_stats().await;

    Json(HealthSnapshot {
        status: "running",
        balance_usdt: balance,
        daily_pnl_usdt: stats.pnl.round_dp(2),
        trades_today: stats.trade_count,
        winning_trades: stats.wins,
        losing_trades: stats.losses,
        active_orders: engine.open_count().await,
        max_positions: engine.limits().max_open_positions,
        trading_enabled: engine.limits().trading_enabled,
        dry_run: engine.dry_run(),
    })
}

async fn positions(State(engine): State<Arc<Engine>>) -> impl IntoResponse {
    let orders: Vec<PositionEntry> = engine
        .snapshot()
        .await
        .into_iter()
        .map(|o| PositionEntry {
            order_id: o.id,
            symbol: o.symbol,
            side: o.side.as_str().to_string(),
            quantity: o.requested_qty,
            entry_price: o.entry_price,
            sl_price: o.sl_price,
            tp_price: o.tp_price,
            status: o.status.to_string(),
            timestamp: o.created_at,
        })
        .collect();

    Json(json!({
        "active_orders": orders.len(),
        "max_positions": engine.limits().max_open_positions,
        "orders": orders,
    }))
}

async fn close_all(State(engine): State<Arc<Engine>>) -> impl IntoResponse {
    let report = engine.close_all().await;
    info!(closed = report.closed, failed = report.failed, "close_all sweep");

    Json(json!({
        "status": "success",
        "closed_positions": report.closed,
        "message": format!("Closed {} position(s), {} failed", report.closed, report.failed),
    }))
}
