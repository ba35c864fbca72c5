use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Duration as ChronoDuration;

use super::dto::{
    DispenseRequestBody, DispenseResponse, FaucetInfoResponse, HealthResponse, RecentResponse,
    RecentTransaction, StatsResponse,
};
use super::{resolve_client_ip, AppState};
use crate::error::FaucetError;

const STATS_WINDOW_HOURS: i64 = 24;
const RECENT_DEFAULT_COUNT: i64 = 10;

/// Unlike every other endpoint, `/health`'s own contract (§6) is 503 on a
/// node-unreachable probe, not the generic 502 `FaucetError::NodeUnreachable`
/// carries for the dispense path — so this handler maps the failure itself
/// rather than going through `FaucetError`.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, Response> {
    let height = state.chain.height().await.map_err(|e| {
        log::warn!("health check: node unreachable: {e}");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "unavailable", "error": "node_unreachable" })),
        )
            .into_response()
    })?;
    Ok(Json(HealthResponse {
        status: "ok",
        network: state.config.chain_id.clone(),
        height,
    }))
}

pub async fn info(State(state): State<AppState>) -> Result<Json<FaucetInfoResponse>, FaucetError> {
    // §6 lists 500 for this endpoint's failure mode, not the dispense path's
    // 502/503 node-down statuses, so a balance query failure widens to
    // `FaucetError::Internal` rather than `NodeUnreachable`.
    let balance = state
        .chain
        .balance()
        .await
        .map_err(|e| FaucetError::Internal(format!("node balance query failed: {e}")))?;
    let stats = state
        .ledger
        .stats(ChronoDuration::hours(STATS_WINDOW_HOURS))
        .await
        .map_err(FaucetError::LedgerUnavailable)?;

    Ok(Json(FaucetInfoResponse {
        amount_per_request: state.config.amount_per_request,
        denom: state.config.denom.clone(),
        balance,
        total_distributed: stats.total_distributed,
        unique_recipients: stats.unique_recipients,
        requests_last_24h: stats.requests_last_window,
        chain_id: state.config.chain_id.clone(),
    }))
}

pub async fn request(
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(body): Json<DispenseRequestBody>,
) -> Result<Json<DispenseResponse>, FaucetError> {
    let ip = resolve_client_ip(peer.ip(), &headers, &state.config.trusted_proxies);

    let outcome = state
        .dispenser
        .request(&ip, &body.address, &body.captcha_token)
        .await?;

    Ok(Json(DispenseResponse {
        tx_hash: outcome.tx_hash,
        recipient: outcome.recipient,
        amount: outcome.amount,
        message: "Tokens sent successfully",
    }))
}

pub async fn recent(State(state): State<AppState>) -> Result<Json<RecentResponse>, FaucetError> {
    let rows = state
        .ledger
        .recent_successful(RECENT_DEFAULT_COUNT)
        .await
        .map_err(FaucetError::LedgerUnavailable)?;

    Ok(Json(RecentResponse {
        transactions: rows
            .into_iter()
            .map(|row| RecentTransaction {
                recipient: row.recipient,
                amount: row.amount,
                tx_hash: row.tx_hash,
                timestamp: row.completed_at,
            })
            .collect(),
    }))
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, FaucetError> {
    let stats = state
        .ledger
        .stats(ChronoDuration::hours(STATS_WINDOW_HOURS))
        .await
        .map_err(FaucetError::LedgerUnavailable)?;

    Ok(Json(StatsResponse {
        total_distributed: stats.total_distributed,
        unique_recipients: stats.unique_recipients,
        requests_last_window: stats.requests_last_window,
        amount_per_request: state.config.amount_per_request,
        denom: state.config.denom.clone(),
    }))
}
