//! Wire types for the `/api/v1` JSON surface.

use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct DispenseRequestBody {
    pub address: String,
    #[serde(default)]
    pub captcha_token: String,
}

#[derive(Serialize)]
pub struct DispenseResponse {
    pub tx_hash: String,
    pub recipient: String,
    pub amount: u64,
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub network: String,
    pub height: u64,
}

#[derive(Serialize)]
pub struct FaucetInfoResponse {
    pub amount_per_request: u64,
    pub denom: String,
    pub balance: u64,
    pub total_distributed: i64,
    pub unique_recipients: i64,
    pub requests_last_24h: i64,
    pub chain_id: String,
}

#[derive(Serialize)]
pub struct RecentTransaction {
    pub recipient: String,
    pub amount: i64,
    pub tx_hash: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize)]
pub struct RecentResponse {
    pub transactions: Vec<RecentTransaction>,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub total_distributed: i64,
    pub unique_recipients: i64,
    pub requests_last_window: i64,
    pub amount_per_request: u64,
    pub denom: String,
}
