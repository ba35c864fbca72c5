//! Error taxonomy for the faucet HTTP surface.
//!
//! Component-level errors (`ChainError`, `LedgerError`, `LimiterError`,
//! `CaptchaError`) stay narrow and live next to the component they describe.
//! `FaucetError` is the single place that widens them into a fixed
//! HTTP-status mapping; nothing downstream of a component should need to
//! know its HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::captcha::CaptchaError;
use crate::chain::ChainError;
use crate::ledger::LedgerError;
use crate::limiter::LimiterError;

#[derive(Debug, thiserror::Error)]
pub enum FaucetError {
    #[error("invalid recipient address")]
    InvalidAddress,

    #[error("invalid or missing captcha token")]
    InvalidCaptcha,

    #[error("captcha verifier unavailable: {0}")]
    CaptchaUnavailable(#[source] CaptchaError),

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("rate limit store unavailable: {0}")]
    LimiterUnavailable(#[source] LimiterError),

    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(#[source] LedgerError),

    #[error("chain node unreachable: {0}")]
    NodeUnreachable(#[source] ChainError),

    #[error("chain node rejected transaction: {reason}")]
    NodeRejected { reason: String, client_fault: bool },

    #[error("signing error: {0}")]
    SigningError(#[source] ChainError),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl FaucetError {
    pub fn status(&self) -> StatusCode {
        match self {
            FaucetError::InvalidAddress => StatusCode::BAD_REQUEST,
            FaucetError::InvalidCaptcha => StatusCode::BAD_REQUEST,
            FaucetError::CaptchaUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            FaucetError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            FaucetError::LimiterUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            FaucetError::LedgerUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FaucetError::NodeUnreachable(_) => StatusCode::BAD_GATEWAY,
            FaucetError::NodeRejected { client_fault, .. } => {
                if *client_fault {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
            }
            FaucetError::SigningError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FaucetError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            FaucetError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable kind, used as the `error` field in responses.
    /// Never includes internal detail (SQL text, stack traces, key material).
    pub fn kind(&self) -> &'static str {
        match self {
            FaucetError::InvalidAddress => "invalid_address",
            FaucetError::InvalidCaptcha => "invalid_captcha",
            FaucetError::CaptchaUnavailable(_) => "captcha_unavailable",
            FaucetError::RateLimited { .. } => "rate_limited",
            FaucetError::LimiterUnavailable(_) => "limiter_unavailable",
            FaucetError::LedgerUnavailable(_) => "ledger_unavailable",
            FaucetError::NodeUnreachable(_) => "node_unreachable",
            FaucetError::NodeRejected { .. } => "node_rejected",
            FaucetError::SigningError(_) => "signing_error",
            FaucetError::Timeout(_) => "timeout",
            FaucetError::Internal(_) => "internal",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_secs: Option<u64>,
}

impl IntoResponse for FaucetError {
    fn into_response(self) -> Response {
        log::warn!("dispense request failed: kind={} detail={}", self.kind(), self);
        let retry_after_secs = match &self {
            FaucetError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };
        let body = ErrorBody {
            error: self.kind(),
            retry_after_secs,
        };
        (self.status(), Json(body)).into_response()
    }
}
