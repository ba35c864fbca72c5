//! Durable relational store of dispense requests: the source of truth for
//! per-address history and aggregate statistics. See `migrations/` for the
//! schema this trait is implemented against.

#[cfg(any(test, feature = "test-util"))]
pub mod fake;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use self::postgres::PgLedger;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger store unreachable: {0}")]
    Unavailable(String),
    #[error("request {0} was already finalized by another writer")]
    AlreadyFinalized(i64),
    #[error("request {0} not found")]
    NotFound(i64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispenseStatus {
    Pending,
    Completed,
    Failed,
}

impl DispenseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DispenseStatus::Pending => "pending",
            DispenseStatus::Completed => "completed",
            DispenseStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "completed" => DispenseStatus::Completed,
            "failed" => DispenseStatus::Failed,
            _ => DispenseStatus::Pending,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DispenseRequest {
    pub id: i64,
    pub recipient: String,
    pub amount: i64,
    pub tx_hash: Option<String>,
    pub source_ip: String,
    pub status: DispenseStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug)]
pub struct RecentRow {
    pub recipient: String,
    pub amount: i64,
    pub tx_hash: String,
    pub completed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default)]
pub struct Stats {
    pub total_distributed: i64,
    pub unique_recipients: i64,
    pub requests_last_window: i64,
}

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Inserts a new row with status=pending and returns its id. Must be
    /// durable before the caller performs any external side effect.
    async fn reserve(
        &self,
        recipient: &str,
        amount: i64,
        source_ip: &str,
    ) -> Result<i64, LedgerError>;

    /// Sets status=completed, tx_hash, completed_at=now. Fails if the row
    /// was already finalized (serializable with concurrent `fail`).
    async fn complete(&self, request_id: i64, tx_hash: &str) -> Result<(), LedgerError>;

    /// Sets status=failed, error=reason, completed_at=now.
    async fn fail(&self, request_id: i64, reason: &str) -> Result<(), LedgerError>;

    /// Last `n` completed rows, newest-first.
    async fn recent_successful(&self, n: i64) -> Result<Vec<RecentRow>, LedgerError>;

    /// `total_distributed`/`unique_recipients` over completed rows only;
    /// `requests_last_window` counts all rows (any status) created within
    /// `window` of now.
    async fn stats(&self, window: chrono::Duration) -> Result<Stats, LedgerError>;

    /// True iff any non-failed row exists for `recipient`. Optional limiter
    /// fallback; not required for the default sliding-window policy.
    async fn address_ever_served(&self, recipient: &str) -> Result<bool, LedgerError>;
}
