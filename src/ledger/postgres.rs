//! Postgres-backed `Ledger`. Schema lives in `migrations/0001_init.sql`.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use super::{Ledger, LedgerError, RecentRow, Stats};

/// Spec §5 budget for a single ledger round-trip.
const LEDGER_TIMEOUT: Duration = Duration::from_secs(2);

/// Bounds a single query to `LEDGER_TIMEOUT`, so a stalled connection or a
/// lock-blocked statement can't hold a request handler open indefinitely.
async fn with_deadline<T, F>(fut: F) -> Result<T, LedgerError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(LEDGER_TIMEOUT, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(LedgerError::Unavailable(e.to_string())),
        Err(_) => Err(LedgerError::Unavailable(
            "ledger store timed out".to_string(),
        )),
    }
}

pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, LedgerError> {
        let pool = PgPoolOptions::new()
            .acquire_timeout(LEDGER_TIMEOUT)
            .connect(database_url)
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;
        Ok(Self::new(pool))
    }

    pub async fn run_migrations(&self) -> Result<(), LedgerError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl Ledger for PgLedger {
    async fn reserve(
        &self,
        recipient: &str,
        amount: i64,
        source_ip: &str,
    ) -> Result<i64, LedgerError> {
        let row = with_deadline(
            sqlx::query(
                "INSERT INTO dispense_requests (recipient, amount, source_ip, status)
                 VALUES ($1, $2, $3, 'pending')
                 RETURNING id",
            )
            .bind(recipient)
            .bind(amount)
            .bind(source_ip)
            .fetch_one(&self.pool),
        )
        .await?;
        Ok(row.get::<i64, _>("id"))
    }

    async fn complete(&self, request_id: i64, tx_hash: &str) -> Result<(), LedgerError> {
        let result = with_deadline(
            sqlx::query(
                "UPDATE dispense_requests
                 SET status = 'completed', tx_hash = $2, completed_at = $3
                 WHERE id = $1 AND status = 'pending'",
            )
            .bind(request_id)
            .bind(tx_hash)
            .bind(Utc::now())
            .execute(&self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::AlreadyFinalized(request_id));
        }
        Ok(())
    }

    async fn fail(&self, request_id: i64, reason: &str) -> Result<(), LedgerError> {
        let result = with_deadline(
            sqlx::query(
                "UPDATE dispense_requests
                 SET status = 'failed', error = $2, completed_at = $3
                 WHERE id = $1 AND status = 'pending'",
            )
            .bind(request_id)
            .bind(reason)
            .bind(Utc::now())
            .execute(&self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::AlreadyFinalized(request_id));
        }
        Ok(())
    }

    async fn recent_successful(&self, n: i64) -> Result<Vec<RecentRow>, LedgerError> {
        let rows = with_deadline(
            sqlx::query(
                "SELECT recipient, amount, tx_hash, completed_at
                 FROM dispense_requests
                 WHERE status = 'completed'
                 ORDER BY completed_at DESC
                 LIMIT $1",
            )
            .bind(n)
            .fetch_all(&self.pool),
        )
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| RecentRow {
                recipient: row.get("recipient"),
                amount: row.get("amount"),
                tx_hash: row.get::<Option<String>, _>("tx_hash").unwrap_or_default(),
                completed_at: row.get("completed_at"),
            })
            .collect())
    }

    async fn stats(&self, window: chrono::Duration) -> Result<Stats, LedgerError> {
        let totals = with_deadline(
            sqlx::query(
                "SELECT
                    COALESCE(SUM(amount), 0) AS total_distributed,
                    COUNT(DISTINCT recipient) AS unique_recipients
                 FROM dispense_requests
                 WHERE status = 'completed'",
            )
            .fetch_one(&self.pool),
        )
        .await?;

        let since = Utc::now() - window;
        let windowed = with_deadline(
            sqlx::query(
                "SELECT COUNT(*) AS requests_last_window
                 FROM dispense_requests
                 WHERE created_at >= $1",
            )
            .bind(since)
            .fetch_one(&self.pool),
        )
        .await?;

        Ok(Stats {
            total_distributed: totals.get("total_distributed"),
            unique_recipients: totals.get("unique_recipients"),
            requests_last_window: windowed.get("requests_last_window"),
        })
    }

    async fn address_ever_served(&self, recipient: &str) -> Result<bool, LedgerError> {
        let row = with_deadline(
            sqlx::query(
                "SELECT EXISTS(
                    SELECT 1 FROM dispense_requests
                    WHERE recipient = $1 AND status <> 'failed'
                 ) AS exists_row",
            )
            .bind(recipient)
            .fetch_one(&self.pool),
        )
        .await?;
        Ok(row.get("exists_row"))
    }
}
