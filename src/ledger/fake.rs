//! In-memory `Ledger` used by the Dispenser's own tests and by `tests/`.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use super::{DispenseRequest, DispenseStatus, Ledger, LedgerError, RecentRow, Stats};

pub struct FakeLedger {
    rows: Mutex<Vec<DispenseRequest>>,
    next_id: AtomicI64,
    unavailable: std::sync::atomic::AtomicBool,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            unavailable: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Simulates the ledger store being down, to exercise fail-closed paths.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable
            .store(unavailable, Ordering::SeqCst);
    }

    pub fn rows(&self) -> Vec<DispenseRequest> {
        self.rows.lock().unwrap().clone()
    }

    fn check_available(&self) -> Result<(), LedgerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("fake ledger down".into()));
        }
        Ok(())
    }
}

impl Default for FakeLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for FakeLedger {
    async fn reserve(
        &self,
        recipient: &str,
        amount: i64,
        source_ip: &str,
    ) -> Result<i64, LedgerError> {
        self.check_available()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().unwrap().push(DispenseRequest {
            id,
            recipient: recipient.to_string(),
            amount,
            tx_hash: None,
            source_ip: source_ip.to_string(),
            status: DispenseStatus::Pending,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        });
        Ok(id)
    }

    async fn complete(&self, request_id: i64, tx_hash: &str) -> Result<(), LedgerError> {
        self.check_available()?;
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|r| r.id == request_id)
            .ok_or(LedgerError::NotFound(request_id))?;
        if row.status != DispenseStatus::Pending {
            return Err(LedgerError::AlreadyFinalized(request_id));
        }
        row.status = DispenseStatus::Completed;
        row.tx_hash = Some(tx_hash.to_string());
        row.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn fail(&self, request_id: i64, reason: &str) -> Result<(), LedgerError> {
        self.check_available()?;
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|r| r.id == request_id)
            .ok_or(LedgerError::NotFound(request_id))?;
        if row.status != DispenseStatus::Pending {
            return Err(LedgerError::AlreadyFinalized(request_id));
        }
        row.status = DispenseStatus::Failed;
        row.error = Some(reason.to_string());
        row.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn recent_successful(&self, n: i64) -> Result<Vec<RecentRow>, LedgerError> {
        self.check_available()?;
        let rows = self.rows.lock().unwrap();
        let mut completed: Vec<_> = rows
            .iter()
            .filter(|r| r.status == DispenseStatus::Completed)
            .collect();
        completed.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(completed
            .into_iter()
            .take(n.max(0) as usize)
            .map(|r| RecentRow {
                recipient: r.recipient.clone(),
                amount: r.amount,
                tx_hash: r.tx_hash.clone().unwrap_or_default(),
                completed_at: r.completed_at.unwrap_or(r.created_at),
            })
            .collect())
    }

    async fn stats(&self, window: chrono::Duration) -> Result<Stats, LedgerError> {
        self.check_available()?;
        let rows = self.rows.lock().unwrap();
        let completed: Vec<_> = rows
            .iter()
            .filter(|r| r.status == DispenseStatus::Completed)
            .collect();
        let total_distributed = completed.iter().map(|r| r.amount).sum();
        let mut recipients: Vec<_> = completed.iter().map(|r| r.recipient.clone()).collect();
        recipients.sort();
        recipients.dedup();

        let since = Utc::now() - window;
        let requests_last_window = rows.iter().filter(|r| r.created_at >= since).count() as i64;

        Ok(Stats {
            total_distributed,
            unique_recipients: recipients.len() as i64,
            requests_last_window,
        })
    }

    async fn address_ever_served(&self, recipient: &str) -> Result<bool, LedgerError> {
        self.check_available()?;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .any(|r| r.recipient == recipient && r.status != DispenseStatus::Failed))
    }
}
