//! In-memory `ChainClient` used by the Dispenser's own tests and by
//! `tests/`. Multi-replica correctness is a property of the real backing
//! node, not of this fake — it only needs to model the outcomes the
//! Dispenser must branch on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ChainClient, ChainError, TxHash};

pub enum ScriptedOutcome {
    Accept,
    Reject { reason: String, client_fault: bool },
    Unreachable,
}

pub struct FakeChainClient {
    balance: AtomicU64,
    height: AtomicU64,
    next_outcome: Mutex<ScriptedOutcome>,
    sent: Mutex<Vec<(String, u64)>>,
    tx_counter: AtomicU64,
}

impl FakeChainClient {
    pub fn new(balance: u64) -> Self {
        Self {
            balance: AtomicU64::new(balance),
            height: AtomicU64::new(1),
            next_outcome: Mutex::new(ScriptedOutcome::Accept),
            sent: Mutex::new(Vec::new()),
            tx_counter: AtomicU64::new(0),
        }
    }

    pub fn set_next_outcome(&self, outcome: ScriptedOutcome) {
        *self.next_outcome.lock().unwrap() = outcome;
    }

    pub fn sent(&self) -> Vec<(String, u64)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainClient for FakeChainClient {
    async fn send(&self, recipient: &str, amount: u64) -> Result<TxHash, ChainError> {
        let outcome = std::mem::replace(
            &mut *self.next_outcome.lock().unwrap(),
            ScriptedOutcome::Accept,
        );
        match outcome {
            ScriptedOutcome::Accept => {
                let balance = self.balance.load(Ordering::SeqCst);
                if amount > balance {
                    return Err(ChainError::Rejected {
                        reason: "insufficient funds".into(),
                        client_fault: false,
                    });
                }
                self.balance.fetch_sub(amount, Ordering::SeqCst);
                self.sent
                    .lock()
                    .unwrap()
                    .push((recipient.to_string(), amount));
                let n = self.tx_counter.fetch_add(1, Ordering::SeqCst);
                Ok(format!("FAKETX{n:08}"))
            }
            ScriptedOutcome::Reject {
                reason,
                client_fault,
            } => Err(ChainError::Rejected {
                reason,
                client_fault,
            }),
            ScriptedOutcome::Unreachable => {
                Err(ChainError::NodeUnreachable("connection refused".into()))
            }
        }
    }

    async fn balance(&self) -> Result<u64, ChainError> {
        Ok(self.balance.load(Ordering::SeqCst))
    }

    async fn height(&self) -> Result<u64, ChainError> {
        Ok(self.height.load(Ordering::SeqCst))
    }
}
