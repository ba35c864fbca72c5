//! The single ordered algorithm that turns `(ip, recipient, captcha_token)`
//! into either a successful dispense or a classified failure, with correct
//! state in the ledger and limiter on every path.

use std::sync::Arc;

use crate::captcha::CaptchaVerifier;
use crate::chain::{ChainClient, ChainError};
use crate::config::FaucetConfig;
use crate::error::FaucetError;
use crate::ledger::Ledger;
use crate::limiter::{Decision, Limiter};

pub struct DispenseOutcome {
    pub tx_hash: String,
    pub recipient: String,
    pub amount: u64,
}

pub struct Dispenser {
    chain: Arc<dyn ChainClient>,
    ledger: Arc<dyn Ledger>,
    limiter: Arc<dyn Limiter>,
    captcha: Arc<dyn CaptchaVerifier>,
    address_prefix: String,
    amount_per_request: u64,
}

impl Dispenser {
    pub fn new(
        config: &FaucetConfig,
        chain: Arc<dyn ChainClient>,
        ledger: Arc<dyn Ledger>,
        limiter: Arc<dyn Limiter>,
        captcha: Arc<dyn CaptchaVerifier>,
    ) -> Self {
        Self {
            chain,
            ledger,
            limiter,
            captcha,
            address_prefix: config.address_prefix.clone(),
            amount_per_request: config.amount_per_request,
        }
    }

    pub async fn request(
        &self,
        ip: &str,
        recipient: &str,
        captcha_token: &str,
    ) -> Result<DispenseOutcome, FaucetError> {
        // 1. Validate input. Amount always comes from config, never the
        // request body.
        self.validate_recipient(recipient)?;

        // 2. Verify captcha. A missing/empty token in production mode is
        // rejected by the verifier itself without a remote call.
        let captcha_ok = self
            .captcha
            .verify(captcha_token, ip)
            .await
            .map_err(FaucetError::CaptchaUnavailable)?;
        if !captcha_ok {
            return Err(FaucetError::InvalidCaptcha);
        }

        // 3. Check rate limits. No ledger write on denial either way.
        match self.limiter.check(ip, recipient).await {
            Ok(Decision::Allowed) => {}
            Ok(Decision::Denied { retry_after }) => {
                return Err(FaucetError::RateLimited {
                    retry_after_secs: retry_after.as_secs(),
                })
            }
            Err(e) => return Err(FaucetError::LimiterUnavailable(e)),
        }

        // 4. Record the limiter hit. From here on, the IP/address has paid
        // the cost of this request even if later steps fail — deliberate,
        // it keeps a broadcast failure from being a free retry.
        self.limiter
            .record(ip, recipient)
            .await
            .map_err(FaucetError::LimiterUnavailable)?;

        // 5. Reserve the ledger row before any external side effect.
        let request_id = self
            .ledger
            .reserve(recipient, self.amount_per_request as i64, ip)
            .await
            .map_err(FaucetError::LedgerUnavailable)?;

        log::info!(
            "request_id={request_id} reserved recipient={recipient} amount={} ip={ip}",
            self.amount_per_request
        );

        // 6/7. Broadcast and finalize on a detached task: if the client
        // disconnects and this handler's future is dropped, the broadcast
        // and the ledger finalization it guarantees still run to
        // completion instead of leaving the row stuck pending.
        // `PendingGuard` additionally finalizes the row as failed if this
        // task panics before reaching a normal finalize call.
        let chain = self.chain.clone();
        let ledger = self.ledger.clone();
        let recipient = recipient.to_string();
        let amount = self.amount_per_request;

        let join = tokio::spawn(async move {
            let guard = PendingGuard::new(ledger.clone(), request_id);
            let result = broadcast_and_finalize(chain, ledger, request_id, &recipient, amount).await;
            guard.disarm();
            result
        });

        match join.await {
            Ok(result) => result,
            Err(join_err) => Err(FaucetError::Internal(format!(
                "dispense task did not finish cleanly: {join_err}"
            ))),
        }
    }

    fn validate_recipient(&self, recipient: &str) -> Result<(), FaucetError> {
        let (hrp, _data, _variant) =
            bech32::decode(recipient).map_err(|_| FaucetError::InvalidAddress)?;
        if hrp != self.address_prefix {
            return Err(FaucetError::InvalidAddress);
        }
        Ok(())
    }
}

async fn broadcast_and_finalize(
    chain: Arc<dyn ChainClient>,
    ledger: Arc<dyn Ledger>,
    request_id: i64,
    recipient: &str,
    amount: u64,
) -> Result<DispenseOutcome, FaucetError> {
    match chain.send(recipient, amount).await {
        Ok(tx_hash) => {
            if let Err(e) = ledger.complete(request_id, &tx_hash).await {
                log::error!("request_id={request_id} broadcast succeeded but ledger.complete failed: {e}");
                return Err(FaucetError::LedgerUnavailable(e));
            }
            log::info!("request_id={request_id} completed tx_hash={tx_hash}");
            Ok(DispenseOutcome {
                tx_hash,
                recipient: recipient.to_string(),
                amount,
            })
        }
        Err(chain_err) => {
            let (faucet_err, reason) = classify_chain_error(chain_err);
            if let Err(e) = ledger.fail(request_id, &reason).await {
                log::error!("request_id={request_id} broadcast failed ({reason}) and ledger.fail also failed: {e}");
            }
            Err(faucet_err)
        }
    }
}

fn classify_chain_error(err: ChainError) -> (FaucetError, String) {
    match err {
        ChainError::NodeUnreachable(reason) => {
            (FaucetError::NodeUnreachable(ChainError::NodeUnreachable(reason.clone())), reason)
        }
        ChainError::SigningFailed(reason) => {
            (FaucetError::SigningError(ChainError::SigningFailed(reason.clone())), reason)
        }
        ChainError::Rejected {
            reason,
            client_fault,
        } => (
            FaucetError::NodeRejected {
                reason: reason.clone(),
                client_fault,
            },
            reason,
        ),
        ChainError::Timeout => (
            FaucetError::Timeout("chain node did not respond in time".into()),
            "chain node timeout".into(),
        ),
        ChainError::Internal(reason) => {
            (FaucetError::Internal(reason.clone()), reason)
        }
    }
}

/// Finalizes a reservation as failed (reason "aborted") unless disarmed.
/// Backstops the case where the broadcasting task panics between reserving
/// the ledger row and reaching a normal `complete`/`fail` call.
struct PendingGuard {
    ledger: Arc<dyn Ledger>,
    request_id: i64,
    armed: bool,
}

impl PendingGuard {
    fn new(ledger: Arc<dyn Ledger>, request_id: i64) -> Self {
        Self {
            ledger,
            request_id,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let ledger = self.ledger.clone();
        let request_id = self.request_id;
        tokio::spawn(async move {
            if let Err(e) = ledger.fail(request_id, "aborted").await {
                log::error!("request_id={request_id} PendingGuard finalize also failed: {e}");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::captcha::fake::{FakeCaptchaMode, FakeCaptchaVerifier};
    use crate::chain::fake::{FakeChainClient, ScriptedOutcome};
    use crate::ledger::fake::FakeLedger;
    use crate::limiter::fake::FakeLimiter;

    const PREFIX: &str = "paw";
    const AMOUNT: u64 = 100_000_000;

    fn dispenser(
        chain: Arc<FakeChainClient>,
        ledger: Arc<FakeLedger>,
        limiter: Arc<FakeLimiter>,
        captcha_mode: FakeCaptchaMode,
    ) -> Dispenser {
        Dispenser {
            chain,
            ledger,
            limiter,
            captcha: Arc::new(FakeCaptchaVerifier::new(captcha_mode)),
            address_prefix: PREFIX.to_string(),
            amount_per_request: AMOUNT,
        }
    }

    fn valid_address() -> String {
        bech32::encode(PREFIX, bech32::ToBase32::to_base32(&[1u8; 20]), bech32::Variant::Bech32)
            .unwrap()
    }

    #[tokio::test]
    async fn happy_path_completes_and_records_tx_hash() {
        let chain = Arc::new(FakeChainClient::new(AMOUNT * 10));
        let ledger = Arc::new(FakeLedger::new());
        let limiter = Arc::new(FakeLimiter::new(10, 1, Duration::from_secs(86_400)));
        let d = dispenser(chain, ledger.clone(), limiter, FakeCaptchaMode::AlwaysOk);

        let addr = valid_address();
        let outcome = d.request("1.2.3.4", &addr, "ok").await.unwrap();

        assert!(!outcome.tx_hash.is_empty());
        assert_eq!(outcome.amount, AMOUNT);
        let rows = ledger.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, crate::ledger::DispenseStatus::Completed);
        assert_eq!(rows[0].tx_hash.as_deref(), Some(outcome.tx_hash.as_str()));
    }

    #[tokio::test]
    async fn address_cap_of_one_blocks_second_request() {
        let chain = Arc::new(FakeChainClient::new(AMOUNT * 10));
        let ledger = Arc::new(FakeLedger::new());
        let limiter = Arc::new(FakeLimiter::new(10, 1, Duration::from_secs(86_400)));
        let d = dispenser(chain, ledger.clone(), limiter, FakeCaptchaMode::AlwaysOk);

        let addr = valid_address();
        d.request("1.2.3.4", &addr, "ok").await.unwrap();
        let second = d.request("5.6.7.8", &addr, "ok").await;

        assert!(matches!(second, Err(FaucetError::RateLimited { .. })));
        let rows = ledger.rows();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn invalid_address_writes_nothing() {
        let chain = Arc::new(FakeChainClient::new(AMOUNT * 10));
        let ledger = Arc::new(FakeLedger::new());
        let limiter = Arc::new(FakeLimiter::new(10, 1, Duration::from_secs(86_400)));
        let d = dispenser(chain, ledger.clone(), limiter, FakeCaptchaMode::AlwaysOk);

        let result = d.request("1.2.3.4", "not-a-paw-address", "ok").await;

        assert!(matches!(result, Err(FaucetError::InvalidAddress)));
        assert!(ledger.rows().is_empty());
    }

    #[tokio::test]
    async fn captcha_unavailable_writes_nothing_and_is_503() {
        let chain = Arc::new(FakeChainClient::new(AMOUNT * 10));
        let ledger = Arc::new(FakeLedger::new());
        let limiter = Arc::new(FakeLimiter::new(10, 1, Duration::from_secs(86_400)));
        let d = dispenser(chain, ledger.clone(), limiter, FakeCaptchaMode::Unavailable);

        let addr = valid_address();
        let result = d.request("1.2.3.4", &addr, "ok").await;

        assert!(matches!(result, Err(FaucetError::CaptchaUnavailable(_))));
        assert!(ledger.rows().is_empty());
    }

    #[tokio::test]
    async fn node_rejection_fails_the_reservation_but_keeps_the_limiter_hit() {
        let chain = Arc::new(FakeChainClient::new(AMOUNT * 10));
        chain.set_next_outcome(ScriptedOutcome::Reject {
            reason: "insufficient funds".into(),
            client_fault: false,
        });
        let ledger = Arc::new(FakeLedger::new());
        let limiter = Arc::new(FakeLimiter::new(10, 1, Duration::from_secs(86_400)));
        let d = dispenser(chain, ledger.clone(), limiter.clone(), FakeCaptchaMode::AlwaysOk);

        let addr = valid_address();
        let result = d.request("1.2.3.4", &addr, "ok").await;

        assert!(matches!(result, Err(FaucetError::NodeRejected { .. })));
        let rows = ledger.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, crate::ledger::DispenseStatus::Failed);
        assert!(rows[0].error.is_some());

        // The address counter was already debited; a retry is still denied.
        let retry = d.request("1.2.3.4", &addr, "ok").await;
        assert!(matches!(retry, Err(FaucetError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn limiter_unavailable_fails_closed_with_no_ledger_write() {
        let chain = Arc::new(FakeChainClient::new(AMOUNT * 10));
        let ledger = Arc::new(FakeLedger::new());
        let limiter = Arc::new(FakeLimiter::new(10, 1, Duration::from_secs(86_400)));
        limiter.set_unavailable(true);
        let d = dispenser(chain, ledger.clone(), limiter, FakeCaptchaMode::AlwaysOk);

        let addr = valid_address();
        let result = d.request("1.2.3.4", &addr, "ok").await;

        assert!(matches!(result, Err(FaucetError::LimiterUnavailable(_))));
        assert!(ledger.rows().is_empty());
    }
}
