//! Production `ChainClient`: talks to a tendermint-RPC node over HTTP.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tendermint_rpc::{Client, HttpClient};

use super::sequencer::HotKeySequencer;
use super::sign::{HotKey, TransferMsg};
use super::{ChainClient, ChainError, TxHash};

/// Budget for the broadcast call itself (awaits mempool acceptance).
const SEND_TIMEOUT: Duration = Duration::from_secs(15);
/// Budget for read-only queries (sequence, balance, height).
const QUERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Bounds a single node round-trip to `budget`, mapping an elapsed deadline
/// to `ChainError::Timeout` rather than letting a hung node block a request
/// handler indefinitely (spec §5's per-external-call deadline).
async fn with_deadline<T, F>(budget: Duration, fut: F) -> Result<T, ChainError>
where
    F: Future<Output = Result<T, ChainError>>,
{
    tokio::time::timeout(budget, fut)
        .await
        .unwrap_or(Err(ChainError::Timeout))
}

pub struct TendermintChainClient {
    rpc: HttpClient,
    hot_key: HotKey,
    hot_address: String,
    denom: String,
    chain_id: String,
    sequencer: HotKeySequencer,
}

impl TendermintChainClient {
    pub fn new(
        node_rpc_url: &str,
        mnemonic: &str,
        hot_address: String,
        denom: String,
        chain_id: String,
    ) -> Result<Self, ChainError> {
        let rpc = HttpClient::new(node_rpc_url)
            .map_err(|e| ChainError::Internal(format!("invalid node RPC url: {e}")))?;
        let hot_key = HotKey::from_mnemonic(mnemonic)?;
        Ok(Self {
            rpc,
            hot_key,
            hot_address,
            denom,
            chain_id,
            sequencer: HotKeySequencer::new(),
        })
    }

    async fn query_account_sequence(&self) -> Result<u64, ChainError> {
        let path = format!("custom/auth/sequence/{}", self.hot_address);
        let resp = with_deadline(QUERY_TIMEOUT, async move {
            self.rpc
                .abci_query(Some(path), vec![], None, false)
                .await
                .map_err(|e| ChainError::NodeUnreachable(e.to_string()))
        })
        .await?;
        if resp.value.is_empty() {
            return Ok(0);
        }
        let mut buf = [0u8; 8];
        let n = resp.value.len().min(8);
        buf[8 - n..].copy_from_slice(&resp.value[resp.value.len() - n..]);
        Ok(u64::from_be_bytes(buf))
    }

    fn classify_rejection(log: &str) -> ChainError {
        let lower = log.to_ascii_lowercase();
        let client_fault = lower.contains("insufficient funds")
            || lower.contains("invalid address")
            || lower.contains("decoding bech32 failed")
            || lower.contains("unknown address");
        ChainError::Rejected {
            reason: log.to_string(),
            client_fault,
        }
    }
}

#[async_trait]
impl ChainClient for TendermintChainClient {
    async fn send(&self, recipient: &str, amount: u64) -> Result<TxHash, ChainError> {
        let chain_seq = self.query_account_sequence().await?;
        let guard = self.sequencer.reserve_next(chain_seq).await;
        let sequence = guard.sequence();

        let msg = TransferMsg {
            from: self.hot_address.clone(),
            to: recipient.to_string(),
            amount,
            denom: self.denom.clone(),
            chain_id: self.chain_id.clone(),
            sequence,
        };

        let signed = match self.hot_key.sign_transfer(msg) {
            Ok(signed) => signed,
            Err(e) => {
                // Never reached the network; safe to give the sequence back.
                guard.rollback();
                return Err(e);
            }
        };

        let bytes = match super::sign::encode_for_broadcast(&signed) {
            Ok(bytes) => bytes,
            Err(e) => {
                guard.rollback();
                return Err(e);
            }
        };

        let response = with_deadline(SEND_TIMEOUT, async move {
            self.rpc
                .broadcast_tx_sync(bytes.into())
                .await
                .map_err(|e| ChainError::NodeUnreachable(e.to_string()))
        })
        .await?;

        // The reservation stands regardless of outcome past this point: the
        // transaction may have reached the mempool even if we classify this
        // as a rejection, so the sequence must not be reused.
        drop(guard);

        if response.code.is_err() {
            return Err(Self::classify_rejection(&response.log));
        }

        Ok(response.hash.to_string())
    }

    async fn balance(&self) -> Result<u64, ChainError> {
        let path = format!("custom/bank/balance/{}/{}", self.hot_address, self.denom);
        let resp = with_deadline(QUERY_TIMEOUT, async move {
            self.rpc
                .abci_query(Some(path), vec![], None, false)
                .await
                .map_err(|e| ChainError::NodeUnreachable(e.to_string()))
        })
        .await?;
        if resp.value.is_empty() {
            return Ok(0);
        }
        let mut buf = [0u8; 8];
        let n = resp.value.len().min(8);
        buf[8 - n..].copy_from_slice(&resp.value[resp.value.len() - n..]);
        Ok(u64::from_be_bytes(buf))
    }

    async fn height(&self) -> Result<u64, ChainError> {
        let status = with_deadline(QUERY_TIMEOUT, async move {
            self.rpc
                .status()
                .await
                .map_err(|e| ChainError::NodeUnreachable(e.to_string()))
        })
        .await?;
        Ok(status.sync_info.latest_block_height.value())
    }
}
