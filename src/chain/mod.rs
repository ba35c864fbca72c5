//! Contract to the remote chain node: build, sign, and broadcast a single
//! send transaction; query balance and height. Nothing outside this module
//! ever sees the hot key.

#[cfg(any(test, feature = "test-util"))]
pub mod fake;
pub mod rpc;
pub mod sequencer;
pub mod sign;

use async_trait::async_trait;

pub use rpc::TendermintChainClient;

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("node unreachable: {0}")]
    NodeUnreachable(String),
    #[error("signing failed: {0}")]
    SigningFailed(String),
    #[error("node rejected transaction: {reason}")]
    Rejected { reason: String, client_fault: bool },
    #[error("request to node timed out")]
    Timeout,
    #[error("internal chain client error: {0}")]
    Internal(String),
}

/// Outcome of a successful broadcast: the chain-assigned transaction hash.
pub type TxHash = String;

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Build a transfer of `amount` of the configured denom from the hot
    /// address to `recipient`, sign it with the hot key, and broadcast
    /// synchronously (mempool acceptance, not block inclusion).
    ///
    /// Not idempotent: callers must not retry the same logical request on an
    /// ambiguous failure. `Send` calls for the hot key MUST be serialized by
    /// the implementation so that two concurrent dispenses produce two
    /// transactions with consecutive sequence numbers.
    async fn send(&self, recipient: &str, amount: u64) -> Result<TxHash, ChainError>;

    /// Current balance of the hot address in the configured denom.
    async fn balance(&self) -> Result<u64, ChainError>;

    /// Latest block height reported by the node; used as a liveness probe.
    async fn height(&self) -> Result<u64, ChainError>;
}
