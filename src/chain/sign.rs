//! Hot-key custody and transaction signing.
//!
//! The faucet holds exactly one signing key, derived once at startup from
//! the configured mnemonic and kept in process memory — acceptable for a
//! testnet deployment, never acceptable for a mainnet key.
//!
//! The wire format here is a deliberately simple send-transaction envelope
//! (bincode-encoded, secp256k1/SHA-256 signed) rather than a byte-exact
//! reproduction of any particular chain's transaction protobuf: the faucet's
//! contract with callers is "produces a tx hash the node accepts", not
//! wire compatibility with a specific SDK. See DESIGN.md for the tradeoff.

use bip39::Mnemonic;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::ChainError;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TransferMsg {
    pub from: String,
    pub to: String,
    pub amount: u64,
    pub denom: String,
    pub chain_id: String,
    pub sequence: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SignedTransfer {
    pub msg: TransferMsg,
    pub pubkey: Vec<u8>,
    pub signature: Vec<u8>,
}

/// The hot key. Holds the secp256k1 secret key derived from the configured
/// mnemonic; never exposes it beyond `sign`.
pub struct HotKey {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl HotKey {
    /// Derives the signing key from a BIP-39 mnemonic. Uses the first 32
    /// bytes of the BIP-39 seed directly as the secp256k1 scalar rather than
    /// a full BIP-32/BIP-44 derivation path — a single-hot-key testnet
    /// faucet has no need for an HD tree of child keys, and this keeps the
    /// key material reduction to one well-reviewed hash (PBKDF2, inside
    /// `bip39::Mnemonic::to_seed`) instead of also depending on a BIP-32
    /// implementation for a tree we never branch.
    pub fn from_mnemonic(phrase: &str) -> Result<Self, ChainError> {
        let mnemonic = Mnemonic::parse_normalized(phrase)
            .map_err(|e| ChainError::Internal(format!("invalid mnemonic: {e}")))?;
        let seed = mnemonic.to_seed("");
        let secret_key = SecretKey::from_slice(&seed[..32])
            .map_err(|e| ChainError::Internal(format!("invalid derived key: {e}")))?;
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Ok(Self {
            secret_key,
            public_key,
        })
    }

    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.public_key.serialize().to_vec()
    }

    pub fn sign_transfer(&self, msg: TransferMsg) -> Result<SignedTransfer, ChainError> {
        let canonical = bincode::serialize(&msg)
            .map_err(|e| ChainError::SigningFailed(format!("encode: {e}")))?;
        let digest = Sha256::digest(&canonical);
        let message = Message::from_digest_slice(&digest)
            .map_err(|e| ChainError::SigningFailed(format!("digest: {e}")))?;
        let secp = Secp256k1::new();
        let signature: Signature = secp.sign_ecdsa(&message, &self.secret_key);
        Ok(SignedTransfer {
            msg,
            pubkey: self.public_key_bytes(),
            signature: signature.serialize_compact().to_vec(),
        })
    }
}

pub fn encode_for_broadcast(tx: &SignedTransfer) -> Result<Vec<u8>, ChainError> {
    bincode::serialize(tx).map_err(|e| ChainError::Internal(format!("encode signed tx: {e}")))
}
