//! Sequence-number discipline for the single hot key.
//!
//! The node enforces a monotonic per-account sequence number. Two concurrent
//! `send` calls that both read "current sequence from chain" would race and
//! produce a sequence-mismatch rejection, so this cache plus the caller's
//! serialization (see [`crate::chain::rpc::TendermintChainClient`], which
//! holds the single-slot lock around the whole send) is what gives the
//! "consecutive sequences, no mismatches" guarantee under N parallel
//! dispenses.

use tokio::sync::Mutex;

pub struct HotKeySequencer {
    cached: Mutex<Option<u64>>,
}

impl HotKeySequencer {
    pub fn new() -> Self {
        Self {
            cached: Mutex::new(None),
        }
    }

    /// Returns the sequence to use for the next transaction, given the
    /// chain's current view (fetched by the caller under the same lock that
    /// will be held through signing and broadcast). Reserves `chain_seq + 1`
    /// (or `cached + 1` if our cache is ahead of the chain, e.g. chain
    /// queries lag behind our own just-broadcast transactions).
    pub async fn reserve_next(&self, chain_seq: u64) -> SequenceGuard<'_> {
        let mut guard = self.cached.lock().await;
        let to_use = match *guard {
            Some(cached) => cached.max(chain_seq),
            None => chain_seq,
        };
        *guard = Some(to_use + 1);
        SequenceGuard {
            cache: guard,
            sequence: to_use,
        }
    }
}

impl Default for HotKeySequencer {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds the sequencer's lock for the lifetime of one send attempt. Dropping
/// it without calling [`SequenceGuard::rollback`] leaves the reservation in
/// place (the common, successful-or-ambiguous-failure path: we must not
/// reuse a sequence that may have already reached the mempool).
pub struct SequenceGuard<'a> {
    cache: tokio::sync::MutexGuard<'a, Option<u64>>,
    sequence: u64,
}

impl<'a> SequenceGuard<'a> {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Only safe to call for failures known to have never reached the node
    /// (e.g. local signing failure before any network call) — rolling back
    /// after an ambiguous broadcast failure would let a second transaction
    /// reuse a sequence that may already be in the mempool.
    pub fn rollback(mut self) {
        *self.cache = Some(self.sequence);
    }
}
