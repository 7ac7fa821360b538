//! Short-lived holding area for transactions whose nonce is ahead of what is
//! currently expected. An entry leaves by revival (its predecessor nonce was
//! admitted), by expiry, or by capacity eviction.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use alloy_primitives::Address;
use tracing::debug;

use crate::error::SequencerError;
use crate::metrics::SEQUENCER_METRICS as SM;
use crate::tx_queue::QueuedTransaction;

struct NonceFailure {
    item: QueuedTransaction,
    expiry: Instant,
}

/// At most one entry per `(sender, nonce)`.
pub struct NonceFailureCache {
    entries: HashMap<(Address, u64), NonceFailure>,
    max_size: usize,
    expiry: Duration,
}

impl NonceFailureCache {
    pub fn new(max_size: usize, expiry: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            max_size: max_size.max(1),
            expiry,
        }
    }

    /// Parks an item waiting for its predecessor nonce.
    ///
    /// An item whose slot is taken, or whose deadline (first submission plus
    /// TTL) already passed, is rejected immediately. At capacity, the single
    /// oldest-expiring entry is evicted and failed to make room.
    pub fn add(&mut self, sender: Address, nonce: u64, item: QueuedTransaction) {
        let key = (sender, nonce);
        let expiry = item.first_seen + self.expiry;

        if self.entries.contains_key(&key) || Instant::now() > expiry {
            item.settle(Err(SequencerError::NonceTooHigh { sender, nonce }));
            return;
        }

        if self.entries.len() >= self.max_size {
            self.evict_oldest();
        }

        debug!(%sender, nonce, "Parked transaction with out-of-order nonce");
        self.entries.insert(key, NonceFailure { item, expiry });
        SM.nonce_failures.set(self.entries.len() as f64);
    }

    /// Removes and returns the entry for `(sender, nonce)`, if any. Called
    /// right after nonce `nonce - 1` was admitted.
    pub fn try_revive(&mut self, sender: Address, nonce: u64) -> Option<QueuedTransaction> {
        let entry = self.entries.remove(&(sender, nonce))?;
        SM.nonce_failures.set(self.entries.len() as f64);
        Some(entry.item)
    }

    /// Fails and removes every entry past its deadline. Called once at the
    /// start of each batch admission pass.
    pub fn evict_expired(&mut self) {
        let now = Instant::now();
        let expired: Vec<(Address, u64)> = self
            .entries
            .iter()
            .filter(|(_, failure)| now > failure.expiry)
            .map(|(key, _)| *key)
            .collect();

        for key in expired {
            if let Some(failure) = self.entries.remove(&key) {
                let (sender, nonce) = key;
                failure
                    .item
                    .settle(Err(SequencerError::NonceFailureExpired { sender, nonce }));
                SM.nonce_failures_expired.increment(1);
            }
        }
        SM.nonce_failures.set(self.entries.len() as f64);
    }

    /// Fails every entry; used when sequencing is disabled.
    pub fn clear(&mut self) {
        for (_, failure) in self.entries.drain() {
            failure.item.settle(Err(SequencerError::SequencingDisabled));
        }
        SM.nonce_failures.set(0.0);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, failure)| failure.expiry)
            .map(|(key, _)| *key);

        if let Some(key) = oldest {
            if let Some(failure) = self.entries.remove(&key) {
                failure.item.settle(Err(SequencerError::NonceFailureOverflow));
            }
        }
    }
}
