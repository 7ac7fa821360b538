//! Bounded transaction intake queue with retry semantics.
//!
//! Submitters enqueue a transaction and await a single settlement: no error
//! once the transaction lands in some block, or a definitive rejection.
//! Settlement itself is performed by the engine; the queue only moves items
//! around.

use std::collections::VecDeque;
use std::time::Instant;

use alloy_consensus::{Transaction, TxEnvelope};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{Address, B256};
use orbit_common::SequencerConfig;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::SequencerError;
use crate::metrics::SEQUENCER_METRICS as SM;

/// A submitted transaction while it is owned by the queue or the engine.
///
/// The settlement slot is written exactly once: `settle` consumes the item,
/// so a settled item cannot be requeued and a requeued item cannot have been
/// settled.
#[derive(Debug)]
pub struct QueuedTransaction {
    /// The transaction to be processed.
    pub tx: TxEnvelope,
    /// Recovered sender of the transaction.
    pub sender: Address,
    /// Size in bytes of the canonical wire encoding.
    pub tx_size: usize,
    /// Cancellation signal of the original request context.
    pub cancellation: CancellationToken,
    /// When this transaction was first submitted to the queue.
    pub first_seen: Instant,
    responder: oneshot::Sender<Result<(), SequencerError>>,
}

impl QueuedTransaction {
    fn new(
        tx: TxEnvelope,
        sender: Address,
        tx_size: usize,
        cancellation: CancellationToken,
    ) -> (Self, oneshot::Receiver<Result<(), SequencerError>>) {
        let (responder, settlement) = oneshot::channel();
        (
            Self {
                tx,
                sender,
                tx_size,
                cancellation,
                first_seen: Instant::now(),
                responder,
            },
            settlement,
        )
    }

    /// Transaction hash.
    pub fn hash(&self) -> B256 {
        *self.tx.tx_hash()
    }

    /// Transaction nonce.
    pub fn nonce(&self) -> u64 {
        self.tx.nonce()
    }

    /// Builds a queue item outside the queue, exposing its settlement slot.
    #[cfg(test)]
    pub(crate) fn new_for_test(
        tx: TxEnvelope,
        sender: Address,
        cancellation: CancellationToken,
    ) -> (Self, oneshot::Receiver<Result<(), SequencerError>>) {
        let tx_size = tx.encode_2718_len();
        Self::new(tx, sender, tx_size, cancellation)
    }

    /// Reports the final outcome to the submitter. A submitter that stopped
    /// waiting (timeout, dropped connection) is tolerated.
    pub fn settle(self, result: Result<(), SequencerError>) {
        if self.responder.send(result).is_err() {
            debug!(
                tx_hash = %self.tx.tx_hash(),
                "Submitter gone before transaction settled"
            );
        }
    }
}

/// Bounded concurrent intake queue plus an unbounded retry queue consulted
/// first on every drain.
pub struct TransactionQueue {
    intake_tx: mpsc::Sender<QueuedTransaction>,
    intake_rx: Mutex<mpsc::Receiver<QueuedTransaction>>,
    retry_queue: Mutex<VecDeque<QueuedTransaction>>,
    config: SequencerConfig,
}

impl TransactionQueue {
    pub fn new(config: SequencerConfig) -> Self {
        let (intake_tx, intake_rx) = mpsc::channel(config.max_queue_size.max(1));
        Self {
            intake_tx,
            intake_rx: Mutex::new(intake_rx),
            retry_queue: Mutex::new(VecDeque::new()),
            config,
        }
    }

    /// Enqueues a transaction and waits for its settlement.
    ///
    /// Blocks while the queue is full, up to the configured queue timeout;
    /// waiting for the settlement itself is bounded by twice that value.
    pub async fn submit(
        &self,
        tx: TxEnvelope,
        sender: Address,
        cancellation: CancellationToken,
    ) -> Result<(), SequencerError> {
        let tx_size = tx.encode_2718_len();
        let limit = self.config.max_tx_data_size;
        if limit > 0 && tx_size > limit {
            SM.txs_rejected.increment(1);
            return Err(SequencerError::TxTooLarge {
                size: tx_size,
                limit,
            });
        }

        let (item, settlement) = QueuedTransaction::new(tx, sender, tx_size, cancellation);
        let tx_hash = item.hash();
        let queue_timeout = self.config.queue_timeout();

        match timeout(queue_timeout, self.intake_tx.send(item)).await {
            Err(_) => {
                SM.txs_rejected.increment(1);
                return Err(SequencerError::QueueTimeout);
            }
            Ok(Err(_)) => return Err(SequencerError::QueueClosed),
            Ok(Ok(())) => {}
        }

        SM.txs_enqueued.increment(1);
        SM.queue_txs.set(self.queue_len() as f64);
        debug!(%tx_hash, tx_size, "Enqueued transaction");

        match timeout(queue_timeout * 2, settlement).await {
            Err(_) => Err(SequencerError::QueueTimeout),
            Ok(Err(_)) => Err(SequencerError::QueueClosed),
            Ok(Ok(result)) => result,
        }
    }

    /// Atomically drains everything currently available: all retry items
    /// first (they were admitted earlier), then all waiting intake items.
    pub fn drain_batch(&self) -> Vec<QueuedTransaction> {
        let mut items: Vec<QueuedTransaction> = self.retry_queue.lock().drain(..).collect();

        {
            let mut intake = self.intake_rx.lock();
            while let Ok(item) = intake.try_recv() {
                items.push(item);
            }
        }

        if !items.is_empty() {
            SM.txs_dequeued.increment(items.len() as u64);
            SM.queue_txs.set(self.queue_len() as f64);
            SM.retry_queue_txs.set(0.0);
            debug!(count = items.len(), "Drained transaction batch");
        }

        items
    }

    /// Requeues an item for the next sequencing attempt without settling it.
    pub fn push_retry(&self, item: QueuedTransaction) {
        debug!(tx_hash = %item.tx.tx_hash(), "Moved transaction to retry queue");
        let mut retry_queue = self.retry_queue.lock();
        retry_queue.push_back(item);
        SM.retry_queue_txs.set(retry_queue.len() as f64);
    }

    /// Number of transactions waiting in the intake queue.
    pub fn queue_len(&self) -> usize {
        self.config.max_queue_size.max(1) - self.intake_tx.capacity()
    }

    /// Number of transactions waiting in the retry queue.
    pub fn retry_len(&self) -> usize {
        self.retry_queue.lock().len()
    }
}
