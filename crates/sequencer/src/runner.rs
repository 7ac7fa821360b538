//! The sequencer engine: decides in what order and when pending user
//! transactions and L1-originated delayed messages become L2 blocks.
//!
//! Each tick forwards queued transactions when the node is not sequencing,
//! otherwise sequences at most one pending delayed message, and only then
//! attempts one block of pre-validated user transactions. Delayed messages
//! always win: their global index ordering must never be interleaved with
//! speculative nonce admission.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use alloy_consensus::TxEnvelope;
use alloy_primitives::Address;
use anyhow::{anyhow, Context};
use futures::future::join_all;
use orbit_common::SequencerConfig;
use orbit_primitives::l2_message::assemble_from_signed_transactions;
use orbit_primitives::{Block, BlockHeader, ChainParams, L1IncomingMessage, MessageWithMetadata};
use parking_lot::Mutex;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::delayed_queue::DelayedMessageQueue;
use crate::error::{ForwardError, SequencerError};
use crate::metrics::SEQUENCER_METRICS as SM;
use crate::nonce_cache::NonceCache;
use crate::nonce_failures::NonceFailureCache;
use crate::provider::{ExecutionProvider, PayloadAttributes};
use crate::state::{SequencerMode, SequencerState};
use crate::tx_queue::{QueuedTransaction, TransactionQueue};
use crate::types::{
    MessageResult, PendingRegularBlock, SequencedBlockInfo, SequencedL2Msg, TickResult,
};

/// The sequencing engine.
///
/// Owns the single block-building permit: delayed-message sequencing,
/// regular block building, post-reorg resequencing, and price-cache priming
/// are mutually exclusive system-wide. The poll paths acquire it
/// non-blockingly so the loop never stalls behind an externally driven
/// operation; resequencing and priming await it.
pub struct SequencerEngine<E: ExecutionProvider> {
    provider: Arc<E>,
    chain: ChainParams,
    config: SequencerConfig,
    tx_queue: Arc<TransactionQueue>,
    delayed_queue: Arc<DelayedMessageQueue>,
    state: Arc<SequencerState>,
    block_permit: Semaphore,
    nonce_cache: Mutex<NonceCache>,
    nonce_failures: Mutex<NonceFailureCache>,
    /// Most recent delayed-message block, until its caches are primed.
    last_sequenced: Mutex<Option<SequencedBlockInfo>>,
    /// Most recent regular-transaction block, until `end_sequencing`
    /// reports its outcome.
    pending_regular: Mutex<Option<PendingRegularBlock>>,
}

impl<E: ExecutionProvider> SequencerEngine<E> {
    pub fn new(
        provider: Arc<E>,
        chain: ChainParams,
        config: SequencerConfig,
        tx_queue: Arc<TransactionQueue>,
        delayed_queue: Arc<DelayedMessageQueue>,
        state: Arc<SequencerState>,
    ) -> Self {
        let nonce_cache = NonceCache::new(config.nonce_cache_size);
        let nonce_failures = NonceFailureCache::new(
            config.nonce_cache_size as usize,
            config.nonce_failure_ttl(),
        );

        Self {
            provider,
            chain,
            config,
            tx_queue,
            delayed_queue,
            state,
            block_permit: Semaphore::new(1),
            nonce_cache: Mutex::new(nonce_cache),
            nonce_failures: Mutex::new(nonce_failures),
            last_sequenced: Mutex::new(None),
            pending_regular: Mutex::new(None),
        }
    }

    /// The intake queue backing `submit`.
    pub fn transaction_queue(&self) -> &Arc<TransactionQueue> {
        &self.tx_queue
    }

    /// The activity state shared with admin surfaces.
    pub fn sequencer_state(&self) -> &Arc<SequencerState> {
        &self.state
    }

    /// Submits a transaction and waits for its settlement: `Ok(())` once it
    /// is included in some block (success or revert alike), an error when it
    /// is definitively rejected.
    pub async fn submit(
        &self,
        tx: TxEnvelope,
        sender: Address,
        cancellation: CancellationToken,
    ) -> Result<(), SequencerError> {
        self.tx_queue.submit(tx, sender, cancellation).await
    }

    /// One step of the sequencing control loop.
    pub async fn tick(&self) -> TickResult {
        if !self.state.is_active() {
            if self.state.mode() == SequencerMode::Forwarding {
                let pending_items = self.tx_queue.drain_batch();
                if !pending_items.is_empty() {
                    self.handle_inactive(pending_items).await;
                }
            }

            return TickResult::idle(self.config.inactive_wait());
        }

        match self.sequence_delayed_message().await {
            Ok(Some(sequenced)) => return TickResult::sequenced(sequenced),
            Ok(None) => {}
            // Already logged; the queue was cleared and the inbox will
            // re-deliver from the chain's recorded delayed index.
            Err(_) => return TickResult::idle(self.config.max_block_speed()),
        }

        if let Some(sequenced) = self.create_block_with_regular_txs().await {
            return TickResult::sequenced(sequenced);
        }

        TickResult::idle(self.config.max_block_speed())
    }

    /// Reports the outcome of the last regular-transaction block. On error
    /// every transaction of that block returns to the retry queue; on
    /// success the nonce cache adopts the block and every transaction
    /// settles as included.
    pub fn end_sequencing(&self, error: Option<anyhow::Error>) {
        let Some(pending) = self.pending_regular.lock().take() else {
            return;
        };

        if let Some(error) = error {
            warn!(
                "Block with user transactions was not committed: {error:#}; retrying its transactions"
            );
            for item in pending.items {
                self.tx_queue.push_retry(item);
            }
            return;
        }

        self.nonce_cache.lock().finalize(&pending.block);

        // All sequenced txs are in the block; execution failures are visible
        // via the receipt status code.
        for item in pending.items {
            item.settle(Ok(()));
        }
    }

    /// Primes the L1 price-data cache for the most recently built
    /// delayed-message block. Serializes with the poll loop on the build
    /// permit.
    pub async fn append_last_sequenced_block(&self) -> anyhow::Result<()> {
        let _permit = self.block_permit.acquire().await?;

        let Some(info) = self.last_sequenced.lock().take() else {
            warn!("append_last_sequenced_block called but no sequenced block info available");
            return Ok(());
        };

        self.provider
            .cache_l1_price_data(info.msg_idx, &info.block, true);
        Ok(())
    }

    /// Appends delayed messages with indices `first_index, first_index + 1,
    /// ...` for sequencing in strict index order.
    pub fn enqueue_delayed_messages(&self, messages: Vec<L1IncomingMessage>, first_index: u64) {
        let count = messages.len();
        self.delayed_queue.enqueue(messages, first_index);

        debug!("Enqueued {count} delayed messages starting at index {first_index}");
    }

    /// Next delayed message index the inbox should produce.
    pub async fn next_delayed_message_number(&self) -> anyhow::Result<u64> {
        if let Some(tail) = self.delayed_queue.peek_tail_index() {
            return Ok(tail + 1);
        }

        let head = self
            .provider
            .head_header()
            .await?
            .ok_or_else(|| anyhow!("Chain head is not available"))?;
        Ok(head.delayed_messages_read)
    }

    /// Re-applies one previously sequenced message after a reorg, waiting
    /// for the build permit instead of skipping a turn.
    pub async fn resequence_reorged_message(
        &self,
        msg: MessageWithMetadata,
    ) -> anyhow::Result<Option<SequencedL2Msg>> {
        let _permit = self.block_permit.acquire().await?;

        if let Some(delayed_idx) = msg.message.header.delayed_index() {
            let head = self.head_header().await?;
            if delayed_idx != head.delayed_messages_read {
                info!(
                    "Not resequencing delayed message due to unexpected index, expected {} found {delayed_idx}",
                    head.delayed_messages_read
                );
                return Ok(None);
            }

            return self
                .sequence_delayed_with_permit(&msg.message, delayed_idx)
                .await;
        }

        self.resequence_regular_with_permit(msg).await
    }

    pub fn pause(&self) {
        self.state.pause();

        info!("Sequencer paused");
    }

    pub fn activate(&self) {
        self.state.activate();

        info!("Sequencer activated");
    }

    pub fn forward_to(&self, url: &str) -> anyhow::Result<()> {
        self.state.forward_to(url)?;

        info!("Sequencer forwarding to {url}");
        Ok(())
    }

    /// Drives `tick` until cancellation, publishing every sequenced message
    /// to `sequenced_tx` and sleeping for the suggested poll delay between
    /// idle ticks.
    pub async fn run(
        self: Arc<Self>,
        sequenced_tx: mpsc::UnboundedSender<SequencedL2Msg>,
        cancellation_token: CancellationToken,
    ) {
        loop {
            if cancellation_token.is_cancelled() {
                info!("Shutting down sequencer");
                return;
            }

            let TickResult {
                sequenced,
                next_poll,
            } = self.tick().await;

            if let Some(msg) = sequenced {
                if sequenced_tx.send(msg).is_err() {
                    warn!("Sequenced message consumer dropped, shutting down sequencer");
                    return;
                }
            }

            if next_poll.is_zero() {
                continue;
            }

            tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => {
                    info!("Shutting down sequencer");
                    return;
                }
                _ = tokio::time::sleep(next_poll) => {}
            }
        }
    }

    /// Forwards drained transactions to the backup sequencer, concurrently.
    /// A backup that has no sequencer either sends the item back to the
    /// retry queue; every other failure settles the submitter.
    async fn handle_inactive(&self, queue_items: Vec<QueuedTransaction>) {
        let Some(forwarder) = self.state.forwarder() else {
            return;
        };

        let forwards = queue_items.into_iter().map(|item| {
            let forwarder = forwarder.clone();
            async move {
                let result = forwarder
                    .forward_transaction(&item.tx, &item.cancellation)
                    .await;
                (item, result)
            }
        });

        for (item, result) in join_all(forwards).await {
            match result {
                Ok(()) => item.settle(Ok(())),
                Err(ForwardError::NoSequencer(_)) => self.tx_queue.push_retry(item),
                Err(error) => item.settle(Err(SequencerError::Forward(error))),
            }
        }

        self.nonce_failures.lock().clear();
    }

    async fn sequence_delayed_message(&self) -> anyhow::Result<Option<SequencedL2Msg>> {
        let Some(delayed) = self.delayed_queue.try_dequeue() else {
            return Ok(None);
        };

        let permit = match self.block_permit.try_acquire() {
            Ok(permit) => permit,
            Err(_) => {
                debug!("Could not acquire block creation permit for delayed message sequencing");
                self.delayed_queue.requeue_front(delayed);
                return Ok(None);
            }
        };

        let result = self
            .sequence_delayed_with_permit(&delayed.message, delayed.index)
            .await;
        drop(permit);

        match result {
            Ok(sequenced) => Ok(sequenced),
            Err(error) => {
                error!(
                    index = delayed.index,
                    "Error sequencing delayed message: {error:#}"
                );
                self.delayed_queue.clear();
                Err(error)
            }
        }
    }

    async fn sequence_delayed_with_permit(
        &self,
        message: &L1IncomingMessage,
        delayed_idx: u64,
    ) -> anyhow::Result<Option<SequencedL2Msg>> {
        let head = self
            .head_header()
            .await
            .with_context(|| format!("Unable to sequence delayed message {delayed_idx}"))?;

        let expected_delayed_idx = head.delayed_messages_read;
        if expected_delayed_idx != delayed_idx {
            error!("Wrong delayed message sequenced, got {delayed_idx} expected {expected_delayed_idx}");
            return Ok(None);
        }

        let number = head.number + 1;
        let msg_idx = self.chain.block_number_to_message_index(number);
        let message = MessageWithMetadata::new(message.clone(), delayed_idx + 1);
        let payload = PayloadAttributes {
            message_with_metadata: message.clone(),
            number,
        };

        let started = Instant::now();
        let block = self
            .provider
            .build_block(&head, payload)
            .await?
            .filter(|block| !block.hash().is_zero())
            .ok_or_else(|| {
                anyhow!(
                    "Failed to build block {number} or block has no hash for delayed message index {delayed_idx}"
                )
            })?;
        SM.block_production_execution
            .record(started.elapsed().as_secs_f64());
        SM.delayed_msgs_sequenced.increment(1);

        *self.last_sequenced.lock() = Some(SequencedBlockInfo {
            block: block.clone(),
            msg_idx,
        });

        info!(
            msg_idx,
            delayed_idx,
            block_number = block.number(),
            "Added delayed message"
        );

        Ok(Some(build_sequenced_msg(&block, msg_idx, message)))
    }

    async fn create_block_with_regular_txs(&self) -> Option<SequencedL2Msg> {
        // The previous block's outcome is not known yet; building another
        // would orphan its settlement bookkeeping.
        if self.pending_regular.lock().is_some() {
            return None;
        }

        let queue_items = self.tx_queue.drain_batch();
        if queue_items.is_empty() {
            return None;
        }

        let mut live_items = Vec::with_capacity(queue_items.len());
        for item in queue_items {
            if item.cancellation.is_cancelled() {
                item.settle(Err(SequencerError::Cancelled));
            } else {
                live_items.push(item);
            }
        }
        if live_items.is_empty() {
            return None;
        }

        let head = match self.provider.head_header().await {
            Ok(Some(head)) => head,
            Ok(None) => {
                warn!("No chain head available for user transaction sequencing");
                self.retry_all(live_items);
                return None;
            }
            Err(error) => {
                error!("Failed to read chain head: {error:#}");
                self.retry_all(live_items);
                return None;
            }
        };

        {
            self.nonce_cache.lock().begin_new_block();
            self.nonce_failures.lock().evict_expired();
        }

        let admitted = self.precheck_nonces(&head, live_items).await;
        if admitted.is_empty() {
            return None;
        }

        let permit = match self.block_permit.try_acquire() {
            Ok(permit) => permit,
            Err(_) => {
                self.retry_all(admitted);
                debug!("Could not acquire block creation permit for user transaction sequencing");
                return None;
            }
        };

        let started = Instant::now();
        let build_result = self.build_regular_block(&admitted).await;
        drop(permit);
        SM.block_production_execution
            .record(started.elapsed().as_secs_f64());

        match build_result {
            Ok((block, msg_idx, message)) => {
                info!(
                    tx_count = admitted.len(),
                    msg_idx,
                    block_number = block.number(),
                    "Created block with user transactions"
                );

                let sequenced = build_sequenced_msg(&block, msg_idx, message);
                *self.pending_regular.lock() = Some(PendingRegularBlock {
                    block,
                    items: admitted,
                });
                Some(sequenced)
            }
            Err(error) => {
                error!("Error creating block with regular transactions: {error:#}");
                self.retry_all(admitted);
                None
            }
        }
    }

    async fn build_regular_block(
        &self,
        items: &[QueuedTransaction],
    ) -> anyhow::Result<(Block, u64, MessageWithMetadata)> {
        let head = self.head_header().await?;

        let transactions: Vec<TxEnvelope> = items.iter().map(|item| item.tx.clone()).collect();
        let message = assemble_from_signed_transactions(&transactions, &head, 0);

        let number = head.number + 1;
        let msg_idx = self.chain.block_number_to_message_index(number);
        let payload = PayloadAttributes {
            message_with_metadata: message.clone(),
            number,
        };

        let block = self
            .provider
            .build_block(&head, payload)
            .await?
            .filter(|block| !block.hash().is_zero())
            .ok_or_else(|| anyhow!("Failed to build block {number} or block has no hash"))?;

        Ok((block, msg_idx, message))
    }

    /// Validates transaction nonces against the nonce cache, preserving
    /// submission order per sender. Revived items are processed ahead of the
    /// remaining batch so FIFO-per-sender ordering survives interleaved
    /// nonce failures.
    async fn precheck_nonces(
        &self,
        head: &BlockHeader,
        queue_items: Vec<QueuedTransaction>,
    ) -> Vec<QueuedTransaction> {
        let mut output = Vec::with_capacity(queue_items.len());
        let mut pending_nonces: HashMap<Address, u64> = HashMap::new();
        let mut revived: VecDeque<QueuedTransaction> = VecDeque::new();
        let mut remaining = queue_items.into_iter();

        loop {
            let item = match revived.pop_front() {
                Some(item) => item,
                None => match remaining.next() {
                    Some(item) => item,
                    None => break,
                },
            };
            let sender = item.sender;

            let state_nonce = match self.state_nonce(head, sender).await {
                Ok(nonce) => nonce,
                Err(error) => {
                    warn!(%sender, "Failed to read account nonce: {error:#}; retrying batch later");
                    self.tx_queue.push_retry(item);
                    for item in revived {
                        self.tx_queue.push_retry(item);
                    }
                    for item in remaining {
                        self.tx_queue.push_retry(item);
                    }
                    self.retry_all(output);
                    return Vec::new();
                }
            };

            let pending_nonce = pending_nonces.get(&sender).copied().unwrap_or(state_nonce);
            let tx_nonce = item.nonce();

            if tx_nonce == pending_nonce {
                pending_nonces.insert(sender, tx_nonce + 1);
                self.nonce_cache.lock().update(head, sender, tx_nonce + 1);

                if let Some(next) = self.nonce_failures.lock().try_revive(sender, tx_nonce + 1) {
                    if next.cancellation.is_cancelled() {
                        next.settle(Err(SequencerError::Cancelled));
                    } else {
                        revived.push_back(next);
                    }
                }

                output.push(item);
            } else if tx_nonce < state_nonce {
                item.settle(Err(SequencerError::NonceTooLow {
                    sender,
                    tx_nonce,
                    state_nonce,
                }));
            } else if tx_nonce > pending_nonce {
                self.nonce_failures.lock().add(sender, tx_nonce, item);
            } else {
                // state_nonce <= tx_nonce < pending_nonce: an earlier tx of
                // this batch may still fail at execution time, which would
                // make this nonce valid; the execution engine is the final
                // arbiter of such collisions.
                output.push(item);
            }
        }

        output
    }

    /// Cached next-expected nonce for `sender` at `head`, reading persistent
    /// state once on a cache miss.
    async fn state_nonce(&self, head: &BlockHeader, sender: Address) -> anyhow::Result<u64> {
        if let Some(nonce) = self.nonce_cache.lock().lookup(head, &sender) {
            return Ok(nonce);
        }

        let nonce = self.provider.account_nonce(head, sender).await?;
        self.nonce_cache.lock().prime(head, sender, nonce);
        Ok(nonce)
    }

    async fn resequence_regular_with_permit(
        &self,
        message: MessageWithMetadata,
    ) -> anyhow::Result<Option<SequencedL2Msg>> {
        let head = self.head_header().await?;

        let number = head.number + 1;
        let msg_idx = self.chain.block_number_to_message_index(number);
        let payload = PayloadAttributes {
            message_with_metadata: message.clone(),
            number,
        };

        let block = self
            .provider
            .build_block(&head, payload)
            .await?
            .filter(|block| !block.hash().is_zero())
            .ok_or_else(|| anyhow!("Failed to build block {number} or block has no hash"))?;

        info!(
            msg_idx,
            block_number = block.number(),
            "Resequenced regular message"
        );

        Ok(Some(build_sequenced_msg(&block, msg_idx, message)))
    }

    async fn head_header(&self) -> anyhow::Result<BlockHeader> {
        self.provider
            .head_header()
            .await?
            .ok_or_else(|| anyhow!("Chain head is not available"))
    }

    fn retry_all(&self, items: Vec<QueuedTransaction>) {
        for item in items {
            self.tx_queue.push_retry(item);
        }
    }
}

fn build_sequenced_msg(
    block: &Block,
    msg_idx: u64,
    message: MessageWithMetadata,
) -> SequencedL2Msg {
    let block_metadata = vec![0u8; 1 + (block.transactions.len() + 7) / 8];

    SequencedL2Msg {
        msg_idx,
        message,
        result: MessageResult {
            block_hash: block.hash(),
            send_root: block.header.send_root,
        },
        block_metadata: block_metadata.into(),
    }
}
