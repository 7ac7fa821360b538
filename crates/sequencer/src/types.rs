//! Types produced and tracked by the sequencer engine.

use std::time::Duration;

use alloy_primitives::{Bytes, B256};
use orbit_primitives::{Block, MessageWithMetadata};

use crate::tx_queue::QueuedTransaction;

/// Result digest of a sequenced message, as reported to feed consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageResult {
    /// Hash of the produced block.
    pub block_hash: B256,
    /// Send root of the produced block.
    pub send_root: B256,
}

/// The outcome of one successful sequencing step: the message index the new
/// block corresponds to, the inbound message that produced it, and the block
/// result digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencedL2Msg {
    /// Message index of the produced block.
    pub msg_idx: u64,
    /// The message the block was built from.
    pub message: MessageWithMetadata,
    /// Block result digest.
    pub result: MessageResult,
    /// Per-transaction metadata bitmap (one header byte plus one bit per
    /// transaction, rounded up).
    pub block_metadata: Bytes,
}

/// What a single engine tick produced, plus how soon to poll again.
#[derive(Debug)]
pub struct TickResult {
    /// The sequenced message, when the tick built a block.
    pub sequenced: Option<SequencedL2Msg>,
    /// Suggested delay before the next tick.
    pub next_poll: Duration,
}

impl TickResult {
    /// A tick that built a block; poll again immediately.
    pub fn sequenced(msg: SequencedL2Msg) -> Self {
        Self {
            sequenced: Some(msg),
            next_poll: Duration::ZERO,
        }
    }

    /// A tick that produced nothing; poll again after `next_poll`.
    pub fn idle(next_poll: Duration) -> Self {
        Self {
            sequenced: None,
            next_poll,
        }
    }
}

/// Bookkeeping for the most recent delayed-message block, kept until its
/// post-sequencing caches are primed.
#[derive(Debug, Clone)]
pub(crate) struct SequencedBlockInfo {
    pub block: Block,
    pub msg_idx: u64,
}

/// A regular-transaction block whose outcome has not been reported yet; the
/// queue items it sequenced are settled or requeued in `end_sequencing`.
#[derive(Debug)]
pub(crate) struct PendingRegularBlock {
    pub block: Block,
    pub items: Vec<QueuedTransaction>,
}
