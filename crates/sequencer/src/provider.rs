//! Collaborator contract between the sequencer and the execution node.

use alloy_primitives::Address;
use async_trait::async_trait;
use orbit_primitives::{Block, BlockHeader, MessageWithMetadata};

/// Payload handed to block production: the message to execute and the target
/// block number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadAttributes {
    /// The message the block is built from.
    pub message_with_metadata: MessageWithMetadata,
    /// Target block number.
    pub number: u64,
}

/// Everything the sequencer needs from the execution side of the node: the
/// chain head, account nonces, block production, and the L1 price-data cache
/// primed after delayed-message blocks.
///
/// Block production failure is signaled by `Ok(None)` or an error; both are
/// treated the same by the engine.
#[async_trait]
pub trait ExecutionProvider: Send + Sync {
    /// Current chain head header, if the chain has one.
    async fn head_header(&self) -> anyhow::Result<Option<BlockHeader>>;

    /// Account nonce at the given head, read from persistent state.
    async fn account_nonce(&self, head: &BlockHeader, address: Address) -> anyhow::Result<u64>;

    /// Builds one block on top of `parent` from the given payload.
    async fn build_block(
        &self,
        parent: &BlockHeader,
        payload: PayloadAttributes,
    ) -> anyhow::Result<Option<Block>>;

    /// Primes the L1 price-data cache for a freshly sequenced block.
    fn cache_l1_price_data(&self, msg_idx: u64, block: &Block, built_using_delayed_message: bool);
}
