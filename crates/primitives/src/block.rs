use alloy_consensus::TxEnvelope;
use alloy_primitives::B256;

/// The header fields sequencing depends on.
///
/// The chain store owns the full header; this view carries block identity,
/// the parent link, and the delayed message count the chain encodes in the
/// header nonce field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockHeader {
    /// Block number.
    pub number: u64,
    /// Block hash.
    pub hash: B256,
    /// Parent block hash.
    pub parent_hash: B256,
    /// Block timestamp.
    pub timestamp: u64,
    /// Count of delayed messages read up to and including this block; the
    /// next delayed message to sequence carries exactly this index.
    pub delayed_messages_read: u64,
    /// Root of the outgoing (L2 to L1) send tree.
    pub send_root: B256,
}

/// A produced L2 block: header plus the transactions it sequenced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Block header.
    pub header: BlockHeader,
    /// Transactions included in the block, in sequencing order.
    pub transactions: Vec<TxEnvelope>,
}

impl Block {
    /// Hash of the block.
    pub fn hash(&self) -> B256 {
        self.header.hash
    }

    /// Number of the block.
    pub fn number(&self) -> u64 {
        self.header.number
    }
}
