use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// Kind byte of an L1-originated message, as recorded by the inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum L1MessageKind {
    /// A message carrying one or more L2 transactions.
    L2Message = 3,
    /// Marks the end of an L2 block.
    EndOfBlock = 6,
    /// An L2 message funded from L1.
    L2FundedByL1 = 7,
    /// A rollup protocol event.
    RollupEvent = 8,
    /// A retryable ticket submission.
    SubmitRetryable = 9,
    /// A batch used only for gas estimation.
    BatchForGasEstimation = 10,
    /// Chain initialization message.
    Initialize = 11,
    /// An ether deposit from L1.
    EthDeposit = 12,
    /// A batch posting report.
    BatchPostingReport = 13,
    /// An invalid message; executed as a no-op.
    Invalid = 0xFF,
}

/// Header of an L1-originated message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct L1IncomingMessageHeader {
    /// Message kind byte.
    pub kind: L1MessageKind,
    /// L1 address the message originates from.
    pub sender: Address,
    /// L1 block number the message was posted in.
    pub block_number: u64,
    /// L1 timestamp of the message.
    pub timestamp: u64,
    /// Inbox request id. For delayed messages the last eight bytes carry the
    /// big-endian delayed message index.
    pub request_id: Option<B256>,
    /// L1 base fee observed when the message was posted.
    pub base_fee_l1: U256,
}

impl L1IncomingMessageHeader {
    /// Extracts the delayed message index encoded in the request id, if any.
    pub fn delayed_index(&self) -> Option<u64> {
        self.request_id.map(|id| {
            let tail: [u8; 8] = id[24..32].try_into().expect("request id tail is 8 bytes");
            u64::from_be_bytes(tail)
        })
    }
}

/// An L1-originated message together with its L2 payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct L1IncomingMessage {
    /// Message header.
    pub header: L1IncomingMessageHeader,
    /// Serialized L2 message payload.
    pub l2_msg: Bytes,
}

/// A delayed message awaiting sequencing, tagged with its absolute index.
///
/// Immutable once enqueued; indices within one enqueued batch are contiguous
/// and monotonically increasing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayedMessage {
    /// The L1-originated message.
    pub message: L1IncomingMessage,
    /// Absolute delayed message index.
    pub index: u64,
}

/// A message paired with the count of delayed messages read after it, the
/// form consumed by block production.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageWithMetadata {
    /// The inbound message.
    pub message: L1IncomingMessage,
    /// Number of delayed messages read once this message is processed.
    pub delayed_messages_read: u64,
}

impl MessageWithMetadata {
    /// Pairs a message with its delayed-messages-read count.
    pub fn new(message: L1IncomingMessage, delayed_messages_read: u64) -> Self {
        Self {
            message,
            delayed_messages_read,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::b256;

    #[test]
    fn delayed_index_reads_request_id_tail() {
        let header = L1IncomingMessageHeader {
            kind: L1MessageKind::EthDeposit,
            sender: Address::ZERO,
            block_number: 10,
            timestamp: 1_700_000_000,
            request_id: Some(b256!(
                "000000000000000000000000000000000000000000000000000000000000002a"
            )),
            base_fee_l1: U256::ZERO,
        };

        assert_eq!(header.delayed_index(), Some(42));
    }

    #[test]
    fn delayed_index_absent_without_request_id() {
        let header = L1IncomingMessageHeader {
            kind: L1MessageKind::L2Message,
            sender: Address::ZERO,
            block_number: 0,
            timestamp: 0,
            request_id: None,
            base_fee_l1: U256::ZERO,
        };

        assert_eq!(header.delayed_index(), None);
    }
}
