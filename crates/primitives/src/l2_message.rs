use alloy_consensus::TxEnvelope;
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{address, Address, Bytes, U256};

use crate::block::BlockHeader;
use crate::message::{L1IncomingMessage, L1IncomingMessageHeader, L1MessageKind, MessageWithMetadata};

/// Sender address stamped on sequencer-assembled L2 messages.
pub const BATCH_POSTER_ADDRESS: Address = address!("a4b000000000000000000073657175656e636572");

/// Kind byte of an entry inside an L2 message payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum L2MessageKind {
    /// A batch of nested L2 messages, each 8-byte length prefixed.
    Batch = 3,
    /// A single signed transaction in its canonical wire encoding.
    SignedTx = 4,
}

/// Assembles signed user transactions into the message form block production
/// consumes. Inverse of the L2 message parser on the ingestion side.
pub fn assemble_from_signed_transactions(
    transactions: &[TxEnvelope],
    parent_header: &BlockHeader,
    l1_block_number: u64,
) -> MessageWithMetadata {
    let header = L1IncomingMessageHeader {
        kind: L1MessageKind::L2Message,
        sender: BATCH_POSTER_ADDRESS,
        block_number: l1_block_number,
        timestamp: parent_header.timestamp,
        request_id: None,
        base_fee_l1: U256::ZERO,
    };

    let message = L1IncomingMessage {
        header,
        l2_msg: serialize_l2_message(transactions),
    };

    MessageWithMetadata::new(message, parent_header.delayed_messages_read)
}

fn serialize_l2_message(transactions: &[TxEnvelope]) -> Bytes {
    if let [tx] = transactions {
        return serialize_signed_tx(tx).into();
    }

    let mut out = vec![L2MessageKind::Batch as u8];
    for tx in transactions {
        let inner = serialize_signed_tx(tx);
        out.extend_from_slice(&(inner.len() as u64).to_be_bytes());
        out.extend_from_slice(&inner);
    }
    out.into()
}

fn serialize_signed_tx(tx: &TxEnvelope) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + tx.encode_2718_len());
    out.push(L2MessageKind::SignedTx as u8);
    tx.encode_2718(&mut out);
    out
}
