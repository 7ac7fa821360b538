//! # Orbit Primitives
//!
//! Chain data model shared across the Orbit sequencer workspace: the
//! L1-originated message types consumed by the sequencer, the minimal block
//! and header views it needs for ordering decisions, L2 message payload
//! assembly, and chain parameters.
//!
//! Execution, state storage, and DA are external collaborators; nothing in
//! this crate touches them.

/// Minimal block and header views used by sequencing.
pub mod block;
/// Chain parameters and block-number/message-index conversion.
pub mod chain;
/// Assembly of signed user transactions into L2 message payloads.
pub mod l2_message;
/// L1-originated message types and the delayed message wrapper.
pub mod message;

pub use block::{Block, BlockHeader};
pub use chain::ChainParams;
pub use message::{
    DelayedMessage, L1IncomingMessage, L1IncomingMessageHeader, L1MessageKind, MessageWithMetadata,
};
