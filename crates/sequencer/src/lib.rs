//! # Orbit Sequencer
//!
//! The sequencer is the component of the Orbit rollup node that decides, in
//! what order and when, pending user transactions and L1-originated delayed
//! messages are turned into L2 blocks.
//!
//! ## Core Responsibilities
//!
//! * **Ordering**: delayed messages are sequenced strictly before user
//!   transactions and in strict index order; transactions from one sender
//!   are never reordered relative to each other once admitted.
//!
//! * **Admission**: speculative per-sender nonce validation against a
//!   head-identity-checked cache avoids wasted block-building attempts;
//!   out-of-order transactions are parked briefly and revived when their
//!   predecessor nonce is admitted.
//!
//! * **Settlement**: every accepted transaction receives exactly one outcome
//!   notification — inclusion in some block, or a definitive rejection.
//!
//! * **Hand-off**: while a backup sequencer is designated, submissions are
//!   relayed to its RPC endpoint instead of being sequenced locally.
//!
//! The EVM state-transition engine, the chain store, and the account state
//! reader are external collaborators behind [`ExecutionProvider`].

use std::sync::Arc;

use anyhow::Result;
use jsonrpsee::RpcModule;
use orbit_common::SequencerConfig;
use orbit_primitives::ChainParams;

/// FIFO queue of L1-originated delayed messages.
mod delayed_queue;
/// Settlement and forwarding error taxonomy.
mod error;
/// Relays transactions to a backup sequencer.
mod forwarder;
/// Module containing metrics collection and reporting functionality.
mod metrics;
/// Per-sender next-expected-nonce cache.
mod nonce_cache;
/// Holding area for transactions with out-of-order nonces.
mod nonce_failures;
/// Collaborator contract with the execution side of the node.
pub mod provider;
/// Provides access to sequencer RPC functionality.
pub mod rpc;
/// Module implementing the main sequencing logic.
mod runner;
/// Sequencer activity state machine.
mod state;
/// Bounded transaction intake queue with retry semantics.
mod tx_queue;
/// Module for declaring types used by the sequencer.
mod types;
/// Module containing utility functions and helpers.
mod utils;

pub use delayed_queue::DelayedMessageQueue;
pub use error::{ForwardError, SequencerError};
pub use forwarder::TransactionForwarder;
pub use provider::{ExecutionProvider, PayloadAttributes};
pub use rpc::{RpcContext, SequencerRpcClient, SequencerRpcServer};
pub use runner::SequencerEngine;
pub use state::{SequencerMode, SequencerState};
pub use tx_queue::{QueuedTransaction, TransactionQueue};
pub use types::{MessageResult, SequencedL2Msg, TickResult};
pub use utils::recover_raw_transaction;

/// Builds and wires the sequencer services: the intake queue, the delayed
/// message queue, the activity state, the engine, and its RPC module.
///
/// # Returns
/// The engine handle and the RPC module extended with sequencer methods.
pub fn build_services<E>(
    config: SequencerConfig,
    chain: ChainParams,
    provider: Arc<E>,
    rpc_module: RpcModule<()>,
) -> Result<(Arc<SequencerEngine<E>>, RpcModule<()>)>
where
    E: ExecutionProvider + 'static,
{
    let tx_queue = Arc::new(TransactionQueue::new(config.clone()));
    let delayed_queue = Arc::new(DelayedMessageQueue::new());
    let state = Arc::new(SequencerState::new(config.forward_timeout()));

    let engine = Arc::new(SequencerEngine::new(
        provider,
        chain,
        config,
        tx_queue,
        delayed_queue,
        state,
    ));

    let rpc_context = RpcContext {
        engine: engine.clone(),
    };
    let rpc_module = rpc::register_rpc_methods(rpc_context, rpc_module)?;

    Ok((engine, rpc_module))
}
