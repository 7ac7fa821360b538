use std::sync::Arc;

use alloy_primitives::{Bytes, B256};
use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::error::{INVALID_PARAMS_CODE, INVALID_PARAMS_MSG};
use jsonrpsee::types::ErrorObjectOwned;
use orbit_common::rpc::internal_rpc_error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::SequencerError;
use crate::provider::ExecutionProvider;
use crate::runner::SequencerEngine;
use crate::utils::recover_raw_transaction;

/// Interface definition for the sequencer RPC calls.
///
/// The generated client is also the transport used when forwarding
/// transactions to a backup sequencer.
#[rpc(client, server)]
pub trait SequencerRpc {
    /// Submits a raw transaction and waits until it is sequenced into a
    /// block or definitively rejected.
    ///
    /// # Returns
    /// The transaction hash once the transaction landed in a block.
    #[method(name = "eth_sendRawTransaction")]
    async fn eth_send_raw_transaction(&self, data: Bytes) -> RpcResult<B256>;

    /// Stops sequencing; submitted transactions stay queued.
    #[method(name = "orbit_pauseSequencer")]
    async fn pause_sequencer(&self) -> RpcResult<()>;

    /// Starts (or resumes) local sequencing.
    #[method(name = "orbit_activateSequencer")]
    async fn activate_sequencer(&self) -> RpcResult<()>;

    /// Relays all future submissions to the given backup sequencer url.
    #[method(name = "orbit_forwardTransactionsTo")]
    async fn forward_transactions_to(&self, url: String) -> RpcResult<()>;

    /// Next delayed message index the inbox should produce.
    #[method(name = "orbit_nextDelayedMessageNumber")]
    async fn next_delayed_message_number(&self) -> RpcResult<u64>;
}

/// RPC context containing the shared engine handle.
pub struct RpcContext<E: ExecutionProvider> {
    /// The sequencer engine.
    pub engine: Arc<SequencerEngine<E>>,
}

/// Sequencer RPC server implementation; delegates every method to the
/// engine.
pub struct SequencerRpcServerImpl<E: ExecutionProvider> {
    context: Arc<RpcContext<E>>,
}

impl<E: ExecutionProvider> SequencerRpcServerImpl<E> {
    pub fn new(context: RpcContext<E>) -> Self {
        Self {
            context: Arc::new(context),
        }
    }
}

#[async_trait::async_trait]
impl<E: ExecutionProvider + 'static> SequencerRpcServer for SequencerRpcServerImpl<E> {
    async fn eth_send_raw_transaction(&self, data: Bytes) -> RpcResult<B256> {
        debug!("Sequencer: eth_sendRawTransaction");

        let (tx, sender) = recover_raw_transaction(&data).map_err(rejection_error)?;
        let hash = *tx.tx_hash();

        self.context
            .engine
            .submit(tx, sender, CancellationToken::new())
            .await
            .map_err(rejection_error)?;

        Ok(hash)
    }

    async fn pause_sequencer(&self) -> RpcResult<()> {
        debug!("Sequencer: orbit_pauseSequencer");
        self.context.engine.pause();
        Ok(())
    }

    async fn activate_sequencer(&self) -> RpcResult<()> {
        debug!("Sequencer: orbit_activateSequencer");
        self.context.engine.activate();
        Ok(())
    }

    async fn forward_transactions_to(&self, url: String) -> RpcResult<()> {
        debug!("Sequencer: orbit_forwardTransactionsTo({url})");
        self.context
            .engine
            .forward_to(&url)
            .map_err(|e| internal_rpc_error(format!("Could not switch forward target: {e}")))
    }

    async fn next_delayed_message_number(&self) -> RpcResult<u64> {
        debug!("Sequencer: orbit_nextDelayedMessageNumber");
        self.context
            .engine
            .next_delayed_message_number()
            .await
            .map_err(|e| internal_rpc_error(format!("Could not read next delayed index: {e}")))
    }
}

/// Maps a settlement rejection onto a jsonrpsee error object. Decode
/// failures are parameter errors; everything else keeps its message so
/// upstream forwarders can classify it.
fn rejection_error(error: SequencerError) -> ErrorObjectOwned {
    match error {
        SequencerError::EmptyRawTransactionData
        | SequencerError::FailedToDecodeSignedTransaction
        | SequencerError::InvalidTransactionSignature => ErrorObjectOwned::owned(
            INVALID_PARAMS_CODE,
            INVALID_PARAMS_MSG,
            Some(error.to_string()),
        ),
        other => internal_rpc_error(other),
    }
}

/// Updates the given RpcModule with sequencer methods.
pub fn register_rpc_methods<E: ExecutionProvider + 'static>(
    rpc_context: RpcContext<E>,
    mut rpc_methods: jsonrpsee::RpcModule<()>,
) -> Result<jsonrpsee::RpcModule<()>, jsonrpsee::core::RegisterMethodError> {
    let rpc = create_rpc_module(rpc_context);
    rpc_methods.merge(rpc)?;
    Ok(rpc_methods)
}

/// Creates the sequencer RPC module with all methods registered.
pub fn create_rpc_module<E: ExecutionProvider + 'static>(
    rpc_context: RpcContext<E>,
) -> jsonrpsee::RpcModule<SequencerRpcServerImpl<E>> {
    let server = SequencerRpcServerImpl::new(rpc_context);

    SequencerRpcServer::into_rpc(server)
}
