//! Relays transactions to a backup sequencer's RPC endpoint while this node
//! is not sequencing.

use std::time::Duration;

use alloy_consensus::TxEnvelope;
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::Bytes;
use jsonrpsee::core::client::Error as ClientError;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::ForwardError;
use crate::metrics::SEQUENCER_METRICS as SM;
use crate::rpc::SequencerRpcClient;

/// Substrings of an RPC error message that mean the backup has no active
/// sequencer either, in which case the transaction is worth retrying locally
/// instead of rejecting.
const NO_SEQUENCER_MARKERS: [&str; 2] = ["sequencer temporarily not available", "no sequencer"];

/// HTTP client that forwards `eth_sendRawTransaction` to a backup sequencer.
pub struct TransactionForwarder {
    target: String,
    client: HttpClient,
    disabled: CancellationToken,
}

impl TransactionForwarder {
    pub fn new(target: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = HttpClientBuilder::default()
            .request_timeout(timeout)
            .build(target)?;

        Ok(Self {
            target: target.to_string(),
            client,
            disabled: CancellationToken::new(),
        })
    }

    /// The backup url this forwarder targets.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Submits the transaction to the backup in its canonical wire encoding.
    ///
    /// The call races the submitter's cancellation signal and this
    /// forwarder's disable signal, whichever fires first.
    pub async fn forward_transaction(
        &self,
        tx: &TxEnvelope,
        cancellation: &CancellationToken,
    ) -> Result<(), ForwardError> {
        if self.disabled.is_cancelled() {
            return Err(ForwardError::Disabled);
        }

        let raw = Bytes::from(tx.encoded_2718());

        tokio::select! {
            biased;
            _ = self.disabled.cancelled() => Err(ForwardError::Disabled),
            _ = cancellation.cancelled() => Err(ForwardError::Cancelled),
            result = self.client.eth_send_raw_transaction(raw) => match result {
                Ok(_hash) => {
                    SM.txs_forwarded.increment(1);
                    Ok(())
                }
                Err(error) => {
                    let error = classify_client_error(error);
                    warn!(target = %self.target, %error, "Error forwarding transaction");
                    Err(error)
                }
            },
        }
    }

    /// Cancels all in-flight and future forwards from this instance.
    pub fn disable(&self) {
        self.disabled.cancel();
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.is_cancelled()
    }
}

fn classify_client_error(error: ClientError) -> ForwardError {
    match error {
        ClientError::Call(object) => {
            let message = object.message().to_string();
            let lowered = message.to_lowercase();
            if NO_SEQUENCER_MARKERS
                .iter()
                .any(|marker| lowered.contains(marker))
            {
                ForwardError::NoSequencer(message)
            } else {
                ForwardError::Rpc(message)
            }
        }
        other => ForwardError::Transport(other.to_string()),
    }
}
