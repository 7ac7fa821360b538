//! Commonly used code snippets

use alloy_consensus::transaction::SignerRecoverable;
use alloy_consensus::TxEnvelope;
use alloy_eips::eip2718::Decodable2718;
use alloy_primitives::{Address, Bytes};

use crate::error::SequencerError;

/// Decodes an EIP-2718 enveloped transaction and recovers its signer.
pub fn recover_raw_transaction(data: &Bytes) -> Result<(TxEnvelope, Address), SequencerError> {
    if data.is_empty() {
        return Err(SequencerError::EmptyRawTransactionData);
    }

    let transaction = TxEnvelope::decode_2718(&mut data.as_ref())
        .map_err(|_| SequencerError::FailedToDecodeSignedTransaction)?;

    let sender = transaction
        .recover_signer()
        .map_err(|_| SequencerError::InvalidTransactionSignature)?;

    Ok((transaction, sender))
}
