use alloy_primitives::Address;
use thiserror::Error;

/// Terminal outcome reported to a submitter whose transaction was not
/// sequenced. Inclusion in a block (success or revert alike) settles with no
/// error instead.
#[derive(Debug, Error)]
pub enum SequencerError {
    #[error("nonce too low: sender={sender}, tx nonce={tx_nonce}, state nonce={state_nonce}")]
    NonceTooLow {
        sender: Address,
        tx_nonce: u64,
        state_nonce: u64,
    },

    #[error("nonce too high: sender={sender}, nonce={nonce}")]
    NonceTooHigh { sender: Address, nonce: u64 },

    #[error("nonce failure expired: sender={sender}, nonce={nonce}")]
    NonceFailureExpired { sender: Address, nonce: u64 },

    #[error("nonce failure cache overflow")]
    NonceFailureOverflow,

    /// Parked transactions dropped because sequencing was disabled.
    #[error("sequencing disabled")]
    SequencingDisabled,

    #[error("transaction cancelled")]
    Cancelled,

    #[error("transaction queue is full or timed out")]
    QueueTimeout,

    #[error("transaction queue closed")]
    QueueClosed,

    #[error("transaction too large: {size} bytes > {limit} bytes limit")]
    TxTooLarge { size: usize, limit: usize },

    #[error("empty raw transaction data")]
    EmptyRawTransactionData,

    #[error("failed to decode signed transaction")]
    FailedToDecodeSignedTransaction,

    #[error("invalid transaction signature")]
    InvalidTransactionSignature,

    #[error(transparent)]
    Forward(#[from] ForwardError),
}

/// Failure modes of forwarding a transaction to the backup sequencer. Only
/// `NoSequencer` is retryable locally; everything else is surfaced to the
/// submitter.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("forwarder has been disabled")]
    Disabled,

    #[error("forward cancelled")]
    Cancelled,

    /// The backup reported that it has no active sequencer either.
    #[error("backup sequencer unavailable: {0}")]
    NoSequencer(String),

    #[error("forward RPC error: {0}")]
    Rpc(String),

    #[error("forward transport error: {0}")]
    Transport(String),
}
