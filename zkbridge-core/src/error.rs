//! Error types for the bridge core.

use thiserror::Error;

use zkbridge_common::CommitmentError;
use zkbridge_ledger::LedgerError;
use zkbridge_oracle::OracleError;

use crate::transfer::TransferStatus;

/// Errors driving a transfer to `Failed` or rejecting an operation.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A state transition the machine does not permit.
    #[error("invalid transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: TransferStatus,
        to: TransferStatus,
    },

    /// Cancellation requested in a state that does not permit it.
    #[error("transfer in state {0:?} cannot be cancelled")]
    NotCancellable(TransferStatus),

    /// The transfer was cancelled by the caller.
    #[error("transfer cancelled by caller")]
    Cancelled,

    /// The caller-supplied deadline passed before the transfer completed.
    #[error("transfer deadline exceeded")]
    DeadlineExceeded,

    /// No transfer with this id.
    #[error("transfer not found: {0}")]
    TransferNotFound(String),

    /// The transfer request itself is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The local pre-submission check rejected the proof.
    #[error("proof invalid")]
    ProofInvalid,

    /// Commitment construction failed.
    #[error(transparent)]
    Commitment(#[from] CommitmentError),

    /// Failure at the proof oracle boundary.
    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// Failure at a ledger boundary.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl BridgeError {
    /// Whether the caller may retry with backoff. The core itself never
    /// retries: a retried lock or mint is deduplicated by the ledgers'
    /// commitment/nullifier idempotency.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Oracle(err) => err.is_retryable(),
            Self::Ledger(err) => err.is_retryable(),
            _ => false,
        }
    }
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
