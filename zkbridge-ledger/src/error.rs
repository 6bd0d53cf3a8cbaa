//! Error types for ledger operations.

use thiserror::Error;

use zkbridge_common::{Commitment, Nullifier};
use zkbridge_oracle::OracleError;

/// Errors that can occur during escrow and mint operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Amount below the ledger's configured minimum.
    #[error("amount too low: {got} (minimum {min})")]
    AmountTooLow { min: u128, got: u128 },

    /// A lock already exists under this commitment.
    #[error("commitment already locked: {0}")]
    DuplicateCommitment(Commitment),

    /// The nullifier has already been spent — double-redemption attempt.
    #[error("nullifier already used: {0}")]
    NullifierUsed(Nullifier),

    /// The verifier ran and rejected the proof.
    #[error("proof invalid")]
    ProofInvalid,

    /// The claimed recipient does not hash to the proof's recipient
    /// binding.
    #[error("recipient does not match the proof's recipient hash")]
    RecipientMismatch,

    /// Caller's balance cannot cover the operation.
    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: u128, need: u128 },

    /// Refund requested before the lock's timeout elapsed.
    #[error("refund too early: {remaining_secs}s of the timeout remaining")]
    TooEarly { remaining_secs: u64 },

    /// No lock exists under this commitment.
    #[error("commitment not found: {0}")]
    NotFound(Commitment),

    /// The lock was already settled or refunded.
    #[error("commitment already processed (settled or refunded): {0}")]
    AlreadySettled(Commitment),

    /// The ledger is paused.
    #[error("ledger is paused")]
    LedgerPaused,

    /// Checked arithmetic overflowed.
    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    /// Transient failure reaching the ledger. Retryable.
    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// Failure at the proof oracle boundary.
    #[error(transparent)]
    Oracle(#[from] OracleError),
}

impl LedgerError {
    /// Whether the caller may retry with backoff. Retrying never
    /// double-applies: lock and mint are idempotent per commitment and
    /// nullifier respectively.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::LedgerUnavailable(_) => true,
            Self::Oracle(err) => err.is_retryable(),
            _ => false,
        }
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
