//! Error types for the proof oracle boundary.

use thiserror::Error;

/// Errors crossing the oracle boundary.
///
/// Note the taxonomy: a verifier that runs and returns `false` is NOT an
/// error here — [`crate::ProofOracle::verify_proof`] reports that as
/// `Ok(false)`. These variants cover the oracle being unreachable, the
/// prover producing garbage, and the protocol-level bug of a proof bundle
/// echoing different public inputs than the caller expected.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The oracle could not be reached or is misconfigured. Retryable.
    #[error("prover unavailable: {0}")]
    ProverUnavailable(String),

    /// The oracle ran but returned an invalid or empty proof.
    #[error("proof rejected by prover: {0}")]
    ProofRejected(String),

    /// The bundle's echoed public inputs differ from the inputs the caller
    /// expected. This is a protocol bug on our side, not a proof failure,
    /// and must never be retried or treated as "proof invalid".
    #[error("public input mismatch: bundle echoes different public inputs than expected")]
    PublicInputMismatch,

    /// The bundle was produced for a different circuit.
    #[error("circuit mismatch: bundle is for {got}, expected {expected}")]
    CircuitMismatch { expected: String, got: String },
}

impl OracleError {
    /// Whether the caller may retry the operation with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProverUnavailable(_))
    }
}

/// Result type for oracle operations.
pub type OracleResult<T> = Result<T, OracleError>;
