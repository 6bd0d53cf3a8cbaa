//! The proof oracle trait.

use async_trait::async_trait;

use crate::error::OracleResult;
use crate::inputs::{PrivateInputs, ProofBundle, PublicInputs};

/// Boundary to the external prover/verifier.
///
/// Implementations shell out to a proving service or wrap an in-process
/// proving library; the bridge core only ever sees this trait. Proof
/// generation and verification can take seconds, so both calls are async
/// and must never be made while a ledger lock is held.
#[async_trait]
pub trait ProofOracle: Send + Sync {
    /// Ask the oracle to prove knowledge of `private` consistent with
    /// `public` under `circuit_id`.
    ///
    /// The returned bundle echoes the public inputs the proof was
    /// generated for; callers verify the echo with
    /// [`ProofBundle::ensure_binding`] before submitting anywhere.
    ///
    /// Fails with `ProverUnavailable` when the oracle cannot be reached
    /// (retryable) or `ProofRejected` when it ran but produced an
    /// invalid/empty proof (terminal).
    async fn generate_proof(
        &self,
        circuit_id: &str,
        private: &PrivateInputs,
        public: &PublicInputs,
    ) -> OracleResult<ProofBundle>;

    /// Ask the oracle whether `bundle` proves `public` under `circuit_id`.
    ///
    /// `Ok(false)` means the verifier ran and the proof is invalid.
    /// An echo mismatch between `bundle` and `public` is reported as
    /// `Err(PublicInputMismatch)` — a local protocol bug, never to be
    /// conflated with an invalid proof.
    async fn verify_proof(
        &self,
        circuit_id: &str,
        bundle: &ProofBundle,
        public: &PublicInputs,
    ) -> OracleResult<bool>;
}
