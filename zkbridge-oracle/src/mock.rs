//! Deterministic in-process oracle for tests and local demos.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

use zkbridge_common::TransferSecret;

use crate::error::{OracleError, OracleResult};
use crate::inputs::{PrivateInputs, ProofBundle, PublicInputs};
use crate::oracle::ProofOracle;

/// An oracle that emulates a real prover/verifier pair.
///
/// Proving enforces the transfer circuit's constraints — the witness must
/// actually hash to the claimed commitment and nullifier — and the proof
/// is a MAC over `(circuit_id, ordered public inputs)` under a key
/// standing in for the structured reference string. Verification
/// recomputes the MAC, so a proof only verifies against the exact public
/// inputs it was generated for: tampering with the commitment, nullifier,
/// or recipient hash makes verification return `false`, the same way a
/// real verifier would reject.
pub struct MockOracle {
    key: [u8; 32],
    unavailable: AtomicBool,
}

impl MockOracle {
    /// Oracle with a fixed default key. Proofs are deterministic across
    /// processes, which keeps test fixtures stable.
    pub fn new() -> Self {
        Self::with_key(*blake3::hash(b"zkbridge.mock-oracle.srs.v1").as_bytes())
    }

    /// Oracle with an explicit binding key.
    pub fn with_key(key: [u8; 32]) -> Self {
        Self {
            key,
            unavailable: AtomicBool::new(false),
        }
    }

    /// Simulate the oracle going down (both proving and verification start
    /// failing with `ProverUnavailable`).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> OracleResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(OracleError::ProverUnavailable(
                "mock oracle marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn mac(&self, circuit_id: &str, public: &PublicInputs) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        hasher.update(circuit_id.as_bytes());
        hasher.update(&public.to_transcript_bytes());
        *hasher.finalize().as_bytes()
    }
}

impl Default for MockOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProofOracle for MockOracle {
    async fn generate_proof(
        &self,
        circuit_id: &str,
        private: &PrivateInputs,
        public: &PublicInputs,
    ) -> OracleResult<ProofBundle> {
        self.check_available()?;

        // Constraint check: the witness must satisfy the statement. A real
        // prover fails circuit synthesis here.
        let secret = TransferSecret {
            amount: private.amount,
            nonce: private.nonce,
            sender_secret: private.sender_secret,
        };
        if private.amount == 0
            || secret.commitment() != public.commitment
            || secret.nullifier() != public.nullifier
        {
            return Err(OracleError::ProofRejected(
                "witness does not satisfy the transfer circuit".to_string(),
            ));
        }

        Ok(ProofBundle {
            circuit_id: circuit_id.to_string(),
            proof: self.mac(circuit_id, public).to_vec(),
            public_inputs: public.clone(),
        })
    }

    async fn verify_proof(
        &self,
        circuit_id: &str,
        bundle: &ProofBundle,
        public: &PublicInputs,
    ) -> OracleResult<bool> {
        self.check_available()?;
        bundle.ensure_binding(circuit_id, public)?;

        let expected = self.mac(circuit_id, &bundle.public_inputs);
        Ok(bundle.proof.as_slice() == expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TRANSFER_CIRCUIT;
    use zkbridge_common::{build_commitment, Fr, LedgerAddress, RecipientHash};

    async fn prove_sample(oracle: &MockOracle) -> (ProofBundle, PublicInputs) {
        let sender_secret = Fr::from(77u64);
        let (commitment, nullifier, nonce) = build_commitment(500, sender_secret).unwrap();
        let public = PublicInputs {
            commitment,
            nullifier,
            recipient_hash: RecipientHash::of(&LedgerAddress::new("dest-account")),
        };
        let private = PrivateInputs {
            amount: 500,
            nonce,
            sender_secret,
        };
        let bundle = oracle
            .generate_proof(TRANSFER_CIRCUIT, &private, &public)
            .await
            .unwrap();
        (bundle, public)
    }

    #[tokio::test]
    async fn valid_proof_verifies() {
        let oracle = MockOracle::new();
        let (bundle, public) = prove_sample(&oracle).await;
        let ok = oracle
            .verify_proof(TRANSFER_CIRCUIT, &bundle, &public)
            .await
            .unwrap();
        assert!(ok);
    }

    #[tokio::test]
    async fn tampered_proof_fails_verification() {
        let oracle = MockOracle::new();
        let (mut bundle, public) = prove_sample(&oracle).await;
        bundle.proof[0] ^= 0xff;
        let ok = oracle
            .verify_proof(TRANSFER_CIRCUIT, &bundle, &public)
            .await
            .unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn inconsistent_witness_is_rejected_at_proving() {
        let oracle = MockOracle::new();
        let sender_secret = Fr::from(77u64);
        let (commitment, nullifier, nonce) = build_commitment(500, sender_secret).unwrap();
        let public = PublicInputs {
            commitment,
            nullifier,
            recipient_hash: RecipientHash::of(&LedgerAddress::new("dest-account")),
        };
        // Claim a different amount than the commitment binds.
        let private = PrivateInputs {
            amount: 501,
            nonce,
            sender_secret,
        };
        let err = oracle
            .generate_proof(TRANSFER_CIRCUIT, &private, &public)
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::ProofRejected(_)));
    }

    #[tokio::test]
    async fn unavailable_oracle_reports_retryable_error() {
        let oracle = MockOracle::new();
        oracle.set_unavailable(true);
        let (bundle, public) = {
            let up = MockOracle::new();
            prove_sample(&up).await
        };
        let err = oracle
            .verify_proof(TRANSFER_CIRCUIT, &bundle, &public)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn echo_mismatch_is_not_proof_invalid() {
        let oracle = MockOracle::new();
        let (bundle, _) = prove_sample(&oracle).await;

        // Ask the verifier about different public inputs than the bundle
        // echoes.
        let other = PublicInputs {
            commitment: bundle.public_inputs.commitment,
            nullifier: bundle.public_inputs.nullifier,
            recipient_hash: RecipientHash::of(&LedgerAddress::new("someone-else")),
        };
        let err = oracle
            .verify_proof(TRANSFER_CIRCUIT, &bundle, &other)
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::PublicInputMismatch));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn proofs_are_key_bound() {
        let oracle_a = MockOracle::with_key([1u8; 32]);
        let oracle_b = MockOracle::with_key([2u8; 32]);
        let (bundle, public) = prove_sample(&oracle_a).await;
        let ok = oracle_b
            .verify_proof(TRANSFER_CIRCUIT, &bundle, &public)
            .await
            .unwrap();
        assert!(!ok);
    }
}
