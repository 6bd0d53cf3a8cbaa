//! Named circuit inputs and the proof bundle that echoes them.

use serde::{Deserialize, Serialize};
use std::fmt;

use zkbridge_common::{Commitment, Fr, Nullifier, RecipientHash};

use crate::error::{OracleError, OracleResult};

/// Private (witness) inputs to the transfer circuit. Never serialized,
/// never logged.
#[derive(Clone)]
pub struct PrivateInputs {
    /// The hidden amount.
    pub amount: u128,
    /// The commitment nonce.
    pub nonce: Fr,
    /// The sender's secret binding value.
    pub sender_secret: Fr,
}

impl PrivateInputs {
    /// Map the named witness fields to the oracle's ordered convention:
    /// `[amount, nonce, sender_secret]`.
    pub fn to_ordered(&self) -> [Fr; 3] {
        [Fr::from(self.amount), self.nonce, self.sender_secret]
    }
}

impl fmt::Debug for PrivateInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateInputs").finish_non_exhaustive()
    }
}

/// Public inputs to the transfer circuit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicInputs {
    /// Commitment the source ledger holds the lock under.
    pub commitment: Commitment,
    /// Nullifier that will be spent on the destination ledger.
    pub nullifier: Nullifier,
    /// Binding of the destination address.
    pub recipient_hash: RecipientHash,
}

impl PublicInputs {
    /// Map the named public fields to the oracle's ordered convention:
    /// `[commitment, nullifier, recipient_hash]`.
    pub fn to_ordered(&self) -> [Fr; 3] {
        [
            *self.commitment.as_fr(),
            *self.nullifier.as_fr(),
            *self.recipient_hash.as_fr(),
        ]
    }

    /// Rebuild named fields from the oracle's ordered convention.
    pub fn from_ordered(ordered: [Fr; 3]) -> Self {
        Self {
            commitment: Commitment::from_fr(ordered[0]),
            nullifier: Nullifier::from_fr(ordered[1]),
            recipient_hash: RecipientHash::from_fr(ordered[2]),
        }
    }

    /// Canonical byte encoding of the ordered public inputs, used for
    /// proof binding and transcript hashing.
    pub fn to_transcript_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(96);
        out.extend_from_slice(&self.commitment.to_bytes());
        out.extend_from_slice(&self.nullifier.to_bytes());
        out.extend_from_slice(&self.recipient_hash.to_bytes());
        out
    }
}

/// An opaque proof blob together with an echo of the circuit and public
/// inputs it was produced for.
///
/// Callers assert the echo matches the inputs they expect before doing
/// anything with the proof; see [`ProofBundle::ensure_binding`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProofBundle {
    /// Circuit identifier the proof was generated for.
    pub circuit_id: String,
    /// The proof bytes. Opaque to the protocol.
    pub proof: Vec<u8>,
    /// Echo of the public inputs the prover was given.
    pub public_inputs: PublicInputs,
}

impl ProofBundle {
    /// Assert this bundle is bound to the expected circuit and public
    /// inputs.
    ///
    /// A mismatch means our proving call and our verification call
    /// disagree about what is being proven — a protocol bug, surfaced as
    /// a fatal local error distinct from an invalid proof.
    pub fn ensure_binding(&self, circuit_id: &str, expected: &PublicInputs) -> OracleResult<()> {
        if self.circuit_id != circuit_id {
            return Err(OracleError::CircuitMismatch {
                expected: circuit_id.to_string(),
                got: self.circuit_id.clone(),
            });
        }
        if self.public_inputs != *expected {
            return Err(OracleError::PublicInputMismatch);
        }
        Ok(())
    }
}
