//! The commitment/nullifier scheme binding a hidden amount to a
//! one-time-redeemable lock.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::chain::LedgerAddress;
use crate::field::{
    fr_from_bytes, fr_to_bytes, fr_to_hex, hash_to_field, poseidon_hash3, random_field,
    serde_fr_hex, Fr,
};

static DOMAIN_COMMITMENT: Lazy<Fr> =
    Lazy::new(|| hash_to_field(b"zkbridge.domain.v1", b"commitment"));
static DOMAIN_NULLIFIER: Lazy<Fr> = Lazy::new(|| hash_to_field(b"zkbridge.domain.v1", b"nullifier"));

const RECIPIENT_DOMAIN: &[u8] = b"zkbridge.recipient.v1";

/// Errors from commitment construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommitmentError {
    /// The amount must be positive (a `u128` amount is always below the
    /// field modulus).
    #[error("invalid amount: {0} (must be positive)")]
    InvalidAmount(u128),
}

/// Private transfer data. Held only by the initiating client, consumed by
/// proof generation, never transmitted or persisted.
#[derive(Clone)]
pub struct TransferSecret {
    /// Amount being bridged, in smallest units.
    pub amount: u128,
    /// Fresh 256-bit commitment nonce.
    pub nonce: Fr,
    /// The sender's secret binding value.
    pub sender_secret: Fr,
}

impl fmt::Debug for TransferSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Secrets never appear in logs or error payloads.
        f.debug_struct("TransferSecret")
            .field("amount", &self.amount)
            .field("nonce", &"<redacted>")
            .field("sender_secret", &"<redacted>")
            .finish()
    }
}

impl TransferSecret {
    /// Create a transfer secret with a fresh CSPRNG nonce.
    pub fn generate(amount: u128, sender_secret: Fr) -> Result<Self, CommitmentError> {
        if amount == 0 {
            return Err(CommitmentError::InvalidAmount(amount));
        }
        Ok(Self {
            amount,
            nonce: random_field(),
            sender_secret,
        })
    }

    /// The public commitment for this secret.
    pub fn commitment(&self) -> Commitment {
        Commitment(poseidon_hash3(
            *DOMAIN_COMMITMENT,
            Fr::from(self.amount),
            self.nonce,
        ))
    }

    /// The public nullifier for this secret.
    pub fn nullifier(&self) -> Nullifier {
        nullifier_for(&self.commitment(), self.sender_secret)
    }
}

/// A public hash standing in for a hidden locked amount.
///
/// `commitment = Poseidon(DOMAIN_COMMITMENT, amount, nonce)`. Nonce
/// freshness guarantees commitments never repeat across transfers; the
/// escrow ledger rejects a second lock under an existing commitment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Commitment(#[serde(with = "serde_fr_hex")] pub Fr);

/// A public hash spent exactly once to redeem a commitment.
///
/// `nullifier = Poseidon(DOMAIN_NULLIFIER, commitment, sender_secret)`.
/// Deterministic per transfer, so a second redemption attempt reuses the
/// same nullifier and is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nullifier(#[serde(with = "serde_fr_hex")] pub Fr);

/// A binding of the destination address included in the proof's public
/// inputs, so a proof cannot be replayed toward a different recipient.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecipientHash(#[serde(with = "serde_fr_hex")] pub Fr);

macro_rules! field_newtype_impls {
    ($name:ident) => {
        impl $name {
            /// Wrap a field element.
            pub fn from_fr(fr: Fr) -> Self {
                Self(fr)
            }

            /// The underlying field element.
            pub fn as_fr(&self) -> &Fr {
                &self.0
            }

            /// Canonical 32-byte big-endian representation.
            pub fn to_bytes(&self) -> [u8; 32] {
                fr_to_bytes(&self.0)
            }

            /// Reconstruct from 32 big-endian bytes (reduced mod the field
            /// order).
            pub fn from_bytes(bytes: &[u8; 32]) -> Self {
                Self(fr_from_bytes(bytes))
            }

            /// `0x`-prefixed hex form, for display and wire formats.
            pub fn to_hex(&self) -> String {
                fr_to_hex(&self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }
    };
}

field_newtype_impls!(Commitment);
field_newtype_impls!(Nullifier);
field_newtype_impls!(RecipientHash);

impl RecipientHash {
    /// Bind a destination address into the field.
    pub fn of(recipient: &LedgerAddress) -> Self {
        Self(hash_to_field(RECIPIENT_DOMAIN, recipient.as_str().as_bytes()))
    }
}

/// Derive the nullifier for a commitment under a sender secret.
pub fn nullifier_for(commitment: &Commitment, sender_secret: Fr) -> Nullifier {
    Nullifier(poseidon_hash3(*DOMAIN_NULLIFIER, commitment.0, sender_secret))
}

/// Derive a fresh `(commitment, nullifier)` pair for a transfer.
///
/// Generates a new 256-bit nonce from the OS CSPRNG on every call and
/// returns it so the caller can hand it to the prover as a private input.
/// Fails with [`CommitmentError::InvalidAmount`] for a zero amount.
pub fn build_commitment(
    amount: u128,
    sender_secret: Fr,
) -> Result<(Commitment, Nullifier, Fr), CommitmentError> {
    let secret = TransferSecret::generate(amount, sender_secret)?;
    let commitment = secret.commitment();
    let nullifier = secret.nullifier();
    Ok((commitment, nullifier, secret.nonce))
}
