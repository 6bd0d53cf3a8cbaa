//! zkbridge-common
//!
//! Shared primitives for the zkbridge protocol: arithmetic over the BN254
//! scalar field, domain-separated Poseidon hashing, and the
//! commitment/nullifier scheme that lets a locked amount be redeemed on the
//! destination ledger exactly once without revealing it.
//!
//! # Commitment scheme
//!
//! ```text
//! commitment = Poseidon(DOMAIN_COMMITMENT, amount, nonce)
//! nullifier  = Poseidon(DOMAIN_NULLIFIER, commitment, sender_secret)
//! ```
//!
//! The nonce is drawn fresh from a CSPRNG for every commitment, so
//! commitments never repeat across transfers. The nullifier is a
//! deterministic function of `(commitment, sender_secret)`: the same
//! transfer always nullifies to the same value, which is what makes
//! double-redemption detectable on the destination side.

pub mod chain;
pub mod commitment;
pub mod field;

pub use chain::{ChainId, LedgerAddress};
pub use commitment::{
    build_commitment, nullifier_for, Commitment, CommitmentError, Nullifier, RecipientHash,
    TransferSecret,
};
pub use field::{
    fr_from_bytes, fr_from_hex, fr_to_bytes, fr_to_hex, hash_to_field, poseidon_hash3,
    random_field, serde_fr_hex, Fr,
};

/// Version of the zkbridge protocol wire formats and hash domains.
pub const PROTOCOL_VERSION: u32 = 1;

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}
