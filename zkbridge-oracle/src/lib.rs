//! zkbridge-oracle
//!
//! The boundary to the external proving/verification oracle. The oracle is
//! a black box: given a circuit identifier, named private inputs, and named
//! public inputs it returns an opaque proof blob; given a proof and the
//! same artifacts it returns a validity bit. This crate does no
//! cryptographic computation of its own — it maps the protocol's named
//! fields to the oracle's ordered-input convention, carries the proof
//! together with an echo of the public inputs it was produced for, and
//! surfaces an echo mismatch as a fatal local error distinct from "proof
//! invalid".
//!
//! [`mock::MockOracle`] is a deterministic in-process oracle for tests and
//! local demos. It enforces the transfer circuit's constraints at proving
//! time and binds every proof to its `(circuit, public inputs)` with a
//! keyed MAC, so tampered public inputs or forged proofs fail verification
//! like they would against a real verifier. There is no accept-everything
//! path anywhere in this crate.

pub mod error;
pub mod inputs;
pub mod mock;
pub mod oracle;

pub use error::{OracleError, OracleResult};
pub use inputs::{PrivateInputs, ProofBundle, PublicInputs};
pub use mock::MockOracle;
pub use oracle::ProofOracle;

/// Circuit identifier for the bridge transfer statement: knowledge of
/// `(amount, nonce, sender_secret)` consistent with the public
/// `(commitment, nullifier, recipient_hash)`.
pub const TRANSFER_CIRCUIT: &str = "zkbridge.transfer.v1";
