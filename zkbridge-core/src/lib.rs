//! zkbridge-core
//!
//! The bridge transfer state machine and the coordinator that drives it.
//!
//! # Lifecycle
//!
//! ```text
//! Pending ──> Locked ──> Proving ──> Submitted ──> Verified ──> Settled
//!    │           │           │            │            │
//!    │           ├──> Refunded (after escrow timeout)  │
//!    └───────────┴───────────┴────────────┴────────────┴──────> Failed
//! ```
//!
//! `Settled`, `Failed`, and `Refunded` are terminal. Every transition is
//! guarded (see [`transfer::ensure_transition`]), appends to the
//! transfer's append-only step log, and is broadcast to event subscribers.
//! The coordinator computes proofs with no ledger lock held and submits
//! them through the explicit untrusted [`Relayer`] boundary — the
//! destination ledger re-verifies the proof and re-checks the nullifier
//! itself, so nothing the relayer carries is trusted.

pub mod coordinator;
pub mod error;
pub mod events;
pub mod relayer;
pub mod transfer;

pub use coordinator::BridgeCoordinator;
pub use error::{BridgeError, BridgeResult};
pub use events::{EventBus, TransferEvent, EVENT_CHANNEL_CAPACITY};
pub use relayer::Relayer;
pub use transfer::{
    ensure_transition, parse_transfer_id, transfer_id_hex, BridgeTransfer, TransferId,
    TransferRequest, TransferStatus, TransferStep,
};
