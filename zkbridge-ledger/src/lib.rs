//! zkbridge-ledger
//!
//! The two ledger objects the bridge keeps consistent:
//!
//! - [`EscrowLedger`] — the source side. Holds locked value keyed by
//!   commitment, enforces one lock per commitment, and releases funds
//!   either by settlement (after the destination verifiably redeemed the
//!   matching nullifier) or by refund once the lock's timeout elapses.
//! - [`MintLedger`] — the destination side. Tracks used nullifiers and
//!   minted balances, and enforces at-most-once redemption per nullifier:
//!   the uniqueness check and the mark-used write are one atomic
//!   insert-if-absent inside a single critical section.
//!
//! Both are explicit objects shared by handle (`Arc`), never process-wide
//! state. All mutating operations are short synchronous critical sections
//! under the ledger's write lock with no `await` inside, which is what
//! serializes per-key writers; the only slow operation in the protocol —
//! proof verification — runs before the mint ledger's critical section,
//! with no lock held.

pub mod error;
pub mod escrow;
pub mod mint;

pub use error::{LedgerError, LedgerResult};
pub use escrow::{EscrowConfig, EscrowLedger, LockReceipt, LockState, LockedFunds, RefundReceipt};
pub use mint::{BurnRecord, MintConfig, MintLedger, MintReceipt};

/// Default escrow refund window: 7 days.
pub const DEFAULT_REFUND_TIMEOUT_SECS: u64 = 604_800;

/// Fee basis-point denominator.
pub const BPS_DENOMINATOR: u128 = 10_000;
