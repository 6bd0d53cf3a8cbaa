//! Source-side escrow ledger.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::RwLock;

use zkbridge_common::{unix_now, Commitment, LedgerAddress};

use crate::error::{LedgerError, LedgerResult};
use crate::DEFAULT_REFUND_TIMEOUT_SECS;

/// Lifecycle of a lock entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockState {
    /// Value is held and may be settled or, after the timeout, refunded.
    Locked,
    /// The matching nullifier was verifiably redeemed on the destination;
    /// the lock is released and no longer refundable.
    Settled,
    /// Value was returned to the sender after the timeout.
    Refunded,
}

/// A lock entry held by the escrow.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LockedFunds {
    /// Commitment the value is locked under.
    pub commitment: Commitment,
    /// Locked amount, smallest units.
    pub amount: u128,
    /// The sender funds return to on refund.
    pub sender: LedgerAddress,
    /// Unix time of the lock.
    pub lock_time: u64,
    /// Source-ledger transaction reference.
    pub source_tx_ref: String,
    /// Current lifecycle state.
    pub state: LockState,
}

/// Receipt for a successful lock.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LockReceipt {
    pub commitment: Commitment,
    pub source_tx_ref: String,
    pub locked_at: u64,
}

/// Receipt for a successful refund.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefundReceipt {
    pub commitment: Commitment,
    pub amount: u128,
    pub sender: LedgerAddress,
    pub refunded_at: u64,
}

/// Escrow configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EscrowConfig {
    /// Minimum lockable amount, smallest units.
    pub min_lock_amount: u128,
    /// Seconds after `lock_time` before a lock becomes refundable.
    pub refund_timeout_secs: u64,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            min_lock_amount: 1,
            refund_timeout_secs: DEFAULT_REFUND_TIMEOUT_SECS,
        }
    }
}

impl EscrowConfig {
    /// Configuration with a custom refund window.
    pub fn with_refund_timeout(mut self, secs: u64) -> Self {
        self.refund_timeout_secs = secs;
        self
    }

    /// Configuration with a custom minimum lock amount.
    pub fn with_min_lock_amount(mut self, min: u128) -> Self {
        self.min_lock_amount = min;
        self
    }
}

#[derive(Debug, Default)]
struct EscrowInner {
    locks: HashMap<Commitment, LockedFunds>,
    total_locked: u128,
    paused: bool,
}

/// The source-side ledger holding value pending proof-gated release.
///
/// One lock per commitment, enforced by an atomic entry insert: the
/// existence check and the store happen in the same critical section, so
/// a duplicate (or retried) `lock` is rejected rather than double-applied.
pub struct EscrowLedger {
    config: EscrowConfig,
    inner: RwLock<EscrowInner>,
}

impl EscrowLedger {
    /// Create an escrow ledger.
    pub fn new(config: EscrowConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(EscrowInner::default()),
        }
    }

    /// The ledger's configuration.
    pub fn config(&self) -> &EscrowConfig {
        &self.config
    }

    /// Lock `amount` under `commitment` for `sender`.
    ///
    /// Fails with `DuplicateCommitment` if a lock (in any state) already
    /// exists under this commitment.
    pub async fn lock(
        &self,
        commitment: Commitment,
        amount: u128,
        sender: LedgerAddress,
    ) -> LedgerResult<LockReceipt> {
        if amount < self.config.min_lock_amount {
            return Err(LedgerError::AmountTooLow {
                min: self.config.min_lock_amount,
                got: amount,
            });
        }

        let mut inner = self.inner.write().await;
        let inner = &mut *inner;
        if inner.paused {
            return Err(LedgerError::LedgerPaused);
        }
        let new_total = inner
            .total_locked
            .checked_add(amount)
            .ok_or(LedgerError::ArithmeticOverflow)?;

        use std::collections::hash_map::Entry;
        match inner.locks.entry(commitment) {
            Entry::Occupied(_) => Err(LedgerError::DuplicateCommitment(commitment)),
            Entry::Vacant(entry) => {
                let lock_time = unix_now();
                let source_tx_ref = lock_tx_ref(&commitment, lock_time);
                entry.insert(LockedFunds {
                    commitment,
                    amount,
                    sender,
                    lock_time,
                    source_tx_ref: source_tx_ref.clone(),
                    state: LockState::Locked,
                });
                inner.total_locked = new_total;

                tracing::info!(
                    commitment = %commitment,
                    amount,
                    tx_ref = %source_tx_ref,
                    "Locked funds in escrow"
                );
                Ok(LockReceipt {
                    commitment,
                    source_tx_ref,
                    locked_at: lock_time,
                })
            }
        }
    }

    /// Return a still-locked entry's funds to the sender after the
    /// timeout.
    pub async fn refund(&self, commitment: &Commitment) -> LedgerResult<RefundReceipt> {
        let mut inner = self.inner.write().await;
        if inner.paused {
            return Err(LedgerError::LedgerPaused);
        }

        let timeout = self.config.refund_timeout_secs;
        let funds = inner
            .locks
            .get_mut(commitment)
            .ok_or(LedgerError::NotFound(*commitment))?;
        if funds.state != LockState::Locked {
            return Err(LedgerError::AlreadySettled(*commitment));
        }

        let now = unix_now();
        let refundable_at = funds.lock_time.saturating_add(timeout);
        if now < refundable_at {
            return Err(LedgerError::TooEarly {
                remaining_secs: refundable_at - now,
            });
        }

        funds.state = LockState::Refunded;
        let amount = funds.amount;
        let sender = funds.sender.clone();
        inner.total_locked -= amount;

        tracing::info!(commitment = %commitment, amount, "Refunded escrow lock");
        Ok(RefundReceipt {
            commitment: *commitment,
            amount,
            sender,
            refunded_at: now,
        })
    }

    /// Mark a lock settled after the destination verifiably redeemed the
    /// matching nullifier. Settled locks leave `total_locked` and are not
    /// refundable.
    pub async fn settle(&self, commitment: &Commitment) -> LedgerResult<()> {
        let mut inner = self.inner.write().await;

        let funds = inner
            .locks
            .get_mut(commitment)
            .ok_or(LedgerError::NotFound(*commitment))?;
        if funds.state != LockState::Locked {
            return Err(LedgerError::AlreadySettled(*commitment));
        }

        funds.state = LockState::Settled;
        let amount = funds.amount;
        inner.total_locked -= amount;

        tracing::info!(commitment = %commitment, amount, "Settled escrow lock");
        Ok(())
    }

    /// Sum of live (still locked) value.
    pub async fn total_locked(&self) -> u128 {
        self.inner.read().await.total_locked
    }

    /// Lifecycle state of a commitment, if it exists.
    pub async fn commitment_status(&self, commitment: &Commitment) -> Option<LockState> {
        self.inner.read().await.locks.get(commitment).map(|f| f.state)
    }

    /// Full lock entry for a commitment, if it exists.
    pub async fn locked_funds(&self, commitment: &Commitment) -> Option<LockedFunds> {
        self.inner.read().await.locks.get(commitment).cloned()
    }

    /// Pause or unpause the ledger. While paused, lock and refund are
    /// rejected.
    pub async fn set_paused(&self, paused: bool) {
        self.inner.write().await.paused = paused;
    }
}

fn lock_tx_ref(commitment: &Commitment, lock_time: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"zkbridge.escrow.lock.v1");
    hasher.update(commitment.to_bytes());
    hasher.update(lock_time.to_be_bytes());
    format!("lock:{}", hex::encode(&hasher.finalize()[..12]))
}
