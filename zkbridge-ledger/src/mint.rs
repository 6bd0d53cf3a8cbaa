//! Destination-side mint/redemption ledger.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use zkbridge_common::{unix_now, Commitment, LedgerAddress, Nullifier, RecipientHash};
use zkbridge_oracle::{ProofBundle, ProofOracle, PublicInputs, TRANSFER_CIRCUIT};

use crate::error::{LedgerError, LedgerResult};
use crate::BPS_DENOMINATOR;

/// Mint ledger configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MintConfig {
    /// Minimum mintable amount, smallest units.
    pub min_mint_amount: u128,
    /// Relayer fee in basis points, deducted from the minted amount.
    pub relayer_fee_bps: u32,
}

impl Default for MintConfig {
    fn default() -> Self {
        Self {
            min_mint_amount: 1,
            relayer_fee_bps: 0,
        }
    }
}

impl MintConfig {
    /// Configuration with a relayer fee.
    pub fn with_relayer_fee_bps(mut self, bps: u32) -> Self {
        self.relayer_fee_bps = bps;
        self
    }

    /// Configuration with a minimum mint amount.
    pub fn with_min_mint_amount(mut self, min: u128) -> Self {
        self.min_mint_amount = min;
        self
    }
}

/// Receipt for a successful verify-and-mint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MintReceipt {
    /// The nullifier spent by this redemption.
    pub nullifier: Nullifier,
    /// Credited account.
    pub recipient: LedgerAddress,
    /// Gross redeemed amount.
    pub amount: u128,
    /// Relayer fee withheld.
    pub fee: u128,
    /// Net amount credited (`amount - fee`).
    pub credited: u128,
    /// Destination-ledger transaction reference.
    pub dest_tx_ref: String,
    /// Unix time of the mint.
    pub minted_at: u64,
}

/// Record of a burn, queued for the relayer to carry to the other ledger.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BurnRecord {
    /// Account whose balance was debited.
    pub sender: LedgerAddress,
    /// Burned amount.
    pub amount: u128,
    /// Commitment the burned value should be locked under on the other
    /// side.
    pub destination_commitment: Commitment,
    /// Unix time of the burn.
    pub burned_at: u64,
}

#[derive(Default)]
struct MintInner {
    balances: HashMap<LedgerAddress, u128>,
    used_nullifiers: HashSet<Nullifier>,
    total_minted: u128,
    total_burned: u128,
    burn_queue: Vec<BurnRecord>,
    paused: bool,
}

/// The destination-side ledger gating mints on proof verification and
/// nullifier uniqueness.
///
/// At-most-once redemption is structural: the used-nullifier check and the
/// mark-used write are a single `HashSet::insert` inside one critical
/// section, so two concurrent redemptions of the same nullifier cannot
/// both pass. Proof verification — the only slow step — happens before
/// that critical section, with no lock held.
pub struct MintLedger {
    config: MintConfig,
    oracle: Arc<dyn ProofOracle>,
    inner: RwLock<MintInner>,
}

impl MintLedger {
    /// Create a mint ledger delegating verification to `oracle`.
    pub fn new(config: MintConfig, oracle: Arc<dyn ProofOracle>) -> Self {
        Self {
            config,
            oracle,
            inner: RwLock::new(MintInner::default()),
        }
    }

    /// The ledger's configuration.
    pub fn config(&self) -> &MintConfig {
        &self.config
    }

    /// Verify `bundle` against `public` and, if the nullifier is unspent,
    /// credit `recipient` with `amount` minus the relayer fee.
    ///
    /// Failure order: `NullifierUsed`, then `ProofInvalid`, then
    /// `RecipientMismatch`. Verification always goes through the oracle —
    /// there is no structural bypass.
    pub async fn verify_and_mint(
        &self,
        bundle: &ProofBundle,
        public: &PublicInputs,
        recipient: &LedgerAddress,
        amount: u128,
    ) -> LedgerResult<MintReceipt> {
        if amount < self.config.min_mint_amount {
            return Err(LedgerError::AmountTooLow {
                min: self.config.min_mint_amount,
                got: amount,
            });
        }

        // Fast-path rejection before paying for verification. The
        // authoritative check is the atomic insert below.
        {
            let inner = self.inner.read().await;
            if inner.paused {
                return Err(LedgerError::LedgerPaused);
            }
            if inner.used_nullifiers.contains(&public.nullifier) {
                return Err(LedgerError::NullifierUsed(public.nullifier));
            }
        }

        // Slow step: no ledger lock held.
        let valid = self
            .oracle
            .verify_proof(TRANSFER_CIRCUIT, bundle, public)
            .await?;
        if !valid {
            tracing::warn!(
                commitment = %public.commitment,
                nullifier = %public.nullifier,
                "Proof verification failed"
            );
            return Err(LedgerError::ProofInvalid);
        }

        if RecipientHash::of(recipient) != public.recipient_hash {
            return Err(LedgerError::RecipientMismatch);
        }

        // Atomic check-and-set: uniqueness check and mark-used are one
        // insert; all fallible arithmetic happens before it so a failure
        // cannot leave the nullifier burned without a credit.
        let mut inner = self.inner.write().await;
        if inner.paused {
            return Err(LedgerError::LedgerPaused);
        }

        let fee = amount
            .checked_mul(self.config.relayer_fee_bps as u128)
            .ok_or(LedgerError::ArithmeticOverflow)?
            / BPS_DENOMINATOR;
        let credited = amount.checked_sub(fee).ok_or(LedgerError::ArithmeticOverflow)?;
        let balance = inner.balances.get(recipient).copied().unwrap_or(0);
        let new_balance = balance
            .checked_add(credited)
            .ok_or(LedgerError::ArithmeticOverflow)?;
        let new_total = inner
            .total_minted
            .checked_add(credited)
            .ok_or(LedgerError::ArithmeticOverflow)?;

        if !inner.used_nullifiers.insert(public.nullifier) {
            return Err(LedgerError::NullifierUsed(public.nullifier));
        }
        inner.balances.insert(recipient.clone(), new_balance);
        inner.total_minted = new_total;

        let minted_at = unix_now();
        let dest_tx_ref = mint_tx_ref(&public.nullifier, minted_at);
        tracing::info!(
            commitment = %public.commitment,
            nullifier = %public.nullifier,
            recipient = %recipient,
            amount,
            fee,
            "Verified proof and minted"
        );

        Ok(MintReceipt {
            nullifier: public.nullifier,
            recipient: recipient.clone(),
            amount,
            fee,
            credited,
            dest_tx_ref,
            minted_at,
        })
    }

    /// Debit the caller and queue a burn record for the reverse
    /// direction.
    pub async fn burn_and_bridge(
        &self,
        sender: &LedgerAddress,
        amount: u128,
        destination_commitment: Commitment,
    ) -> LedgerResult<BurnRecord> {
        let mut inner = self.inner.write().await;
        if inner.paused {
            return Err(LedgerError::LedgerPaused);
        }

        let balance = inner.balances.get(sender).copied().unwrap_or(0);
        if balance < amount {
            return Err(LedgerError::InsufficientBalance {
                have: balance,
                need: amount,
            });
        }
        let new_total_burned = inner
            .total_burned
            .checked_add(amount)
            .ok_or(LedgerError::ArithmeticOverflow)?;

        inner.balances.insert(sender.clone(), balance - amount);
        inner.total_burned = new_total_burned;

        let record = BurnRecord {
            sender: sender.clone(),
            amount,
            destination_commitment,
            burned_at: unix_now(),
        };
        inner.burn_queue.push(record.clone());

        tracing::info!(
            sender = %sender,
            amount,
            destination_commitment = %destination_commitment,
            "Burned for reverse bridge"
        );
        Ok(record)
    }

    /// Move balance between two destination accounts.
    pub async fn transfer(
        &self,
        from: &LedgerAddress,
        to: &LedgerAddress,
        amount: u128,
    ) -> LedgerResult<()> {
        let mut inner = self.inner.write().await;
        if inner.paused {
            return Err(LedgerError::LedgerPaused);
        }

        let from_balance = inner.balances.get(from).copied().unwrap_or(0);
        if from_balance < amount {
            return Err(LedgerError::InsufficientBalance {
                have: from_balance,
                need: amount,
            });
        }
        let to_balance = inner.balances.get(to).copied().unwrap_or(0);
        let new_to = to_balance
            .checked_add(amount)
            .ok_or(LedgerError::ArithmeticOverflow)?;

        inner.balances.insert(from.clone(), from_balance - amount);
        inner.balances.insert(to.clone(), new_to);
        Ok(())
    }

    /// Balance of a destination account.
    pub async fn balance_of(&self, account: &LedgerAddress) -> u128 {
        self.inner.read().await.balances.get(account).copied().unwrap_or(0)
    }

    /// Whether a nullifier has been spent.
    pub async fn nullifier_used(&self, nullifier: &Nullifier) -> bool {
        self.inner.read().await.used_nullifiers.contains(nullifier)
    }

    /// Total net amount ever minted.
    pub async fn total_minted(&self) -> u128 {
        self.inner.read().await.total_minted
    }

    /// Total amount ever burned.
    pub async fn total_burned(&self) -> u128 {
        self.inner.read().await.total_burned
    }

    /// Drain queued burn records for the relayer.
    pub async fn take_burn_records(&self) -> Vec<BurnRecord> {
        std::mem::take(&mut self.inner.write().await.burn_queue)
    }

    /// Pause or unpause the ledger.
    pub async fn set_paused(&self, paused: bool) {
        self.inner.write().await.paused = paused;
    }
}

fn mint_tx_ref(nullifier: &Nullifier, minted_at: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"zkbridge.mint.v1");
    hasher.update(nullifier.to_bytes());
    hasher.update(minted_at.to_be_bytes());
    format!("mint:{}", hex::encode(&hasher.finalize()[..12]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkbridge_common::{build_commitment, Fr};
    use zkbridge_oracle::{MockOracle, PrivateInputs};

    struct Fixture {
        ledger: MintLedger,
        bundle: ProofBundle,
        public: PublicInputs,
        recipient: LedgerAddress,
    }

    async fn fixture_with_config(config: MintConfig, amount: u128) -> Fixture {
        let oracle = Arc::new(MockOracle::new());
        let recipient = LedgerAddress::new("5GRECIPIENT...DEST");
        let sender_secret = Fr::from(7u64);
        let (commitment, nullifier, nonce) = build_commitment(amount, sender_secret).unwrap();
        let public = PublicInputs {
            commitment,
            nullifier,
            recipient_hash: RecipientHash::of(&recipient),
        };
        let private = PrivateInputs {
            amount,
            nonce,
            sender_secret,
        };
        let bundle = oracle
            .generate_proof(TRANSFER_CIRCUIT, &private, &public)
            .await
            .unwrap();
        Fixture {
            ledger: MintLedger::new(config, oracle),
            bundle,
            public,
            recipient,
        }
    }

    async fn fixture(amount: u128) -> Fixture {
        fixture_with_config(MintConfig::default(), amount).await
    }

    #[tokio::test]
    async fn mint_credits_recipient_and_marks_nullifier() {
        let f = fixture(100).await;
        let receipt = f
            .ledger
            .verify_and_mint(&f.bundle, &f.public, &f.recipient, 100)
            .await
            .unwrap();

        assert_eq!(receipt.credited, 100);
        assert_eq!(f.ledger.balance_of(&f.recipient).await, 100);
        assert!(f.ledger.nullifier_used(&f.public.nullifier).await);
        assert_eq!(f.ledger.total_minted().await, 100);
    }

    #[tokio::test]
    async fn second_redemption_of_same_nullifier_fails() {
        let f = fixture(100).await;
        f.ledger
            .verify_and_mint(&f.bundle, &f.public, &f.recipient, 100)
            .await
            .unwrap();

        let err = f
            .ledger
            .verify_and_mint(&f.bundle, &f.public, &f.recipient, 100)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NullifierUsed(_)));
        // Exactly one credit.
        assert_eq!(f.ledger.balance_of(&f.recipient).await, 100);
        assert_eq!(f.ledger.total_minted().await, 100);
    }

    #[tokio::test]
    async fn tampered_proof_is_rejected() {
        let f = fixture(100).await;
        let mut bad = f.bundle.clone();
        bad.proof[0] ^= 0xff;

        let err = f
            .ledger
            .verify_and_mint(&bad, &f.public, &f.recipient, 100)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ProofInvalid));
        // A rejected proof burns nothing.
        assert!(!f.ledger.nullifier_used(&f.public.nullifier).await);
        assert_eq!(f.ledger.balance_of(&f.recipient).await, 0);
    }

    #[tokio::test]
    async fn wrong_recipient_is_rejected() {
        let f = fixture(100).await;
        let other = LedgerAddress::new("5GSOMEONE...ELSE");
        let err = f
            .ledger
            .verify_and_mint(&f.bundle, &f.public, &other, 100)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::RecipientMismatch));
        assert_eq!(f.ledger.balance_of(&other).await, 0);
    }

    #[tokio::test]
    async fn relayer_fee_is_deducted() {
        let f = fixture_with_config(MintConfig::default().with_relayer_fee_bps(30), 10_000).await;
        let receipt = f
            .ledger
            .verify_and_mint(&f.bundle, &f.public, &f.recipient, 10_000)
            .await
            .unwrap();

        assert_eq!(receipt.fee, 30);
        assert_eq!(receipt.credited, 9_970);
        assert_eq!(f.ledger.balance_of(&f.recipient).await, 9_970);
        assert_eq!(f.ledger.total_minted().await, 9_970);
    }

    #[tokio::test]
    async fn amount_below_minimum_is_rejected() {
        let f = fixture_with_config(MintConfig::default().with_min_mint_amount(1_000), 100).await;
        let err = f
            .ledger
            .verify_and_mint(&f.bundle, &f.public, &f.recipient, 100)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AmountTooLow { .. }));
    }

    #[tokio::test]
    async fn burn_debits_balance_and_queues_record() {
        let f = fixture(100).await;
        f.ledger
            .verify_and_mint(&f.bundle, &f.public, &f.recipient, 100)
            .await
            .unwrap();

        let destination = Commitment::from_fr(Fr::from(424242u64));
        let record = f
            .ledger
            .burn_and_bridge(&f.recipient, 40, destination)
            .await
            .unwrap();
        assert_eq!(record.amount, 40);

        assert_eq!(f.ledger.balance_of(&f.recipient).await, 60);
        assert_eq!(f.ledger.total_burned().await, 40);

        let queued = f.ledger.take_burn_records().await;
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].destination_commitment, destination);
        assert!(f.ledger.take_burn_records().await.is_empty());
    }

    #[tokio::test]
    async fn burn_beyond_balance_is_rejected() {
        let f = fixture(100).await;
        let destination = Commitment::from_fr(Fr::from(1u64));
        let err = f
            .ledger
            .burn_and_bridge(&f.recipient, 40, destination)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientBalance { have: 0, need: 40 }
        ));
    }

    #[tokio::test]
    async fn transfer_conserves_total_balance() {
        let f = fixture(100).await;
        f.ledger
            .verify_and_mint(&f.bundle, &f.public, &f.recipient, 100)
            .await
            .unwrap();

        let other = LedgerAddress::new("5GOTHER...DEST");
        f.ledger.transfer(&f.recipient, &other, 30).await.unwrap();

        assert_eq!(f.ledger.balance_of(&f.recipient).await, 70);
        assert_eq!(f.ledger.balance_of(&other).await, 30);

        // total_minted - total_burned == sum(balances)
        let sum = f.ledger.balance_of(&f.recipient).await + f.ledger.balance_of(&other).await;
        assert_eq!(
            f.ledger.total_minted().await - f.ledger.total_burned().await,
            sum
        );

        let err = f.ledger.transfer(&other, &f.recipient, 31).await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
    }

    #[tokio::test]
    async fn paused_ledger_rejects_mint() {
        let f = fixture(100).await;
        f.ledger.set_paused(true).await;
        let err = f
            .ledger
            .verify_and_mint(&f.bundle, &f.public, &f.recipient, 100)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::LedgerPaused));
    }
}
