//! The untrusted relayer boundary.

use std::sync::Arc;

use zkbridge_common::Commitment;
use zkbridge_ledger::{BurnRecord, EscrowLedger, LedgerResult, MintLedger, MintReceipt};
use zkbridge_oracle::{ProofBundle, PublicInputs};

use crate::transfer::TransferRequest;

/// Carries proofs and confirmations between the two ledgers.
///
/// The relayer is untrusted by construction: everything it forwards to
/// the destination is re-verified there (proof against the oracle,
/// nullifier against the used set), and the settlement confirmation it
/// carries back only stops an already-redeemed lock from being refunded —
/// it cannot release anything on its own. A malicious or absent relayer
/// can delay a transfer, never steal or double-spend it.
pub struct Relayer {
    escrow: Arc<EscrowLedger>,
    mint: Arc<MintLedger>,
}

impl Relayer {
    /// Create a relayer between the two ledgers.
    pub fn new(escrow: Arc<EscrowLedger>, mint: Arc<MintLedger>) -> Self {
        Self { escrow, mint }
    }

    /// Forward a proof to the destination ledger for verification and
    /// minting. The destination does all the checking.
    pub async fn submit_to_destination(
        &self,
        bundle: &ProofBundle,
        public: &PublicInputs,
        request: &TransferRequest,
    ) -> LedgerResult<MintReceipt> {
        tracing::debug!(
            commitment = %public.commitment,
            nullifier = %public.nullifier,
            "Relaying proof to destination ledger"
        );
        self.mint
            .verify_and_mint(bundle, public, &request.recipient, request.amount)
            .await
    }

    /// Carry the settlement confirmation back to the source ledger.
    pub async fn confirm_settlement(&self, commitment: &Commitment) -> LedgerResult<()> {
        tracing::debug!(commitment = %commitment, "Relaying settlement confirmation to source");
        self.escrow.settle(commitment).await
    }

    /// Drain burn records observed on the destination ledger, for the
    /// reverse bridging direction.
    pub async fn observe_burns(&self) -> Vec<BurnRecord> {
        self.mint.take_burn_records().await
    }
}
