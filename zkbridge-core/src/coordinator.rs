//! The bridge coordinator: drives transfers through the state machine.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use zkbridge_common::{unix_now, Fr, RecipientHash, TransferSecret};
use zkbridge_ledger::{EscrowLedger, MintLedger, RefundReceipt};
use zkbridge_oracle::{PrivateInputs, ProofOracle, PublicInputs, TRANSFER_CIRCUIT};

use crate::error::{BridgeError, BridgeResult};
use crate::events::{EventBus, TransferEvent};
use crate::relayer::Relayer;
use crate::transfer::{
    ensure_transition, transfer_id_hex, BridgeTransfer, TransferId, TransferRequest,
    TransferStatus,
};

/// Owns the transfer lifecycle across the two ledgers.
///
/// The ledgers and oracle are explicit handles passed in at construction,
/// shared by `Arc`. Transfers run as independent pipelines; the only
/// cross-transfer shared state is inside the ledgers, which serialize
/// their own mutations. Proof generation and verification — the slow
/// steps — run with no ledger lock held.
pub struct BridgeCoordinator {
    escrow: Arc<EscrowLedger>,
    mint: Arc<MintLedger>,
    oracle: Arc<dyn ProofOracle>,
    relayer: Relayer,
    transfers: RwLock<HashMap<TransferId, BridgeTransfer>>,
    events: EventBus,
}

impl BridgeCoordinator {
    /// Create a coordinator over the given ledgers and oracle.
    pub fn new(
        escrow: Arc<EscrowLedger>,
        mint: Arc<MintLedger>,
        oracle: Arc<dyn ProofOracle>,
    ) -> Self {
        let relayer = Relayer::new(Arc::clone(&escrow), Arc::clone(&mint));
        Self {
            escrow,
            mint,
            oracle,
            relayer,
            transfers: RwLock::new(HashMap::new()),
            events: EventBus::default(),
        }
    }

    /// The source-side escrow ledger.
    pub fn escrow(&self) -> &Arc<EscrowLedger> {
        &self.escrow
    }

    /// The destination-side mint ledger.
    pub fn mint(&self) -> &Arc<MintLedger> {
        &self.mint
    }

    /// Subscribe to transfer step events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<TransferEvent> {
        self.events.subscribe()
    }

    /// Run a transfer end to end: lock on the source, prove, locally
    /// verify, submit to the destination, settle the source lock.
    ///
    /// The secret transfer data lives only for the duration of this call
    /// and is dropped right after proof generation. The returned record
    /// reflects the terminal (or `Locked`-awaiting-refund) state; a
    /// failure is surfaced as `status == Failed` with the error recorded
    /// verbatim, not as an `Err` from this method.
    pub async fn bridge(
        &self,
        request: TransferRequest,
        sender_secret: Fr,
    ) -> BridgeResult<BridgeTransfer> {
        request.validate()?;
        let secret = TransferSecret::generate(request.amount, sender_secret)?;

        let recipient_hash = RecipientHash::of(&request.recipient);
        let transfer = BridgeTransfer::new(&request, recipient_hash);
        let id = transfer.id;

        self.transfers.write().await.insert(id, transfer);
        self.events.emit(TransferEvent {
            transfer_id: id,
            status: TransferStatus::Pending,
            step: "pending".to_string(),
            message: "Transfer created".to_string(),
            timestamp: unix_now(),
            is_error: false,
        });
        tracing::info!(
            transfer_id = %transfer_id_hex(&id),
            source = %request.source_chain,
            destination = %request.dest_chain,
            amount = request.amount,
            "Initiated bridge transfer"
        );

        if let Err(err) = self.run_pipeline(&id, &request, secret, recipient_hash).await {
            self.handle_pipeline_error(&id, err).await;
        }

        self.get_transfer(&id)
            .await
            .ok_or_else(|| BridgeError::TransferNotFound(transfer_id_hex(&id)))
    }

    async fn run_pipeline(
        &self,
        id: &TransferId,
        request: &TransferRequest,
        secret: TransferSecret,
        recipient_hash: RecipientHash,
    ) -> BridgeResult<()> {
        let public = PublicInputs {
            commitment: secret.commitment(),
            nullifier: secret.nullifier(),
            recipient_hash,
        };

        self.ensure_not_cancelled(id).await?;

        // Lock on the source ledger.
        let lock_receipt = self
            .escrow
            .lock(public.commitment, request.amount, request.sender.clone())
            .await?;
        let commitment = public.commitment;
        let nullifier = public.nullifier;
        self.advance_with(
            id,
            TransferStatus::Locked,
            "locked",
            format!("Locked {} units in escrow", request.amount),
            Some(lock_receipt.source_tx_ref.clone()),
            move |t| {
                t.commitment = Some(commitment);
                t.nullifier = Some(nullifier);
                t.source_tx_ref = Some(lock_receipt.source_tx_ref);
            },
        )
        .await?;

        // Cancellation here routes to the refund path: the transfer stays
        // Locked and becomes refundable after the escrow timeout.
        self.ensure_not_cancelled(id).await?;

        self.advance(
            id,
            TransferStatus::Proving,
            "proving",
            "Generating zero-knowledge proof".to_string(),
            None,
        )
        .await?;

        let private = PrivateInputs {
            amount: secret.amount,
            nonce: secret.nonce,
            sender_secret: secret.sender_secret,
        };
        let bundle = self
            .oracle
            .generate_proof(TRANSFER_CIRCUIT, &private, &public)
            .await?;
        // The secret is consumed by proof generation and not kept around.
        drop(secret);
        drop(private);

        // A cancellation that raced proof generation discards the proof.
        self.ensure_not_cancelled(id).await?;

        // Local check before submission: the bundle must be bound to the
        // public inputs we expect and must verify.
        bundle.ensure_binding(TRANSFER_CIRCUIT, &public)?;
        if !self
            .oracle
            .verify_proof(TRANSFER_CIRCUIT, &bundle, &public)
            .await?
        {
            return Err(BridgeError::ProofInvalid);
        }

        let submitted_bundle = bundle.clone();
        self.advance_with(
            id,
            TransferStatus::Submitted,
            "submitted",
            "Proof locally verified and handed to relayer".to_string(),
            None,
            move |t| t.proof = Some(submitted_bundle),
        )
        .await?;

        // Destination: atomic nullifier spend + mint.
        let mint_receipt = self
            .relayer
            .submit_to_destination(&bundle, &public, request)
            .await?;
        let dest_tx_ref = mint_receipt.dest_tx_ref.clone();
        self.advance_with(
            id,
            TransferStatus::Verified,
            "verified",
            format!(
                "Destination verified proof and minted {} units",
                mint_receipt.credited
            ),
            Some(mint_receipt.dest_tx_ref.clone()),
            move |t| t.dest_tx_ref = Some(dest_tx_ref),
        )
        .await?;

        // Settlement confirmation back to the source ledger.
        self.relayer.confirm_settlement(&public.commitment).await?;
        self.advance(
            id,
            TransferStatus::Settled,
            "settled",
            "Source lock settled".to_string(),
            None,
        )
        .await?;

        Ok(())
    }

    /// Request cancellation of a transfer.
    ///
    /// Permitted while `Pending`, `Locked` (the lock stays refundable
    /// after the timeout), or `Proving` (the in-flight proof is
    /// discarded). From `Submitted` on the pipeline runs to
    /// `Verified`/`Failed`.
    pub async fn cancel(&self, id: &TransferId) -> BridgeResult<BridgeTransfer> {
        let mut transfers = self.transfers.write().await;
        let transfer = transfers
            .get_mut(id)
            .ok_or_else(|| BridgeError::TransferNotFound(transfer_id_hex(id)))?;

        if !transfer.status.is_cancellable() {
            return Err(BridgeError::NotCancellable(transfer.status));
        }

        transfer.cancel_requested = true;
        transfer.push_step("cancel-requested", "Cancellation requested", None, false);
        self.events.emit(TransferEvent {
            transfer_id: *id,
            status: transfer.status,
            step: "cancel-requested".to_string(),
            message: "Cancellation requested".to_string(),
            timestamp: unix_now(),
            is_error: false,
        });
        tracing::info!(transfer_id = %transfer_id_hex(id), "Cancellation requested");
        Ok(transfer.clone())
    }

    /// Refund the escrow lock behind a transfer that never reached
    /// `Verified`. Subject to the escrow timeout.
    pub async fn refund(&self, id: &TransferId) -> BridgeResult<RefundReceipt> {
        let (commitment, status) = {
            let transfers = self.transfers.read().await;
            let transfer = transfers
                .get(id)
                .ok_or_else(|| BridgeError::TransferNotFound(transfer_id_hex(id)))?;
            (transfer.commitment, transfer.status)
        };

        if !matches!(status, TransferStatus::Locked | TransferStatus::Failed) {
            return Err(BridgeError::InvalidTransition {
                from: status,
                to: TransferStatus::Refunded,
            });
        }
        let commitment = commitment.ok_or_else(|| {
            BridgeError::InvalidRequest("transfer has no escrow lock to refund".to_string())
        })?;

        let receipt = self.escrow.refund(&commitment).await?;

        let mut transfers = self.transfers.write().await;
        if let Some(transfer) = transfers.get_mut(id) {
            // A still-Locked transfer moves to Refunded; a Failed one
            // stays Failed and only gets the audit entry.
            if transfer.status == TransferStatus::Locked {
                ensure_transition(transfer.status, TransferStatus::Refunded)?;
                transfer.status = TransferStatus::Refunded;
                transfer.updated_at = unix_now();
            }
            transfer.push_step(
                "refunded",
                format!("Escrow refunded {} units to sender", receipt.amount),
                None,
                false,
            );
            self.events.emit(TransferEvent {
                transfer_id: *id,
                status: transfer.status,
                step: "refunded".to_string(),
                message: format!("Escrow refunded {} units to sender", receipt.amount),
                timestamp: unix_now(),
                is_error: false,
            });
        }
        Ok(receipt)
    }

    /// Snapshot of a transfer.
    pub async fn get_transfer(&self, id: &TransferId) -> Option<BridgeTransfer> {
        self.transfers.read().await.get(id).cloned()
    }

    /// All transfers, including terminal ones.
    pub async fn transfer_history(&self) -> Vec<BridgeTransfer> {
        self.transfers.read().await.values().cloned().collect()
    }

    /// Transfers not yet in a terminal state.
    pub async fn active_transfers(&self) -> Vec<BridgeTransfer> {
        self.transfers
            .read()
            .await
            .values()
            .filter(|t| !t.status.is_terminal())
            .cloned()
            .collect()
    }

    /// Checked at every step boundary: a cancel request or an elapsed
    /// caller deadline both stop the pipeline the same way.
    async fn ensure_not_cancelled(&self, id: &TransferId) -> BridgeResult<()> {
        let transfers = self.transfers.read().await;
        match transfers.get(id) {
            Some(t) if t.cancel_requested => Err(BridgeError::Cancelled),
            Some(t) if t.deadline.is_some_and(|d| unix_now() > d) => {
                Err(BridgeError::DeadlineExceeded)
            }
            Some(_) => Ok(()),
            None => Err(BridgeError::TransferNotFound(transfer_id_hex(id))),
        }
    }

    async fn advance(
        &self,
        id: &TransferId,
        to: TransferStatus,
        step: &str,
        message: String,
        tx_ref: Option<String>,
    ) -> BridgeResult<()> {
        self.advance_with(id, to, step, message, tx_ref, |_| {}).await
    }

    async fn advance_with<F>(
        &self,
        id: &TransferId,
        to: TransferStatus,
        step: &str,
        message: String,
        tx_ref: Option<String>,
        mutate: F,
    ) -> BridgeResult<()>
    where
        F: FnOnce(&mut BridgeTransfer),
    {
        let mut transfers = self.transfers.write().await;
        let transfer = transfers
            .get_mut(id)
            .ok_or_else(|| BridgeError::TransferNotFound(transfer_id_hex(id)))?;

        ensure_transition(transfer.status, to)?;
        transfer.status = to;
        transfer.updated_at = unix_now();
        mutate(transfer);
        transfer.push_step(step, message.clone(), tx_ref, false);

        tracing::info!(
            transfer_id = %transfer_id_hex(id),
            status = ?to,
            "Transfer advanced"
        );
        self.events.emit(TransferEvent {
            transfer_id: *id,
            status: to,
            step: step.to_string(),
            message,
            timestamp: unix_now(),
            is_error: false,
        });
        Ok(())
    }

    async fn handle_pipeline_error(&self, id: &TransferId, err: BridgeError) {
        let mut transfers = self.transfers.write().await;
        let Some(transfer) = transfers.get_mut(id) else {
            return;
        };

        // Cancellation (or an elapsed deadline) caught at the Locked
        // boundary keeps the lock: the transfer waits out the escrow
        // timeout and is refunded from there.
        if matches!(err, BridgeError::Cancelled | BridgeError::DeadlineExceeded)
            && transfer.status == TransferStatus::Locked
        {
            transfer.push_step(
                "cancelled",
                "Cancelled; escrow lock refundable after timeout",
                None,
                true,
            );
            self.events.emit(TransferEvent {
                transfer_id: *id,
                status: transfer.status,
                step: "cancelled".to_string(),
                message: "Cancelled; escrow lock refundable after timeout".to_string(),
                timestamp: unix_now(),
                is_error: true,
            });
            return;
        }

        if transfer.status.is_terminal() {
            return;
        }

        let message = err.to_string();
        transfer.status = TransferStatus::Failed;
        transfer.error = Some(message.clone());
        transfer.updated_at = unix_now();
        transfer.push_step("failed", message.clone(), None, true);

        tracing::warn!(
            transfer_id = %transfer_id_hex(id),
            error = %message,
            "Transfer failed"
        );
        self.events.emit(TransferEvent {
            transfer_id: *id,
            status: TransferStatus::Failed,
            step: "failed".to_string(),
            message,
            timestamp: unix_now(),
            is_error: true,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use zkbridge_common::{ChainId, LedgerAddress};
    use zkbridge_ledger::{EscrowConfig, LedgerError, MintConfig};
    use zkbridge_oracle::{MockOracle, OracleResult, ProofBundle};

    fn request(amount: u128) -> TransferRequest {
        TransferRequest::new(
            ChainId::Stellar,
            ChainId::Polkadot,
            amount,
            LedgerAddress::new("GSENDER...SOURCE"),
            LedgerAddress::new("5GRECIPIENT...DEST"),
        )
    }

    fn coordinator_with_oracle(oracle: Arc<dyn ProofOracle>) -> BridgeCoordinator {
        let escrow = Arc::new(EscrowLedger::new(
            EscrowConfig::default().with_refund_timeout(0),
        ));
        let mint = Arc::new(MintLedger::new(MintConfig::default(), Arc::clone(&oracle)));
        BridgeCoordinator::new(escrow, mint, oracle)
    }

    fn coordinator() -> (BridgeCoordinator, Arc<MockOracle>) {
        let oracle = Arc::new(MockOracle::new());
        (coordinator_with_oracle(oracle.clone()), oracle)
    }

    /// Oracle wrapper that makes proof generation observably slow.
    struct SlowOracle {
        inner: MockOracle,
        delay: Duration,
    }

    #[async_trait]
    impl ProofOracle for SlowOracle {
        async fn generate_proof(
            &self,
            circuit_id: &str,
            private: &PrivateInputs,
            public: &PublicInputs,
        ) -> OracleResult<ProofBundle> {
            tokio::time::sleep(self.delay).await;
            self.inner.generate_proof(circuit_id, private, public).await
        }

        async fn verify_proof(
            &self,
            circuit_id: &str,
            bundle: &ProofBundle,
            public: &PublicInputs,
        ) -> OracleResult<bool> {
            self.inner.verify_proof(circuit_id, bundle, public).await
        }
    }

    #[tokio::test]
    async fn round_trip_settles_and_moves_value() {
        let (coordinator, _) = coordinator();
        let mut events = coordinator.subscribe();

        let transfer = coordinator
            .bridge(request(100), Fr::from(7u64))
            .await
            .unwrap();

        assert_eq!(transfer.status, TransferStatus::Settled);
        assert!(transfer.error.is_none());
        assert!(transfer.proof.is_some());

        let recipient = LedgerAddress::new("5GRECIPIENT...DEST");
        assert_eq!(coordinator.mint().balance_of(&recipient).await, 100);
        assert!(
            coordinator
                .mint()
                .nullifier_used(&transfer.nullifier.unwrap())
                .await
        );
        // The settled lock left total_locked.
        assert_eq!(coordinator.escrow().total_locked().await, 0);

        // Subscribers observe the ordered step sequence.
        let mut steps = Vec::new();
        while let Ok(event) = events.try_recv() {
            steps.push(event.step);
        }
        assert_eq!(
            steps,
            vec!["pending", "locked", "proving", "submitted", "verified", "settled"]
        );
    }

    #[tokio::test]
    async fn replaying_a_settled_proof_is_rejected() {
        let (coordinator, _) = coordinator();
        let transfer = coordinator
            .bridge(request(100), Fr::from(7u64))
            .await
            .unwrap();
        assert_eq!(transfer.status, TransferStatus::Settled);

        let bundle = transfer.proof.clone().unwrap();
        let public = PublicInputs {
            commitment: transfer.commitment.unwrap(),
            nullifier: transfer.nullifier.unwrap(),
            recipient_hash: transfer.recipient_hash,
        };
        let err = coordinator
            .mint()
            .verify_and_mint(&bundle, &public, &transfer.recipient, transfer.amount)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NullifierUsed(_)));
        assert_eq!(coordinator.mint().balance_of(&transfer.recipient).await, 100);
    }

    #[tokio::test]
    async fn prover_failure_leaves_lock_refundable() {
        let (coordinator, oracle) = coordinator();
        oracle.set_unavailable(true);

        let transfer = coordinator
            .bridge(request(50), Fr::from(7u64))
            .await
            .unwrap();

        assert_eq!(transfer.status, TransferStatus::Failed);
        let error = transfer.error.clone().unwrap();
        assert!(error.contains("prover unavailable"), "{error}");
        assert!(transfer.step_log.iter().any(|s| s.is_error));

        // The lock is still held...
        assert_eq!(coordinator.escrow().total_locked().await, 50);
        let recipient = LedgerAddress::new("5GRECIPIENT...DEST");
        assert_eq!(coordinator.mint().balance_of(&recipient).await, 0);

        // ...and refundable after the (zero) timeout.
        let receipt = coordinator.refund(&transfer.id).await.unwrap();
        assert_eq!(receipt.amount, 50);
        assert_eq!(coordinator.escrow().total_locked().await, 0);

        // The transfer stays Failed; the refund is an audit entry.
        let after = coordinator.get_transfer(&transfer.id).await.unwrap();
        assert_eq!(after.status, TransferStatus::Failed);
        assert!(after.step_log.iter().any(|s| s.step == "refunded"));
    }

    #[tokio::test]
    async fn refund_before_timeout_is_rejected() {
        let oracle = Arc::new(MockOracle::new());
        let escrow = Arc::new(EscrowLedger::new(EscrowConfig::default()));
        let mint = Arc::new(MintLedger::new(
            MintConfig::default(),
            oracle.clone() as Arc<dyn ProofOracle>,
        ));
        let coordinator = BridgeCoordinator::new(escrow, mint, oracle.clone());

        oracle.set_unavailable(true);
        let transfer = coordinator
            .bridge(request(50), Fr::from(7u64))
            .await
            .unwrap();
        assert_eq!(transfer.status, TransferStatus::Failed);

        let err = coordinator.refund(&transfer.id).await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Ledger(LedgerError::TooEarly { .. })
        ));
        assert_eq!(coordinator.escrow().total_locked().await, 50);
    }

    #[tokio::test]
    async fn cancel_during_proving_discards_the_proof() {
        let oracle = Arc::new(SlowOracle {
            inner: MockOracle::new(),
            delay: Duration::from_millis(200),
        });
        let coordinator = Arc::new(coordinator_with_oracle(oracle));

        let driver = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.bridge(request(100), Fr::from(7u64)).await })
        };

        // Let the pipeline reach Proving, then cancel.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let active = coordinator.active_transfers().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].status, TransferStatus::Proving);
        coordinator.cancel(&active[0].id).await.unwrap();

        let transfer = driver.await.unwrap().unwrap();
        assert_eq!(transfer.status, TransferStatus::Failed);
        assert!(transfer.error.unwrap().contains("cancelled"));
        // No proof was submitted anywhere.
        let recipient = LedgerAddress::new("5GRECIPIENT...DEST");
        assert_eq!(coordinator.mint().balance_of(&recipient).await, 0);
        assert!(transfer.proof.is_none());
        // The lock remains, eligible for refund after the timeout.
        assert_eq!(coordinator.escrow().total_locked().await, 100);
        coordinator.refund(&transfer.id).await.unwrap();
        assert_eq!(coordinator.escrow().total_locked().await, 0);
    }

    #[tokio::test]
    async fn elapsed_deadline_stops_the_pipeline() {
        let oracle = Arc::new(SlowOracle {
            inner: MockOracle::new(),
            delay: Duration::from_millis(2100),
        });
        let coordinator = coordinator_with_oracle(oracle);

        let request = request(100).with_deadline(unix_now() + 1);
        let transfer = coordinator.bridge(request, Fr::from(7u64)).await.unwrap();

        assert_eq!(transfer.status, TransferStatus::Failed);
        assert!(transfer.error.unwrap().contains("deadline"));
        // The proof was discarded; the lock waits for refund.
        assert!(transfer.proof.is_none());
        assert_eq!(coordinator.escrow().total_locked().await, 100);
    }

    #[tokio::test]
    async fn settled_transfers_cannot_be_cancelled() {
        let (coordinator, _) = coordinator();
        let transfer = coordinator
            .bridge(request(100), Fr::from(7u64))
            .await
            .unwrap();
        assert_eq!(transfer.status, TransferStatus::Settled);

        let err = coordinator.cancel(&transfer.id).await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::NotCancellable(TransferStatus::Settled)
        ));
    }

    #[tokio::test]
    async fn settled_transfers_cannot_be_refunded() {
        let (coordinator, _) = coordinator();
        let transfer = coordinator
            .bridge(request(100), Fr::from(7u64))
            .await
            .unwrap();

        let err = coordinator.refund(&transfer.id).await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn concurrent_transfers_do_not_interfere() {
        let (coordinator, _) = coordinator();
        let coordinator = Arc::new(coordinator);

        let mut handles = Vec::new();
        for i in 1..=4u64 {
            let coordinator = Arc::clone(&coordinator);
            handles.push(tokio::spawn(async move {
                coordinator
                    .bridge(request(100 * i as u128), Fr::from(i))
                    .await
            }));
        }

        for handle in handles {
            let transfer = handle.await.unwrap().unwrap();
            assert_eq!(transfer.status, TransferStatus::Settled);
        }

        let recipient = LedgerAddress::new("5GRECIPIENT...DEST");
        assert_eq!(
            coordinator.mint().balance_of(&recipient).await,
            100 + 200 + 300 + 400
        );
        assert_eq!(coordinator.escrow().total_locked().await, 0);
        assert_eq!(coordinator.transfer_history().await.len(), 4);
    }

    #[tokio::test]
    async fn transfer_step_log_is_append_only_audit_trail() {
        let (coordinator, _) = coordinator();
        let transfer = coordinator
            .bridge(request(100), Fr::from(7u64))
            .await
            .unwrap();

        let steps: Vec<&str> = transfer.step_log.iter().map(|s| s.step.as_str()).collect();
        assert_eq!(
            steps,
            vec!["pending", "locked", "proving", "submitted", "verified", "settled"]
        );
        // Lock and mint steps carry their ledger tx refs.
        assert!(transfer.step_log[1].tx_ref.as_deref().unwrap().starts_with("lock:"));
        assert!(transfer.step_log[4].tx_ref.as_deref().unwrap().starts_with("mint:"));
        // Timestamps never go backwards.
        for pair in transfer.step_log.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }
}
