//! Transfer records, statuses, and the transition guard.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use zkbridge_common::{unix_now, ChainId, Commitment, LedgerAddress, Nullifier, RecipientHash};
use zkbridge_oracle::ProofBundle;

use crate::error::{BridgeError, BridgeResult};

/// Unique transfer identifier.
pub type TransferId = [u8; 32];

/// Hex form of a transfer id, for display and URLs.
pub fn transfer_id_hex(id: &TransferId) -> String {
    format!("0x{}", hex::encode(id))
}

/// Parse a `0x`-prefixed (or bare) transfer id.
pub fn parse_transfer_id(s: &str) -> Option<TransferId> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    let mut id = [0u8; 32];
    hex::decode_to_slice(stripped, &mut id).ok()?;
    Some(id)
}

/// Status of a bridge transfer. Owned exclusively by the state machine;
/// every other component only reads the tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferStatus {
    /// Transfer created, nothing locked yet.
    Pending,
    /// Value locked in escrow under the commitment.
    Locked,
    /// Proof generation in progress.
    Proving,
    /// Proof locally verified and handed to the relayer.
    Submitted,
    /// Destination ledger accepted proof and nullifier.
    Verified,
    /// Destination credit confirmed and source lock settled.
    Settled,
    /// Transfer failed; error recorded on the transfer.
    Failed,
    /// Escrow lock returned to the sender after the timeout.
    Refunded,
}

impl TransferStatus {
    /// Human-readable description.
    pub fn description(&self) -> &str {
        match self {
            Self::Pending => "Pending initiation",
            Self::Locked => "Funds locked in escrow",
            Self::Proving => "Generating proof",
            Self::Submitted => "Proof submitted to destination",
            Self::Verified => "Proof verified on destination",
            Self::Settled => "Transfer settled",
            Self::Failed => "Transfer failed",
            Self::Refunded => "Escrow lock refunded",
        }
    }

    /// Whether this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled | Self::Failed | Self::Refunded)
    }

    /// Whether cancellation is permitted in this state. From `Submitted`
    /// on, the operation must run to `Verified`/`Failed`.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::Pending | Self::Locked | Self::Proving)
    }
}

/// Guard for state transitions.
///
/// Any non-terminal state may fail; the forward path is strictly
/// `Pending → Locked → Proving → Submitted → Verified → Settled`, and
/// `Refunded` is reachable only from `Locked`.
pub fn ensure_transition(from: TransferStatus, to: TransferStatus) -> BridgeResult<()> {
    use TransferStatus::*;
    let allowed = match (from, to) {
        (Pending, Locked)
        | (Locked, Proving)
        | (Proving, Submitted)
        | (Submitted, Verified)
        | (Verified, Settled)
        | (Locked, Refunded) => true,
        (from, Failed) => !from.is_terminal(),
        _ => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(BridgeError::InvalidTransition { from, to })
    }
}

/// One entry in a transfer's append-only audit log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferStep {
    /// Short step name (`"locked"`, `"proving"`, ...).
    pub step: String,
    /// Human-readable message.
    pub message: String,
    /// Unix time the step was recorded.
    pub timestamp: u64,
    /// Ledger transaction reference, when the step produced one.
    pub tx_ref: Option<String>,
    /// Whether this step records an error.
    pub is_error: bool,
}

/// A request to bridge value between two ledgers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Ledger the value is locked on.
    pub source_chain: ChainId,
    /// Ledger the value is minted on.
    pub dest_chain: ChainId,
    /// Amount to bridge, smallest units.
    pub amount: u128,
    /// Sender address on the source ledger.
    pub sender: LedgerAddress,
    /// Recipient address on the destination ledger.
    pub recipient: LedgerAddress,
    /// Optional deadline (Unix seconds). Honored as a cancellation
    /// signal at step boundaries, never as a ledger-enforced timeout.
    pub deadline: Option<u64>,
}

impl TransferRequest {
    /// Create a transfer request.
    pub fn new(
        source_chain: ChainId,
        dest_chain: ChainId,
        amount: u128,
        sender: LedgerAddress,
        recipient: LedgerAddress,
    ) -> Self {
        Self {
            source_chain,
            dest_chain,
            amount,
            sender,
            recipient,
            deadline: None,
        }
    }

    /// Set a deadline.
    pub fn with_deadline(mut self, deadline: u64) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Validate the request.
    pub fn validate(&self) -> BridgeResult<()> {
        if self.source_chain == self.dest_chain {
            return Err(BridgeError::InvalidRequest(
                "source and destination chains must differ".to_string(),
            ));
        }
        if self.amount == 0 {
            return Err(BridgeError::Commitment(
                zkbridge_common::CommitmentError::InvalidAmount(0),
            ));
        }
        if let Some(deadline) = self.deadline {
            if deadline <= unix_now() {
                return Err(BridgeError::InvalidRequest(
                    "deadline must be in the future".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Compute a unique transfer id.
    pub fn compute_id(&self) -> TransferId {
        let mut hasher = Sha256::new();
        hasher.update(b"zkbridge.transfer.v1");
        hasher.update(self.source_chain.as_u64().to_be_bytes());
        hasher.update(self.dest_chain.as_u64().to_be_bytes());
        hasher.update(self.sender.as_str().as_bytes());
        hasher.update(self.recipient.as_str().as_bytes());
        hasher.update(self.amount.to_be_bytes());

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        hasher.update(now.to_be_bytes());

        let mut id = [0u8; 32];
        id.copy_from_slice(&hasher.finalize());
        id
    }
}

/// A bridge transfer: the audit record the state machine mutates.
///
/// Retained indefinitely; the step log is append-only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BridgeTransfer {
    /// Unique id.
    pub id: TransferId,
    /// Source ledger.
    pub source_chain: ChainId,
    /// Destination ledger.
    pub dest_chain: ChainId,
    /// Amount being bridged.
    pub amount: u128,
    /// Sender address on the source ledger.
    pub sender: LedgerAddress,
    /// Recipient address on the destination ledger.
    pub recipient: LedgerAddress,
    /// Public binding of the recipient.
    pub recipient_hash: RecipientHash,
    /// Commitment, recorded when the escrow lock succeeds.
    pub commitment: Option<Commitment>,
    /// Nullifier, recorded when the escrow lock succeeds.
    pub nullifier: Option<Nullifier>,
    /// The proof bundle, once generated and locally verified.
    pub proof: Option<ProofBundle>,
    /// Current status.
    pub status: TransferStatus,
    /// Unix time of creation.
    pub created_at: u64,
    /// Unix time of the last status change.
    pub updated_at: u64,
    /// Error message, verbatim, when the transfer failed.
    pub error: Option<String>,
    /// Caller-supplied deadline, if any.
    pub deadline: Option<u64>,
    /// Source-ledger transaction reference.
    pub source_tx_ref: Option<String>,
    /// Destination-ledger transaction reference.
    pub dest_tx_ref: Option<String>,
    /// Set when the caller requested cancellation; checked by the
    /// pipeline at step boundaries.
    pub cancel_requested: bool,
    /// Append-only step log.
    pub step_log: Vec<TransferStep>,
}

impl BridgeTransfer {
    /// Create a pending transfer for a request.
    pub fn new(request: &TransferRequest, recipient_hash: RecipientHash) -> Self {
        let now = unix_now();
        let mut transfer = Self {
            id: request.compute_id(),
            source_chain: request.source_chain,
            dest_chain: request.dest_chain,
            amount: request.amount,
            sender: request.sender.clone(),
            recipient: request.recipient.clone(),
            recipient_hash,
            commitment: None,
            nullifier: None,
            proof: None,
            status: TransferStatus::Pending,
            created_at: now,
            updated_at: now,
            error: None,
            deadline: request.deadline,
            source_tx_ref: None,
            dest_tx_ref: None,
            cancel_requested: false,
            step_log: Vec::new(),
        };
        transfer.push_step("pending", "Transfer created", None, false);
        transfer
    }

    /// Hex id for display.
    pub fn id_hex(&self) -> String {
        transfer_id_hex(&self.id)
    }

    /// Append a step to the audit log.
    pub fn push_step(
        &mut self,
        step: impl Into<String>,
        message: impl Into<String>,
        tx_ref: Option<String>,
        is_error: bool,
    ) {
        self.step_log.push(TransferStep {
            step: step.into(),
            message: message.into(),
            timestamp: unix_now(),
            tx_ref,
            is_error,
        });
    }
}
