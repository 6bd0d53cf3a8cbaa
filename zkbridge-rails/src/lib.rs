//! zkbridge-rails
//!
//! Axum-based HTTP service exposing the zkbridge core: initiate and track
//! privacy-preserving cross-ledger transfers, query escrow and mint state,
//! and drive the cancel/refund paths. In this service both ledgers and the
//! proof oracle run in-process, which is the local/demo deployment shape;
//! a production deployment swaps the oracle for a remote proving service
//! behind the same [`zkbridge_oracle::ProofOracle`] trait.

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};

use zkbridge_common::{
    field::fr_from_hex, ChainId, Commitment, LedgerAddress, Nullifier, PROTOCOL_VERSION,
};
use zkbridge_core::{
    parse_transfer_id, BridgeCoordinator, BridgeError, BridgeTransfer, TransferRequest,
};
use zkbridge_ledger::{
    EscrowConfig, EscrowLedger, LedgerError, MintConfig, MintLedger, DEFAULT_REFUND_TIMEOUT_SECS,
};
use zkbridge_oracle::{MockOracle, OracleError};

// ═══════════════════════════════════════════════════════════════════════════════
// ENVIRONMENT VARIABLES
// ═══════════════════════════════════════════════════════════════════════════════

const REFUND_TIMEOUT_ENV: &str = "ZKBRIDGE_REFUND_TIMEOUT_SECS";
const MIN_LOCK_AMOUNT_ENV: &str = "ZKBRIDGE_MIN_LOCK_AMOUNT";
const RELAYER_FEE_BPS_ENV: &str = "ZKBRIDGE_RELAYER_FEE_BPS";

// ═══════════════════════════════════════════════════════════════════════════════
// STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Application state.
#[derive(Clone)]
pub struct AppState {
    /// The bridge coordinator.
    pub coordinator: Arc<BridgeCoordinator>,
}

impl AppState {
    /// State over an existing coordinator.
    pub fn new(coordinator: Arc<BridgeCoordinator>) -> Self {
        Self { coordinator }
    }

    /// State built from environment configuration, with in-process
    /// ledgers and the deterministic local oracle.
    pub fn from_env() -> Self {
        let refund_timeout = env::var(REFUND_TIMEOUT_ENV)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_REFUND_TIMEOUT_SECS);
        let min_lock_amount = env::var(MIN_LOCK_AMOUNT_ENV)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);
        let relayer_fee_bps = env::var(RELAYER_FEE_BPS_ENV)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        let oracle = Arc::new(MockOracle::new());
        let escrow = Arc::new(EscrowLedger::new(
            EscrowConfig::default()
                .with_refund_timeout(refund_timeout)
                .with_min_lock_amount(min_lock_amount),
        ));
        let mint = Arc::new(MintLedger::new(
            MintConfig::default().with_relayer_fee_bps(relayer_fee_bps),
            oracle.clone(),
        ));
        Self::new(Arc::new(BridgeCoordinator::new(escrow, mint, oracle)))
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::from_env()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROUTER
// ═══════════════════════════════════════════════════════════════════════════════

/// Build the router with default (env-configured) state.
pub fn app_router() -> Router {
    app_router_with_state(AppState::default())
}

/// Build the router over explicit state.
pub fn app_router_with_state(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & info
        .route("/health", get(health))
        .route("/bridge/info", get(info))
        // Transfers
        .route("/bridge/transfers", post(initiate_transfer).get(list_transfers))
        .route("/bridge/transfers/:id", get(get_transfer))
        .route("/bridge/transfers/:id/log", get(get_transfer_log))
        .route("/bridge/transfers/:id/cancel", post(cancel_transfer))
        .route("/bridge/transfers/:id/refund", post(refund_transfer))
        // Source ledger (escrow)
        .route("/bridge/escrow/total-locked", get(total_locked))
        .route("/bridge/escrow/commitments/:commitment", get(commitment_status))
        // Destination ledger (mint)
        .route("/bridge/mint/balances/:account", get(balance_of))
        .route("/bridge/mint/nullifiers/:nullifier", get(nullifier_used))
        .route("/bridge/mint/supply", get(mint_supply))
        .layer(cors)
        .with_state(state)
}

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLERS - HEALTH & INFO
// ═══════════════════════════════════════════════════════════════════════════════

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "zkbridge"
    }))
}

async fn info(State(state): State<AppState>) -> impl IntoResponse {
    let escrow = state.coordinator.escrow();
    let mint = state.coordinator.mint();
    Json(serde_json::json!({
        "service": "zkbridge",
        "protocol_version": PROTOCOL_VERSION,
        "source_chain": ChainId::Stellar.display_name(),
        "dest_chain": ChainId::Polkadot.display_name(),
        "refund_timeout_secs": escrow.config().refund_timeout_secs,
        "min_lock_amount": escrow.config().min_lock_amount,
        "relayer_fee_bps": mint.config().relayer_fee_bps,
    }))
}

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLERS - TRANSFERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Body for initiating a transfer.
#[derive(Debug, Deserialize)]
struct InitiateTransferBody {
    /// Source ledger; defaults to Stellar.
    source_chain: Option<ChainId>,
    /// Destination ledger; defaults to Polkadot.
    dest_chain: Option<ChainId>,
    /// Amount in smallest units.
    amount: u128,
    /// Sender address on the source ledger.
    sender: String,
    /// Recipient address on the destination ledger.
    recipient: String,
    /// The sender's secret binding value, hex-encoded. Consumed by proof
    /// generation and never echoed back.
    sender_secret: String,
    /// Optional deadline (Unix seconds), honored as a cancellation
    /// signal.
    deadline: Option<u64>,
}

async fn initiate_transfer(
    State(state): State<AppState>,
    Json(body): Json<InitiateTransferBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let sender_secret = fr_from_hex(&body.sender_secret)
        .map_err(|_| ApiError::bad_request("sender_secret must be a 32-byte hex string"))?;

    let mut request = TransferRequest::new(
        body.source_chain.unwrap_or(ChainId::Stellar),
        body.dest_chain.unwrap_or(ChainId::Polkadot),
        body.amount,
        LedgerAddress::new(body.sender),
        LedgerAddress::new(body.recipient),
    );
    if let Some(deadline) = body.deadline {
        request = request.with_deadline(deadline);
    }

    let transfer = state.coordinator.bridge(request, sender_secret).await?;
    Ok(Json(transfer_json(&transfer)))
}

async fn list_transfers(State(state): State<AppState>) -> impl IntoResponse {
    let transfers = state.coordinator.transfer_history().await;
    Json(serde_json::json!({
        "transfers": transfers.iter().map(transfer_json).collect::<Vec<_>>()
    }))
}

async fn get_transfer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_id(&id)?;
    let transfer = state
        .coordinator
        .get_transfer(&id)
        .await
        .ok_or_else(|| ApiError::not_found("Transfer not found"))?;
    Ok(Json(transfer_json(&transfer)))
}

async fn get_transfer_log(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_id(&id)?;
    let transfer = state
        .coordinator
        .get_transfer(&id)
        .await
        .ok_or_else(|| ApiError::not_found("Transfer not found"))?;

    Ok(Json(serde_json::json!({
        "transfer_id": transfer.id_hex(),
        "steps": transfer.step_log.iter().map(|s| serde_json::json!({
            "step": s.step,
            "message": s.message,
            "timestamp": s.timestamp,
            "tx_ref": s.tx_ref,
            "is_error": s.is_error,
        })).collect::<Vec<_>>()
    })))
}

async fn cancel_transfer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_id(&id)?;
    let transfer = state.coordinator.cancel(&id).await?;
    Ok(Json(transfer_json(&transfer)))
}

async fn refund_transfer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_id(&id)?;
    let receipt = state.coordinator.refund(&id).await?;
    Ok(Json(serde_json::json!({
        "commitment": receipt.commitment.to_hex(),
        "amount": receipt.amount,
        "sender": receipt.sender.as_str(),
        "refunded_at": receipt.refunded_at,
    })))
}

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLERS - LEDGERS
// ═══════════════════════════════════════════════════════════════════════════════

async fn total_locked(State(state): State<AppState>) -> impl IntoResponse {
    let total = state.coordinator.escrow().total_locked().await;
    Json(serde_json::json!({ "total_locked": total }))
}

async fn commitment_status(
    State(state): State<AppState>,
    Path(commitment): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let commitment = fr_from_hex(&commitment)
        .map(Commitment::from_fr)
        .map_err(|_| ApiError::bad_request("commitment must be a 32-byte hex string"))?;

    let status = state
        .coordinator
        .escrow()
        .commitment_status(&commitment)
        .await
        .ok_or_else(|| ApiError::not_found("Commitment not found"))?;
    Ok(Json(serde_json::json!({
        "commitment": commitment.to_hex(),
        "status": format!("{:?}", status),
    })))
}

async fn balance_of(
    State(state): State<AppState>,
    Path(account): Path<String>,
) -> impl IntoResponse {
    let account = LedgerAddress::new(account);
    let balance = state.coordinator.mint().balance_of(&account).await;
    Json(serde_json::json!({
        "account": account.as_str(),
        "balance": balance,
    }))
}

async fn nullifier_used(
    State(state): State<AppState>,
    Path(nullifier): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let nullifier = fr_from_hex(&nullifier)
        .map(Nullifier::from_fr)
        .map_err(|_| ApiError::bad_request("nullifier must be a 32-byte hex string"))?;

    let used = state.coordinator.mint().nullifier_used(&nullifier).await;
    Ok(Json(serde_json::json!({
        "nullifier": nullifier.to_hex(),
        "used": used,
    })))
}

async fn mint_supply(State(state): State<AppState>) -> impl IntoResponse {
    let mint = state.coordinator.mint();
    Json(serde_json::json!({
        "total_minted": mint.total_minted().await,
        "total_burned": mint.total_burned().await,
    }))
}

// ═══════════════════════════════════════════════════════════════════════════════
// VIEWS
// ═══════════════════════════════════════════════════════════════════════════════

fn transfer_json(transfer: &BridgeTransfer) -> serde_json::Value {
    serde_json::json!({
        "id": transfer.id_hex(),
        "source_chain": transfer.source_chain.display_name(),
        "dest_chain": transfer.dest_chain.display_name(),
        "amount": transfer.amount,
        "sender": transfer.sender.as_str(),
        "recipient": transfer.recipient.as_str(),
        "recipient_hash": transfer.recipient_hash.to_hex(),
        "commitment": transfer.commitment.map(|c| c.to_hex()),
        "nullifier": transfer.nullifier.map(|n| n.to_hex()),
        "status": format!("{:?}", transfer.status),
        "status_description": transfer.status.description(),
        "error": transfer.error,
        "source_tx_ref": transfer.source_tx_ref,
        "dest_tx_ref": transfer.dest_tx_ref,
        "created_at": transfer.created_at,
        "updated_at": transfer.updated_at,
        "steps": transfer.step_log.len(),
    })
}

fn parse_id(s: &str) -> Result<zkbridge_core::TransferId, ApiError> {
    parse_transfer_id(s).ok_or_else(|| ApiError::bad_request("transfer id must be 32 bytes of hex"))
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// JSON API error.
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub code: String,
}

impl ApiError {
    fn not_found(message: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.to_string(),
            code: "NOT_FOUND".to_string(),
        }
    }

    fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.to_string(),
            code: "BAD_REQUEST".to_string(),
        }
    }
}

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        let (status, code) = match &err {
            BridgeError::TransferNotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            BridgeError::InvalidRequest(_) | BridgeError::Commitment(_) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST")
            }
            BridgeError::NotCancellable(_) | BridgeError::InvalidTransition { .. } => {
                (StatusCode::CONFLICT, "CONFLICT")
            }
            BridgeError::Cancelled => (StatusCode::CONFLICT, "CANCELLED"),
            BridgeError::DeadlineExceeded => (StatusCode::CONFLICT, "DEADLINE_EXCEEDED"),
            BridgeError::ProofInvalid => (StatusCode::UNPROCESSABLE_ENTITY, "PROOF_INVALID"),
            BridgeError::Oracle(oracle_err) => match oracle_err {
                OracleError::ProverUnavailable(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "PROVER_UNAVAILABLE")
                }
                _ => (StatusCode::UNPROCESSABLE_ENTITY, "PROOF_REJECTED"),
            },
            BridgeError::Ledger(ledger_err) => match ledger_err {
                LedgerError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                LedgerError::TooEarly { .. } => (StatusCode::CONFLICT, "TOO_EARLY"),
                LedgerError::DuplicateCommitment(_)
                | LedgerError::NullifierUsed(_)
                | LedgerError::AlreadySettled(_) => (StatusCode::CONFLICT, "CONFLICT"),
                LedgerError::AmountTooLow { .. } | LedgerError::InsufficientBalance { .. } => {
                    (StatusCode::BAD_REQUEST, "BAD_REQUEST")
                }
                LedgerError::LedgerPaused | LedgerError::LedgerUnavailable(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "LEDGER_UNAVAILABLE")
                }
                _ => (StatusCode::UNPROCESSABLE_ENTITY, "LEDGER_REJECTED"),
            },
        };
        Self {
            status,
            message: err.to_string(),
            code: code.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({
            "error": self.message,
            "error_code": self.code,
        });
        (self.status, Json(body)).into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERVER ENTRY
// ═══════════════════════════════════════════════════════════════════════════════

/// Server entry point, used by the binary.
pub mod main_entry {
    use super::*;
    use tracing_subscriber::EnvFilter;

    /// Run the rail with env-derived configuration.
    pub async fn run_server() -> Result<(), Box<dyn std::error::Error>> {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
            .init();

        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3010);

        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        tracing::info!("zkbridge rail listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app_router()).await?;

        Ok(())
    }
}
