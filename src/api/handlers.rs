//! HTTP handlers for the settlement API.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::server::AppState;
use crate::settlement::{DecisionOutcome, DecisionRequest, SettlementError};
use crate::wallet::WalletError;

/// Caller-facing envelope for a processed decision.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_local: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_crypto: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversion_rate: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiat_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resulting_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DecisionResponse {
    fn ok(outcome: DecisionOutcome) -> Self {
        Self {
            success: true,
            transaction_id: Some(outcome.transaction_id),
            payout_method: Some(outcome.payout_method.as_str().to_string()),
            amount_local: Some(outcome.amount_local),
            amount_crypto: outcome.amount_crypto,
            conversion_rate: outcome.rate_used,
            transaction_hash: outcome.tx_hash,
            fiat_reference: outcome.fiat_reference,
            resulting_status: Some(outcome.resulting_status.to_string()),
            message: Some(outcome.message),
            error: None,
        }
    }

    fn err(error: &SettlementError) -> Self {
        let message = if error.funds_may_have_moved() {
            Some("payout outcome unknown, contact support before retrying".to_string())
        } else {
            None
        };
        Self {
            success: false,
            transaction_id: None,
            payout_method: None,
            amount_local: None,
            amount_crypto: None,
            conversion_rate: None,
            transaction_hash: None,
            fiat_reference: None,
            resulting_status: None,
            message,
            error: Some(error.to_string()),
        }
    }
}

fn settlement_status(error: &SettlementError) -> StatusCode {
    match error {
        SettlementError::Validation(_) => StatusCode::BAD_REQUEST,
        SettlementError::NotFound(_) => StatusCode::NOT_FOUND,
        SettlementError::State(_) => StatusCode::CONFLICT,
        SettlementError::Payout(_) => StatusCode::BAD_GATEWAY,
        SettlementError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `POST /api/decisions`
pub async fn process_decision(
    State(state): State<AppState>,
    Json(request): Json<DecisionRequest>,
) -> Response {
    let item_id = request.item_id;
    match state.processor.process_decision(request).await {
        Ok(outcome) => (StatusCode::OK, Json(DecisionResponse::ok(outcome))).into_response(),
        Err(e) => {
            tracing::warn!(item_id = %item_id, error = %e, "Decision rejected");
            (settlement_status(&e), Json(DecisionResponse::err(&e))).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterWalletRequest {
    pub account_id: String,
    pub wallet_address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn wallet_status(error: &WalletError) -> StatusCode {
    match error {
        WalletError::InvalidFormat => StatusCode::BAD_REQUEST,
        WalletError::AlreadyRegistered => StatusCode::CONFLICT,
        WalletError::NotRegistered(_) => StatusCode::NOT_FOUND,
        WalletError::NotVerified(_) => StatusCode::CONFLICT,
        WalletError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `POST /api/wallets`
pub async fn register_wallet(
    State(state): State<AppState>,
    Json(request): Json<RegisterWalletRequest>,
) -> Response {
    match state
        .wallets
        .register_wallet(&request.account_id, &request.wallet_address)
        .await
    {
        Ok(profile) => (
            StatusCode::OK,
            Json(WalletResponse {
                success: true,
                account_id: Some(profile.account_id),
                wallet_address: profile.wallet_address,
                verified: Some(profile.verified),
                error: None,
            }),
        )
            .into_response(),
        Err(e) => (
            wallet_status(&e),
            Json(WalletResponse {
                success: false,
                account_id: None,
                wallet_address: None,
                verified: None,
                error: Some(e.to_string()),
            }),
        )
            .into_response(),
    }
}

/// `DELETE /api/wallets/{account_id}`
pub async fn remove_wallet(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Response {
    match state.wallets.remove_wallet(&account_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => (
            wallet_status(&e),
            Json(WalletResponse {
                success: false,
                account_id: None,
                wallet_address: None,
                verified: None,
                error: Some(e.to_string()),
            }),
        )
            .into_response(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateResponse {
    pub rate: Decimal,
    pub origin: &'static str,
    pub source: String,
}

/// `GET /api/rate`
pub async fn current_rate(State(state): State<AppState>) -> Json<RateResponse> {
    let quote = state.oracle.get_rate().await;
    Json(RateResponse {
        rate: quote.rate,
        origin: quote.origin.as_str(),
        source: quote.source,
    })
}

/// `GET /health`
///
/// Checks RPC connectivity when blockchain integration is enabled; 503
/// when the chain is unreachable so load balancers can route around it.
pub async fn health(State(state): State<AppState>) -> Response {
    match &state.chain {
        Some(client) => {
            let chain_healthy = client.is_healthy().await;
            let status = if chain_healthy {
                StatusCode::OK
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            };
            (
                status,
                Json(serde_json::json!({
                    "status": if chain_healthy { "ok" } else { "degraded" },
                    "chainHealthy": chain_healthy,
                })),
            )
                .into_response()
        }
        None => Json(serde_json::json!({ "status": "ok" })).into_response(),
    }
}
