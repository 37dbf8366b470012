//! Decision request/outcome types and the settlement error taxonomy.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::blockchain::PayoutError;
use crate::ledger::LedgerError;
use crate::model::{CostBreakdown, Decision, ItemStatus, PayoutMethod};
use crate::store::StoreError;
use crate::wallet::WalletError;

/// Errors surfaced by `process_decision`.
///
/// `Validation` / `NotFound` / `State` are pure rejections with no side
/// effects. A `Payout` error is always paired with a durable terminal
/// ledger entry; `Persistence` after a broadcast never loses the tx hash
/// (it is retried, then logged at error level).
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid state: {0}")]
    State(String),

    #[error("payout failed: {0}")]
    Payout(#[source] PayoutError),

    #[error("persistence error: {0}")]
    Persistence(#[source] StoreError),
}

impl From<StoreError> for SettlementError {
    fn from(e: StoreError) -> Self {
        SettlementError::Persistence(e)
    }
}

impl From<LedgerError> for SettlementError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::OpenEntryExists { item_id, tx_id } => SettlementError::State(format!(
                "item {} already has an open settlement attempt {}",
                item_id, tx_id
            )),
            LedgerError::AlreadyFinal { tx_id, status } => SettlementError::State(format!(
                "transaction {} is already terminal ({:?})",
                tx_id, status
            )),
            LedgerError::NotFound(id) => {
                SettlementError::NotFound(format!("transaction {}", id))
            }
            LedgerError::Store(e) => SettlementError::Persistence(e),
        }
    }
}

impl From<WalletError> for SettlementError {
    fn from(e: WalletError) -> Self {
        match e {
            WalletError::Store(e) => SettlementError::Persistence(e),
            other => SettlementError::Validation(other.to_string()),
        }
    }
}

impl SettlementError {
    /// True when funds may have moved despite the error. Callers must show
    /// "contact support", not "try again".
    pub fn funds_may_have_moved(&self) -> bool {
        matches!(self, SettlementError::Payout(e) if e.is_ambiguous())
    }
}

/// Input to `process_decision`.
#[derive(Debug, Clone, Deserialize)]
pub struct DecisionRequest {
    pub item_id: Uuid,
    /// Final valuation in local currency; must be strictly positive.
    pub final_valuation: Decimal,
    /// Id of the official making the decision (trusted, supplied by the
    /// caller's identity layer).
    pub actor_id: String,
    pub decision: Decision,
    #[serde(default)]
    pub costs: CostBreakdown,
}

/// Result of a processed decision.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionOutcome {
    pub item_id: Uuid,
    pub transaction_id: Uuid,
    pub payout_method: PayoutMethod,
    pub amount_local: Decimal,
    pub amount_crypto: Option<Decimal>,
    pub rate_used: Option<Decimal>,
    pub tx_hash: Option<String>,
    pub fiat_reference: Option<String>,
    pub resulting_status: ItemStatus,
    pub message: String,
}
