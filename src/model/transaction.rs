//! Settlement attempt record (the ledger row).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::item::PayoutMethod;

/// State of a settlement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Opened, settlement completes out-of-band (fiat path).
    Pending,
    /// Opened and durably written before the broadcast (crypto path).
    Processing,
    Complete,
    Failed,
    /// Terminal but ambiguous: the transfer may or may not have been mined.
    /// Needs reconciliation; never retried blindly.
    Unknown,
}

impl TransactionStatus {
    /// Once terminal, the record is an immutable audit entry.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Complete | TransactionStatus::Failed | TransactionStatus::Unknown
        )
    }
}

/// One settlement attempt for an item. A retry is always a new record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub item_id: Uuid,
    /// Payout amount in local currency.
    pub amount_local: Decimal,
    /// Payout amount in crypto, set only for the crypto path.
    pub amount_crypto: Option<Decimal>,
    /// Conversion rate used for the crypto amount.
    pub conversion_rate: Option<Decimal>,
    pub payment_method: PayoutMethod,
    /// Destination wallet; None on the fiat path.
    pub to_address: Option<String>,
    pub status: TransactionStatus,
    /// On-chain hash. A `failed` record carries one only when the broadcast
    /// itself succeeded and post-broadcast bookkeeping failed.
    pub tx_hash: Option<String>,
    pub gas_used: Option<u64>,
    pub gas_price_gwei: Option<Decimal>,
    /// Human-readable bank transfer reference (fiat path).
    pub fiat_reference: Option<String>,
    pub failure_reason: Option<String>,
    pub processed_by: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
