//! Device submission record and its settlement-facing state machine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How the seller wants to be paid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutMethod {
    /// Out-of-band bank transfer, tracked by reference code.
    Fiat,
    /// On-chain native-currency transfer to the seller's wallet.
    Crypto,
}

/// Lifecycle state of an item submission.
///
/// `pending_valuation` is the only state the DecisionProcessor accepts as
/// input; everything after is written exactly once via a conditional update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    PendingValuation,
    ReadyToSell,
    Recycled,
    Scrapped,
    /// Reached through the marketplace purchase flow, not settlement.
    Sold,
    PayoutComplete,
    PayoutFailed,
}

impl ItemStatus {
    /// States settlement will never transition out of.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ItemStatus::PendingValuation)
    }

    /// Wire form, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::PendingValuation => "pending_valuation",
            ItemStatus::ReadyToSell => "ready_to_sell",
            ItemStatus::Recycled => "recycled",
            ItemStatus::Scrapped => "scrapped",
            ItemStatus::Sold => "sold",
            ItemStatus::PayoutComplete => "payout_complete",
            ItemStatus::PayoutFailed => "payout_failed",
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PayoutMethod {
    /// Wire form, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutMethod::Fiat => "FIAT",
            PayoutMethod::Crypto => "CRYPTO",
        }
    }
}

/// The official's disposition decision for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Refurbish,
    Recycle,
    Scrap,
    Rejected,
}

impl Decision {
    /// Item status a fiat-settled decision maps to.
    pub fn mapped_status(&self) -> ItemStatus {
        match self {
            Decision::Refurbish => ItemStatus::ReadyToSell,
            Decision::Recycle => ItemStatus::Recycled,
            Decision::Scrap => ItemStatus::Scrapped,
            Decision::Rejected => ItemStatus::PayoutFailed,
        }
    }

    /// Human-readable branch label used on the item record for reporting.
    pub fn branch_label(&self) -> &'static str {
        match self {
            Decision::Refurbish => "Refurbish & Sell",
            Decision::Recycle => "Recycle",
            Decision::Scrap => "Scrap/Not Usable",
            Decision::Rejected => "Rejected",
        }
    }
}

/// Per-branch cost fields recorded alongside the decision.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CostBreakdown {
    pub repair_cost: Decimal,
    pub selling_price: Decimal,
    pub recycle_cost: Decimal,
    pub scrap_cost: Decimal,
}

/// A device submission under disposition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub category: String,
    pub condition: String,
    pub status: ItemStatus,
    pub seller_id: String,
    pub buyer_id: Option<String>,
    pub payout_method: PayoutMethod,
    /// Present only when `payout_method` is `Crypto`.
    pub seller_wallet: Option<String>,
    /// Final payout in local currency, set once the decision is processed.
    pub final_payout: Option<Decimal>,
    pub costs: CostBreakdown,
    /// Reporting label for the disposition branch taken.
    pub current_branch: Option<String>,
    /// Most recent settlement attempt for this item.
    pub transaction_id: Option<Uuid>,
    /// Actor id of the official who processed the decision.
    pub processed_by: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// New submission in the initial state.
    pub fn new_submission(
        category: impl Into<String>,
        condition: impl Into<String>,
        seller_id: impl Into<String>,
        payout_method: PayoutMethod,
        seller_wallet: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            category: category.into(),
            condition: condition.into(),
            status: ItemStatus::PendingValuation,
            seller_id: seller_id.into(),
            buyer_id: None,
            payout_method,
            seller_wallet,
            final_payout: None,
            costs: CostBreakdown::default(),
            current_branch: None,
            transaction_id: None,
            processed_by: None,
            processed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
