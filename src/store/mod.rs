//! Persistence port for the settlement core.
//!
//! # Responsibilities
//! - CRUD over the three record sets (items, transactions, wallet profiles)
//! - Conditional ("optimistic") item updates keyed on current status
//! - Report write failures distinctly so callers can react
//!
//! The core never talks to a database directly; the external store is an
//! injected collaborator behind [`SettlementStore`]. The in-memory
//! implementation backs the binary and the test suite.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::model::{
    CostBreakdown, Item, ItemStatus, Transaction, TransactionStatus, WalletProfile,
};

pub use memory::MemoryStore;

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Conditional write failed: the record was no longer in the expected
    /// state. This is the cross-process guard for both the item status
    /// transition and wallet-address uniqueness.
    #[error("conflict on {record}: expected {expected}, found {actual}")]
    Conflict {
        record: &'static str,
        expected: String,
        actual: String,
    },

    /// Record does not exist.
    #[error("{record} {id} not found")]
    Missing { record: &'static str, id: String },

    /// Underlying store failure (connection, serialization, ...).
    #[error("store error: {0}")]
    Backend(String),
}

/// Fields written onto the item when a decision is settled.
///
/// Applied as a single conditional update so the
/// `pending_valuation -> other` transition happens at most once.
#[derive(Debug, Clone)]
pub struct ItemSettlement {
    pub status: ItemStatus,
    pub final_payout: Decimal,
    pub costs: CostBreakdown,
    pub current_branch: String,
    pub transaction_id: Uuid,
    pub processed_by: String,
    pub processed_at: DateTime<Utc>,
}

/// Mutable fields of a ledger record after it is opened.
#[derive(Debug, Clone, Default)]
pub struct TransactionUpdate {
    pub status: Option<TransactionStatus>,
    pub tx_hash: Option<String>,
    pub gas_used: Option<u64>,
    pub gas_price_gwei: Option<Decimal>,
    pub fiat_reference: Option<String>,
    pub failure_reason: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Narrow persistence interface consumed by the settlement core.
#[async_trait]
pub trait SettlementStore: Send + Sync {
    // Items
    async fn insert_item(&self, item: Item) -> Result<(), StoreError>;
    async fn get_item(&self, id: Uuid) -> Result<Option<Item>, StoreError>;

    /// Apply `settlement` to the item only if its status still equals
    /// `expected`. Returns [`StoreError::Conflict`] otherwise.
    async fn settle_item(
        &self,
        id: Uuid,
        expected: ItemStatus,
        settlement: ItemSettlement,
    ) -> Result<Item, StoreError>;

    // Transactions
    async fn insert_transaction(&self, tx: Transaction) -> Result<(), StoreError>;
    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>, StoreError>;
    async fn update_transaction(
        &self,
        id: Uuid,
        update: TransactionUpdate,
    ) -> Result<Transaction, StoreError>;

    /// Most recent non-terminal settlement attempt for an item, if any.
    async fn open_transaction_for_item(
        &self,
        item_id: Uuid,
    ) -> Result<Option<Transaction>, StoreError>;

    // Wallet profiles
    async fn get_profile(&self, account_id: &str) -> Result<Option<WalletProfile>, StoreError>;
    async fn upsert_profile(&self, profile: WalletProfile) -> Result<(), StoreError>;

    /// Atomically bind `address` to `account_id` and mark it verified.
    /// Returns [`StoreError::Conflict`] when another account already holds
    /// the address (case-insensitive), making one-wallet-per-address a
    /// cross-process guarantee like the item status transition.
    async fn bind_wallet_address(
        &self,
        account_id: &str,
        address: &str,
    ) -> Result<WalletProfile, StoreError>;
}
