//! Durable record of every settlement attempt.
//!
//! The ledger is the single source of truth for "did money move". Write
//! ordering contract: a crypto entry is durably `processing` before the
//! broadcast is attempted, and finalized immediately after the broadcast
//! resolves. Finalize is one-way; terminal records are immutable audit
//! entries and a retry is always a new record.

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use std::sync::Arc;
use uuid::Uuid;

use crate::model::{Item, PayoutMethod, Transaction, TransactionStatus};
use crate::store::{SettlementStore, StoreError, TransactionUpdate};

/// Errors from ledger transitions.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The item already has a settlement attempt in a non-terminal state.
    #[error("item {item_id} already has an open settlement attempt {tx_id}")]
    OpenEntryExists { item_id: Uuid, tx_id: Uuid },

    /// Finalize called on an already-terminal record.
    #[error("transaction {tx_id} is already terminal ({status:?})")]
    AlreadyFinal {
        tx_id: Uuid,
        status: TransactionStatus,
    },

    #[error("transaction {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Terminal outcome applied to a ledger entry.
#[derive(Debug, Clone)]
pub enum Outcome {
    Complete {
        tx_hash: String,
        gas_used: u64,
        gas_price_gwei: Decimal,
    },
    Failed {
        reason: String,
    },
    /// Ambiguous result: the transfer may or may not have been mined.
    Unknown {
        tx_hash: Option<String>,
        reason: String,
    },
}

/// Append/transition interface over the persistence port.
pub struct TransactionLedger {
    store: Arc<dyn SettlementStore>,
    /// Currency code used in fiat transfer references.
    currency_code: String,
}

impl TransactionLedger {
    pub fn new(store: Arc<dyn SettlementStore>, currency_code: impl Into<String>) -> Self {
        Self {
            store,
            currency_code: currency_code.into(),
        }
    }

    /// Open a crypto settlement entry in `processing`, durably written
    /// before any broadcast.
    pub async fn open_crypto(
        &self,
        item: &Item,
        amount_local: Decimal,
        amount_crypto: Decimal,
        rate: Decimal,
        to_address: &str,
        actor_id: &str,
    ) -> Result<Transaction, LedgerError> {
        self.guard_single_open(item.id).await?;

        let tx = Transaction {
            id: Uuid::new_v4(),
            item_id: item.id,
            amount_local,
            amount_crypto: Some(amount_crypto),
            conversion_rate: Some(rate),
            payment_method: PayoutMethod::Crypto,
            to_address: Some(to_address.to_string()),
            status: TransactionStatus::Processing,
            tx_hash: None,
            gas_used: None,
            gas_price_gwei: None,
            fiat_reference: None,
            failure_reason: None,
            processed_by: actor_id.to_string(),
            created_at: Utc::now(),
            completed_at: None,
        };
        self.store.insert_transaction(tx.clone()).await?;

        tracing::info!(
            tx_id = %tx.id,
            item_id = %item.id,
            amount_local = %amount_local,
            amount_crypto = %amount_crypto,
            "Opened crypto settlement entry"
        );
        Ok(tx)
    }

    /// Open a fiat settlement entry in `pending`; the bank transfer itself
    /// completes out-of-band.
    pub async fn open_fiat(
        &self,
        item: &Item,
        amount_local: Decimal,
        actor_id: &str,
    ) -> Result<Transaction, LedgerError> {
        self.guard_single_open(item.id).await?;

        let tx = Transaction {
            id: Uuid::new_v4(),
            item_id: item.id,
            amount_local,
            amount_crypto: None,
            conversion_rate: None,
            payment_method: PayoutMethod::Fiat,
            to_address: None,
            status: TransactionStatus::Pending,
            tx_hash: None,
            gas_used: None,
            gas_price_gwei: None,
            fiat_reference: None,
            failure_reason: None,
            processed_by: actor_id.to_string(),
            created_at: Utc::now(),
            completed_at: None,
        };
        self.store.insert_transaction(tx.clone()).await?;

        tracing::info!(
            tx_id = %tx.id,
            item_id = %item.id,
            amount_local = %amount_local,
            "Opened fiat settlement entry"
        );
        Ok(tx)
    }

    /// Attach the human-readable bank transfer reference to a fiat entry.
    pub async fn attach_fiat_reference(
        &self,
        tx_id: Uuid,
        reference: &str,
    ) -> Result<Transaction, LedgerError> {
        let current = self.load(tx_id).await?;
        if current.is_terminal() {
            return Err(LedgerError::AlreadyFinal {
                tx_id,
                status: current.status,
            });
        }

        let updated = self
            .store
            .update_transaction(
                tx_id,
                TransactionUpdate {
                    fiat_reference: Some(reference.to_string()),
                    ..Default::default()
                },
            )
            .await?;
        Ok(updated)
    }

    /// One-way transition to a terminal state. A second finalize on an
    /// already-terminal record is rejected.
    pub async fn finalize(&self, tx_id: Uuid, outcome: Outcome) -> Result<Transaction, LedgerError> {
        let current = self.load(tx_id).await?;
        if current.is_terminal() {
            return Err(LedgerError::AlreadyFinal {
                tx_id,
                status: current.status,
            });
        }

        let update = match outcome {
            Outcome::Complete {
                tx_hash,
                gas_used,
                gas_price_gwei,
            } => TransactionUpdate {
                status: Some(TransactionStatus::Complete),
                tx_hash: Some(tx_hash),
                gas_used: Some(gas_used),
                gas_price_gwei: Some(gas_price_gwei),
                completed_at: Some(Utc::now()),
                ..Default::default()
            },
            Outcome::Failed { reason } => TransactionUpdate {
                status: Some(TransactionStatus::Failed),
                failure_reason: Some(reason),
                completed_at: Some(Utc::now()),
                ..Default::default()
            },
            Outcome::Unknown { tx_hash, reason } => TransactionUpdate {
                status: Some(TransactionStatus::Unknown),
                tx_hash,
                failure_reason: Some(reason),
                completed_at: Some(Utc::now()),
                ..Default::default()
            },
        };

        let finalized = self.store.update_transaction(tx_id, update).await?;
        tracing::info!(
            tx_id = %tx_id,
            status = ?finalized.status,
            "Ledger entry finalized"
        );
        Ok(finalized)
    }

    /// Deterministic bank transfer reference:
    /// `<CUR>_<unix millis>_<first 8 chars of item id>`.
    pub fn fiat_reference(&self, item_id: Uuid) -> String {
        let timestamp = Utc::now().timestamp_millis();
        let item_short: String = item_id.simple().to_string().chars().take(8).collect();
        format!("{}_{}_{}", self.currency_code, timestamp, item_short)
    }

    async fn load(&self, tx_id: Uuid) -> Result<Transaction, LedgerError> {
        self.store
            .get_transaction(tx_id)
            .await?
            .ok_or(LedgerError::NotFound(tx_id))
    }

    /// Invariant: at most one non-terminal entry per item.
    async fn guard_single_open(&self, item_id: Uuid) -> Result<(), LedgerError> {
        if let Some(open) = self.store.open_transaction_for_item(item_id).await? {
            return Err(LedgerError::OpenEntryExists {
                item_id,
                tx_id: open.id,
            });
        }
        Ok(())
    }
}
