//! In-memory store backed by concurrent maps.
//!
//! Used by the binary and the test suite; a database-backed store is a
//! drop-in replacement behind the same trait.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::model::{Item, ItemStatus, Transaction, WalletProfile};
use crate::store::{ItemSettlement, SettlementStore, StoreError, TransactionUpdate};

/// Thread-safe in-memory record sets.
#[derive(Clone, Default)]
pub struct MemoryStore {
    items: Arc<DashMap<Uuid, Item>>,
    transactions: Arc<DashMap<Uuid, Transaction>>,
    profiles: Arc<DashMap<String, WalletProfile>>,
    /// Lowercased address -> holding account, for the uniqueness claim.
    wallet_index: Arc<DashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ledger records (test/diagnostic helper).
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }
}

#[async_trait]
impl SettlementStore for MemoryStore {
    async fn insert_item(&self, item: Item) -> Result<(), StoreError> {
        self.items.insert(item.id, item);
        Ok(())
    }

    async fn get_item(&self, id: Uuid) -> Result<Option<Item>, StoreError> {
        Ok(self.items.get(&id).map(|r| r.value().clone()))
    }

    async fn settle_item(
        &self,
        id: Uuid,
        expected: ItemStatus,
        settlement: ItemSettlement,
    ) -> Result<Item, StoreError> {
        // get_mut holds the shard lock, making check-then-write atomic.
        let mut entry = self.items.get_mut(&id).ok_or(StoreError::Missing {
            record: "item",
            id: id.to_string(),
        })?;

        let item = entry.value_mut();
        if item.status != expected {
            return Err(StoreError::Conflict {
                record: "item",
                expected: format!("{:?}", expected),
                actual: format!("{:?}", item.status),
            });
        }

        item.status = settlement.status;
        item.final_payout = Some(settlement.final_payout);
        item.costs = settlement.costs;
        item.current_branch = Some(settlement.current_branch);
        item.transaction_id = Some(settlement.transaction_id);
        item.processed_by = Some(settlement.processed_by);
        item.processed_at = Some(settlement.processed_at);
        item.updated_at = Utc::now();

        Ok(item.clone())
    }

    async fn insert_transaction(&self, tx: Transaction) -> Result<(), StoreError> {
        self.transactions.insert(tx.id, tx);
        Ok(())
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>, StoreError> {
        Ok(self.transactions.get(&id).map(|r| r.value().clone()))
    }

    async fn update_transaction(
        &self,
        id: Uuid,
        update: TransactionUpdate,
    ) -> Result<Transaction, StoreError> {
        let mut entry = self.transactions.get_mut(&id).ok_or(StoreError::Missing {
            record: "transaction",
            id: id.to_string(),
        })?;

        let tx = entry.value_mut();
        if let Some(status) = update.status {
            tx.status = status;
        }
        if let Some(hash) = update.tx_hash {
            tx.tx_hash = Some(hash);
        }
        if let Some(gas) = update.gas_used {
            tx.gas_used = Some(gas);
        }
        if let Some(price) = update.gas_price_gwei {
            tx.gas_price_gwei = Some(price);
        }
        if let Some(reference) = update.fiat_reference {
            tx.fiat_reference = Some(reference);
        }
        if let Some(reason) = update.failure_reason {
            tx.failure_reason = Some(reason);
        }
        if let Some(at) = update.completed_at {
            tx.completed_at = Some(at);
        }

        Ok(tx.clone())
    }

    async fn open_transaction_for_item(
        &self,
        item_id: Uuid,
    ) -> Result<Option<Transaction>, StoreError> {
        Ok(self
            .transactions
            .iter()
            .filter(|r| r.value().item_id == item_id && !r.value().is_terminal())
            .map(|r| r.value().clone())
            .max_by_key(|tx| tx.created_at))
    }

    async fn get_profile(&self, account_id: &str) -> Result<Option<WalletProfile>, StoreError> {
        Ok(self.profiles.get(account_id).map(|r| r.value().clone()))
    }

    async fn upsert_profile(&self, profile: WalletProfile) -> Result<(), StoreError> {
        let previous = self
            .profiles
            .get(&profile.account_id)
            .and_then(|r| r.value().wallet_address.clone());
        if let Some(prev) = previous {
            self.wallet_index.remove(&prev.to_ascii_lowercase());
        }
        if let Some(address) = &profile.wallet_address {
            self.wallet_index
                .insert(address.to_ascii_lowercase(), profile.account_id.clone());
        }
        self.profiles.insert(profile.account_id.clone(), profile);
        Ok(())
    }

    async fn bind_wallet_address(
        &self,
        account_id: &str,
        address: &str,
    ) -> Result<WalletProfile, StoreError> {
        // The entry guard holds the shard lock, making the uniqueness claim
        // atomic across concurrent registrations.
        match self.wallet_index.entry(address.to_ascii_lowercase()) {
            Entry::Occupied(holder) if holder.get() != account_id => {
                return Err(StoreError::Conflict {
                    record: "wallet_address",
                    expected: account_id.to_string(),
                    actual: holder.get().clone(),
                });
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(slot) => {
                slot.insert(account_id.to_string());
            }
        }

        // Replacing an account's address releases its previous claim.
        let previous = self
            .profiles
            .get(account_id)
            .and_then(|r| r.value().wallet_address.clone());
        if let Some(prev) = previous {
            if !prev.eq_ignore_ascii_case(address) {
                self.wallet_index.remove(&prev.to_ascii_lowercase());
            }
        }

        let profile = WalletProfile {
            account_id: account_id.to_string(),
            wallet_address: Some(address.to_string()),
            verified: true,
        };
        self.profiles.insert(account_id.to_string(), profile.clone());
        Ok(profile)
    }
}
