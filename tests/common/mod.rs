//! Shared fakes and fixtures for the settlement integration tests.

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use settlement_core::blockchain::{PayoutError, PayoutExecutor, PayoutReceipt, PayoutResult};
use settlement_core::config::PayoutConfig;
use settlement_core::model::{Item, ItemStatus, PayoutMethod, Transaction, WalletProfile};
use settlement_core::oracle::{FeedError, PriceFeed, RateOracle};
use settlement_core::settlement::DecisionProcessor;
use settlement_core::store::{
    ItemSettlement, MemoryStore, SettlementStore, StoreError, TransactionUpdate,
};

pub const TEST_RATE: Decimal = dec!(250000);

/// Deterministic price feed serving a fixed rate.
pub struct FixedFeed {
    rate: Decimal,
}

impl FixedFeed {
    pub fn new(rate: Decimal) -> Self {
        Self { rate }
    }
}

#[async_trait]
impl PriceFeed for FixedFeed {
    async fn fetch_rate(&self) -> Result<Decimal, FeedError> {
        Ok(self.rate)
    }

    fn source(&self) -> &str {
        "fixed"
    }
}

/// How the scripted executor should resolve each broadcast.
#[derive(Debug, Clone, Copy)]
pub enum PayoutBehavior {
    /// Confirm with a fixed receipt.
    Confirm,
    /// Fail before any broadcast.
    InsufficientBalance,
    /// Time out with no hash (outcome unknown).
    AmbiguousTimeout,
    /// Broadcast succeeds but confirmation never arrives (hash known).
    ConfirmationTimeout,
}

/// Payout executor scripted per scenario; records what it was asked to send.
pub struct ScriptedExecutor {
    behavior: PayoutBehavior,
    pub calls: AtomicU32,
    pub last_request: Mutex<Option<(String, Decimal)>>,
}

impl ScriptedExecutor {
    pub fn new(behavior: PayoutBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }
}

#[async_trait]
impl PayoutExecutor for ScriptedExecutor {
    async fn send_payout(
        &self,
        to_address: &str,
        amount_crypto: Decimal,
    ) -> PayoutResult<PayoutReceipt> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some((to_address.to_string(), amount_crypto));

        match self.behavior {
            PayoutBehavior::Confirm => Ok(PayoutReceipt {
                tx_hash: "0xc0ffee".to_string(),
                gas_used: 21_000,
                gas_price_gwei: dec!(12.5),
            }),
            PayoutBehavior::InsufficientBalance => Err(PayoutError::InsufficientBalance {
                required: amount_crypto,
                available: dec!(0.001),
            }),
            PayoutBehavior::AmbiguousTimeout => {
                Err(PayoutError::AmbiguousTimeout { after_secs: 10 })
            }
            PayoutBehavior::ConfirmationTimeout => Err(PayoutError::ConfirmationTimeout {
                tx_hash: "0xbroadcast".to_string(),
            }),
        }
    }
}

/// Store wrapper that fails the first N ledger updates, then recovers.
///
/// Models a transiently unavailable backend between broadcast and
/// finalize; everything else passes straight through.
pub struct FlakyStore {
    inner: MemoryStore,
    update_failures: AtomicU32,
    pub update_calls: AtomicU32,
}

impl FlakyStore {
    pub fn new(update_failures: u32) -> Self {
        Self {
            inner: MemoryStore::new(),
            update_failures: AtomicU32::new(update_failures),
            update_calls: AtomicU32::new(0),
        }
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

#[async_trait]
impl SettlementStore for FlakyStore {
    async fn insert_item(&self, item: Item) -> Result<(), StoreError> {
        self.inner.insert_item(item).await
    }

    async fn get_item(&self, id: Uuid) -> Result<Option<Item>, StoreError> {
        self.inner.get_item(id).await
    }

    async fn settle_item(
        &self,
        id: Uuid,
        expected: ItemStatus,
        settlement: ItemSettlement,
    ) -> Result<Item, StoreError> {
        self.inner.settle_item(id, expected, settlement).await
    }

    async fn insert_transaction(&self, tx: Transaction) -> Result<(), StoreError> {
        self.inner.insert_transaction(tx).await
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>, StoreError> {
        self.inner.get_transaction(id).await
    }

    async fn update_transaction(
        &self,
        id: Uuid,
        update: TransactionUpdate,
    ) -> Result<Transaction, StoreError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.update_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.update_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Backend("connection reset".to_string()));
        }
        self.inner.update_transaction(id, update).await
    }

    async fn open_transaction_for_item(
        &self,
        item_id: Uuid,
    ) -> Result<Option<Transaction>, StoreError> {
        self.inner.open_transaction_for_item(item_id).await
    }

    async fn get_profile(&self, account_id: &str) -> Result<Option<WalletProfile>, StoreError> {
        self.inner.get_profile(account_id).await
    }

    async fn upsert_profile(&self, profile: WalletProfile) -> Result<(), StoreError> {
        self.inner.upsert_profile(profile).await
    }

    async fn bind_wallet_address(
        &self,
        account_id: &str,
        address: &str,
    ) -> Result<WalletProfile, StoreError> {
        self.inner.bind_wallet_address(account_id, address).await
    }
}

/// Fully wired processor over in-memory collaborators.
pub struct Harness {
    pub processor: DecisionProcessor,
    pub store: Arc<MemoryStore>,
    pub executor: Arc<ScriptedExecutor>,
}

pub fn harness(behavior: PayoutBehavior) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let executor = Arc::new(ScriptedExecutor::new(behavior));
    let processor = processor_over(store.clone(), executor.clone(), PayoutConfig::default());
    Harness {
        processor,
        store,
        executor,
    }
}

/// Wire a processor over an arbitrary store, for fault-injection scenarios.
pub fn processor_over(
    store: Arc<dyn SettlementStore>,
    executor: Arc<ScriptedExecutor>,
    config: PayoutConfig,
) -> DecisionProcessor {
    let oracle = Arc::new(RateOracle::new(
        Arc::new(FixedFeed::new(TEST_RATE)),
        Duration::from_secs(300),
        TEST_RATE,
    ));
    DecisionProcessor::new(store, oracle, executor, config)
}

pub fn wallet_address() -> String {
    format!("0x{}", "a".repeat(40))
}

/// Insert a pending crypto-payout item and return it.
pub async fn seed_crypto_item(store: &dyn SettlementStore) -> Item {
    let item = Item::new_submission(
        "smartphone",
        "fair",
        "seller-1",
        PayoutMethod::Crypto,
        Some(wallet_address()),
    );
    store.insert_item(item.clone()).await.unwrap();
    item
}

/// Insert a pending fiat-payout item and return it.
pub async fn seed_fiat_item(store: &dyn SettlementStore) -> Item {
    let item = Item::new_submission("laptop", "good", "seller-2", PayoutMethod::Fiat, None);
    store.insert_item(item.clone()).await.unwrap();
    item
}
