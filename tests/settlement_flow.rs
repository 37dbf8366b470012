//! End-to-end settlement scenarios over deterministic fakes.

use rust_decimal_macros::dec;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use uuid::Uuid;

use settlement_core::config::PayoutConfig;
use settlement_core::model::{CostBreakdown, Decision, ItemStatus, TransactionStatus};
use settlement_core::settlement::{DecisionRequest, SettlementError};
use settlement_core::store::SettlementStore;

mod common;
use common::{
    harness, processor_over, seed_crypto_item, seed_fiat_item, wallet_address, FlakyStore,
    PayoutBehavior, ScriptedExecutor,
};

fn request(item_id: Uuid, decision: Decision) -> DecisionRequest {
    DecisionRequest {
        item_id,
        final_valuation: dec!(10000),
        actor_id: "official-1".to_string(),
        decision,
        costs: CostBreakdown::default(),
    }
}

#[tokio::test]
async fn test_fiat_refurbish_settles_to_ready_to_sell() {
    let h = harness(PayoutBehavior::Confirm);
    let item = seed_fiat_item(h.store.as_ref()).await;

    let outcome = h
        .processor
        .process_decision(request(item.id, Decision::Refurbish))
        .await
        .unwrap();

    assert_eq!(outcome.resulting_status, ItemStatus::ReadyToSell);
    assert_eq!(outcome.amount_local, dec!(10000));
    assert!(outcome.amount_crypto.is_none());
    assert!(outcome.rate_used.is_none());
    assert!(outcome.tx_hash.is_none());
    let reference = outcome.fiat_reference.expect("fiat reference");
    assert!(reference.starts_with("INR_"));

    let tx = h
        .store
        .get_transaction(outcome.transaction_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tx.status, TransactionStatus::Pending);
    assert_eq!(tx.fiat_reference.as_deref(), Some(reference.as_str()));
    assert!(tx.amount_crypto.is_none());
    assert!(tx.tx_hash.is_none());

    let updated = h.store.get_item(item.id).await.unwrap().unwrap();
    assert_eq!(updated.status, ItemStatus::ReadyToSell);
    assert_eq!(updated.final_payout, Some(dec!(10000)));
    assert_eq!(updated.current_branch.as_deref(), Some("Refurbish & Sell"));
    assert_eq!(updated.processed_by.as_deref(), Some("official-1"));

    // No broadcast on the fiat path
    assert_eq!(h.executor.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_fiat_disposition_status_mapping() {
    for (decision, expected) in [
        (Decision::Recycle, ItemStatus::Recycled),
        (Decision::Scrap, ItemStatus::Scrapped),
        (Decision::Rejected, ItemStatus::PayoutFailed),
    ] {
        let h = harness(PayoutBehavior::Confirm);
        let item = seed_fiat_item(h.store.as_ref()).await;

        let outcome = h
            .processor
            .process_decision(request(item.id, decision))
            .await
            .unwrap();
        assert_eq!(outcome.resulting_status, expected);
    }
}

#[tokio::test]
async fn test_crypto_payout_success() {
    let h = harness(PayoutBehavior::Confirm);
    let item = seed_crypto_item(h.store.as_ref()).await;

    let outcome = h
        .processor
        .process_decision(request(item.id, Decision::Refurbish))
        .await
        .unwrap();

    // 10000 INR at 250000 INR/ETH
    assert_eq!(outcome.amount_crypto, Some(dec!(0.04)));
    assert_eq!(outcome.rate_used, Some(dec!(250000)));
    assert_eq!(outcome.tx_hash.as_deref(), Some("0xc0ffee"));
    assert_eq!(outcome.resulting_status, ItemStatus::PayoutComplete);

    let (to, amount) = h.executor.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(to, wallet_address());
    assert_eq!(amount, dec!(0.04));

    let tx = h
        .store
        .get_transaction(outcome.transaction_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tx.status, TransactionStatus::Complete);
    assert_eq!(tx.tx_hash.as_deref(), Some("0xc0ffee"));
    assert_eq!(tx.gas_used, Some(21_000));
    assert_eq!(tx.gas_price_gwei, Some(dec!(12.5)));
    assert!(tx.completed_at.is_some());

    let updated = h.store.get_item(item.id).await.unwrap().unwrap();
    assert_eq!(updated.status, ItemStatus::PayoutComplete);
    assert_eq!(updated.transaction_id, Some(outcome.transaction_id));
}

#[tokio::test]
async fn test_crypto_insufficient_balance_fails_cleanly() {
    let h = harness(PayoutBehavior::InsufficientBalance);
    let item = seed_crypto_item(h.store.as_ref()).await;

    let err = h
        .processor
        .process_decision(request(item.id, Decision::Refurbish))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::Payout(_)));
    assert!(!err.funds_may_have_moved());

    // The attempt is a durable failed record with the reason, no hash.
    assert_eq!(h.store.transaction_count(), 1);
    let tx = h
        .store
        .open_transaction_for_item(item.id)
        .await
        .unwrap();
    assert!(tx.is_none(), "failed entry must be terminal");

    let updated = h.store.get_item(item.id).await.unwrap().unwrap();
    assert_eq!(updated.status, ItemStatus::PayoutFailed);
}

#[tokio::test]
async fn test_ambiguous_timeout_records_unknown() {
    let h = harness(PayoutBehavior::AmbiguousTimeout);
    let item = seed_crypto_item(h.store.as_ref()).await;

    let err = h
        .processor
        .process_decision(request(item.id, Decision::Refurbish))
        .await
        .unwrap_err();
    assert!(err.funds_may_have_moved());

    let updated = h.store.get_item(item.id).await.unwrap().unwrap();
    assert_eq!(updated.status, ItemStatus::PayoutFailed);

    let tx = h
        .store
        .get_transaction(updated.transaction_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tx.status, TransactionStatus::Unknown);
    assert!(tx.tx_hash.is_none());
    assert!(tx
        .failure_reason
        .as_deref()
        .unwrap()
        .contains("reconcile"));
}

#[tokio::test]
async fn test_confirmation_timeout_keeps_hash() {
    let h = harness(PayoutBehavior::ConfirmationTimeout);
    let item = seed_crypto_item(h.store.as_ref()).await;

    let err = h
        .processor
        .process_decision(request(item.id, Decision::Refurbish))
        .await
        .unwrap_err();
    assert!(err.funds_may_have_moved());

    let updated = h.store.get_item(item.id).await.unwrap().unwrap();
    let tx = h
        .store
        .get_transaction(updated.transaction_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tx.status, TransactionStatus::Unknown);
    // The broadcast landed; its hash survives for reconciliation.
    assert_eq!(tx.tx_hash.as_deref(), Some("0xbroadcast"));
}

#[tokio::test]
async fn test_double_processing_is_rejected() {
    let h = harness(PayoutBehavior::Confirm);
    let item = seed_fiat_item(h.store.as_ref()).await;

    h.processor
        .process_decision(request(item.id, Decision::Refurbish))
        .await
        .unwrap();

    let err = h
        .processor
        .process_decision(request(item.id, Decision::Recycle))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::State(_)));

    // Exactly one ledger record for the item.
    assert_eq!(h.store.transaction_count(), 1);
    let updated = h.store.get_item(item.id).await.unwrap().unwrap();
    assert_eq!(updated.status, ItemStatus::ReadyToSell);
}

#[tokio::test]
async fn test_validation_rejections_have_no_side_effects() {
    let h = harness(PayoutBehavior::Confirm);
    let item = seed_fiat_item(h.store.as_ref()).await;

    let mut zero = request(item.id, Decision::Refurbish);
    zero.final_valuation = dec!(0);
    let mut no_actor = request(item.id, Decision::Refurbish);
    no_actor.actor_id = "  ".to_string();
    let mut too_large = request(item.id, Decision::Refurbish);
    too_large.final_valuation = dec!(99999999999);

    for bad in [zero, no_actor, too_large] {
        let err = h.processor.process_decision(bad).await.unwrap_err();
        assert!(matches!(err, SettlementError::Validation(_)));
    }

    assert_eq!(h.store.transaction_count(), 0);
    let untouched = h.store.get_item(item.id).await.unwrap().unwrap();
    assert_eq!(untouched.status, ItemStatus::PendingValuation);
    assert_eq!(h.executor.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_item_is_not_found() {
    let h = harness(PayoutBehavior::Confirm);

    let err = h
        .processor
        .process_decision(request(Uuid::new_v4(), Decision::Refurbish))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::NotFound(_)));
}

#[tokio::test]
async fn test_crypto_item_without_wallet_is_rejected() {
    let h = harness(PayoutBehavior::Confirm);
    let item = settlement_core::model::Item::new_submission(
        "smartphone",
        "fair",
        "seller-3",
        settlement_core::model::PayoutMethod::Crypto,
        None,
    );
    h.store.insert_item(item.clone()).await.unwrap();

    let err = h
        .processor
        .process_decision(request(item.id, Decision::Refurbish))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::Validation(_)));

    // Rejected before any ledger write or broadcast.
    assert_eq!(h.store.transaction_count(), 0);
    assert_eq!(h.executor.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_crypto_payout_uses_registered_wallet_when_item_has_none() {
    let h = harness(PayoutBehavior::Confirm);
    let registered = format!("0x{}", "e".repeat(40));
    h.store
        .bind_wallet_address("seller-9", &registered)
        .await
        .unwrap();

    let item = settlement_core::model::Item::new_submission(
        "tablet",
        "good",
        "seller-9",
        settlement_core::model::PayoutMethod::Crypto,
        None,
    );
    h.store.insert_item(item.clone()).await.unwrap();

    let outcome = h
        .processor
        .process_decision(request(item.id, Decision::Refurbish))
        .await
        .unwrap();
    assert_eq!(outcome.resulting_status, ItemStatus::PayoutComplete);

    // The broadcast went to the profile address, not a submission field.
    let (to, _) = h.executor.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(to, registered);
}

#[tokio::test]
async fn test_finalize_retries_through_transient_store_failure() {
    let store = Arc::new(FlakyStore::new(2));
    let executor = Arc::new(ScriptedExecutor::new(PayoutBehavior::Confirm));
    let config = PayoutConfig {
        finalize_retry_attempts: 4,
        finalize_retry_base_ms: 10,
        finalize_retry_max_ms: 40,
        ..PayoutConfig::default()
    };
    let processor = processor_over(store.clone(), executor, config);
    let item = seed_crypto_item(store.as_ref()).await;

    let outcome = processor
        .process_decision(request(item.id, Decision::Refurbish))
        .await
        .unwrap();
    assert_eq!(outcome.tx_hash.as_deref(), Some("0xc0ffee"));
    assert_eq!(outcome.resulting_status, ItemStatus::PayoutComplete);

    // Two failed writes, then the one that landed.
    assert_eq!(store.update_calls.load(Ordering::SeqCst), 3);
    let tx = store
        .get_transaction(outcome.transaction_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tx.status, TransactionStatus::Complete);
    assert_eq!(tx.tx_hash.as_deref(), Some("0xc0ffee"));
}

#[tokio::test]
async fn test_finalize_exhaustion_leaves_reconcilable_record() {
    let store = Arc::new(FlakyStore::new(u32::MAX));
    let executor = Arc::new(ScriptedExecutor::new(PayoutBehavior::Confirm));
    let config = PayoutConfig {
        finalize_retry_attempts: 2,
        finalize_retry_base_ms: 5,
        finalize_retry_max_ms: 10,
        ..PayoutConfig::default()
    };
    let processor = processor_over(store.clone(), executor.clone(), config);
    let item = seed_crypto_item(store.as_ref()).await;

    let err = processor
        .process_decision(request(item.id, Decision::Refurbish))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::Persistence(_)));

    // Initial attempt plus two retries.
    assert_eq!(store.update_calls.load(Ordering::SeqCst), 3);
    assert_eq!(executor.calls.load(Ordering::SeqCst), 1);

    // The durable processing entry survives for manual reconciliation and
    // the item transition never happened.
    let open = store
        .open_transaction_for_item(item.id)
        .await
        .unwrap()
        .expect("processing entry");
    assert_eq!(open.status, TransactionStatus::Processing);
    let untouched = store.get_item(item.id).await.unwrap().unwrap();
    assert_eq!(untouched.status, ItemStatus::PendingValuation);
}
