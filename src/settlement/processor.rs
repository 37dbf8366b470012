//! Decision orchestration: validation, payout, ledger, item reconciliation.
//!
//! # Ordering contract
//! ```text
//! validate → load item (pending_valuation only)
//!     crypto: rate → ledger open (processing, durable) → broadcast
//!             → ledger finalize → item status (conditional update)
//!     fiat:   ledger open (pending) → attach reference → item status
//! ```
//!
//! The item row is only ever touched after the ledger entry is terminal
//! (crypto) or opened with its reference (fiat), and the
//! `pending_valuation → other` transition is a compare-and-swap so exactly
//! one decision can win across processes.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::blockchain::{PayoutError, PayoutExecutor, PayoutReceipt};
use crate::config::schema::PayoutConfig;
use crate::ledger::{LedgerError, Outcome, TransactionLedger};
use crate::model::{Item, ItemStatus, PayoutMethod, Transaction};
use crate::observability::metrics;
use crate::oracle::{self, RateOracle, RateQuote};
use crate::resilience::calculate_backoff;
use crate::settlement::types::{DecisionOutcome, DecisionRequest, SettlementError};
use crate::store::{ItemSettlement, SettlementStore, StoreError};
use crate::wallet::{is_valid_address, WalletValidator};

/// Orchestrator turning a disposition decision into a settled payout.
pub struct DecisionProcessor {
    store: Arc<dyn SettlementStore>,
    ledger: TransactionLedger,
    oracle: Arc<RateOracle>,
    executor: Arc<dyn PayoutExecutor>,
    wallets: WalletValidator,
    config: PayoutConfig,
}

impl DecisionProcessor {
    pub fn new(
        store: Arc<dyn SettlementStore>,
        oracle: Arc<RateOracle>,
        executor: Arc<dyn PayoutExecutor>,
        config: PayoutConfig,
    ) -> Self {
        let ledger = TransactionLedger::new(store.clone(), config.currency_code.clone());
        let wallets = WalletValidator::new(store.clone());
        Self {
            store,
            ledger,
            oracle,
            executor,
            wallets,
            config,
        }
    }

    /// Process an official's disposition decision for an item.
    ///
    /// Exactly one ledger entry is created per successful guard pass, and it
    /// reaches exactly one terminal state before the item row is updated.
    pub async fn process_decision(
        &self,
        request: DecisionRequest,
    ) -> Result<DecisionOutcome, SettlementError> {
        self.validate(&request)?;

        let item = self
            .store
            .get_item(request.item_id)
            .await?
            .ok_or_else(|| SettlementError::NotFound(format!("item {}", request.item_id)))?;

        if item.status != ItemStatus::PendingValuation {
            return Err(SettlementError::State(format!(
                "item {} cannot be processed, current status: {:?}",
                item.id, item.status
            )));
        }

        tracing::info!(
            item_id = %item.id,
            actor_id = %request.actor_id,
            decision = ?request.decision,
            valuation = %request.final_valuation,
            method = ?item.payout_method,
            "Processing disposition decision"
        );

        match item.payout_method {
            PayoutMethod::Crypto => self.settle_crypto(request, item).await,
            PayoutMethod::Fiat => self.settle_fiat(request, item).await,
        }
    }

    fn validate(&self, request: &DecisionRequest) -> Result<(), SettlementError> {
        if request.actor_id.trim().is_empty() {
            return Err(SettlementError::Validation(
                "actor id must not be empty".to_string(),
            ));
        }
        if request.final_valuation <= Decimal::ZERO {
            return Err(SettlementError::Validation(
                "final valuation must be greater than 0".to_string(),
            ));
        }
        if request.final_valuation < self.config.min_amount
            || request.final_valuation > self.config.max_amount
        {
            return Err(SettlementError::Validation(format!(
                "final valuation must be between {} and {}",
                self.config.min_amount, self.config.max_amount
            )));
        }
        Ok(())
    }

    async fn settle_fiat(
        &self,
        request: DecisionRequest,
        item: Item,
    ) -> Result<DecisionOutcome, SettlementError> {
        let tx = self
            .ledger
            .open_fiat(&item, request.final_valuation, &request.actor_id)
            .await?;

        let reference = self.ledger.fiat_reference(item.id);
        let tx = self.ledger.attach_fiat_reference(tx.id, &reference).await?;

        // Fiat settles out-of-band; the item goes straight to the
        // disposition-mapped status.
        let status = request.decision.mapped_status();
        let updated = self.settle_item(&request, &item, status, tx.id).await?;

        metrics::record_decision("fiat", "pending");
        Ok(DecisionOutcome {
            item_id: item.id,
            transaction_id: tx.id,
            payout_method: PayoutMethod::Fiat,
            amount_local: request.final_valuation,
            amount_crypto: None,
            rate_used: None,
            tx_hash: None,
            fiat_reference: tx.fiat_reference,
            resulting_status: updated.status,
            message: "Decision processed; awaiting bank transfer confirmation".to_string(),
        })
    }

    async fn settle_crypto(
        &self,
        request: DecisionRequest,
        item: Item,
    ) -> Result<DecisionOutcome, SettlementError> {
        // Items may carry the payout address from submission; otherwise it
        // comes from the seller's registered wallet profile.
        let destination = match item.seller_wallet.clone() {
            Some(address) => address,
            None => self.wallets.wallet_for_payout(&item.seller_id).await?,
        };
        // Defensive re-check: the stored address may have been corrupted
        // since registration.
        if !is_valid_address(&destination) {
            return Err(SettlementError::Validation(format!(
                "seller wallet address {} is not a valid address",
                destination
            )));
        }

        let RateQuote { rate, origin, .. } = self.oracle.get_rate().await;
        let amount_crypto = oracle::to_crypto(request.final_valuation, rate);
        if amount_crypto <= Decimal::ZERO {
            return Err(SettlementError::Validation(format!(
                "valuation {} rounds to a zero crypto payout at rate {}",
                request.final_valuation, rate
            )));
        }

        tracing::info!(
            item_id = %item.id,
            rate = %rate,
            rate_origin = origin.as_str(),
            amount_crypto = %amount_crypto,
            "Computed crypto payout amount"
        );

        // Durable `processing` entry before any broadcast: a crash between
        // broadcast and finalize leaves a reconcilable record.
        let tx = self
            .ledger
            .open_crypto(
                &item,
                request.final_valuation,
                amount_crypto,
                rate,
                &destination,
                &request.actor_id,
            )
            .await?;

        match self.executor.send_payout(&destination, amount_crypto).await {
            Ok(receipt) => {
                self.complete_crypto(request, item, tx, rate, amount_crypto, receipt)
                    .await
            }
            Err(e) => {
                self.fail_crypto(request, item, tx, e).await
            }
        }
    }

    async fn complete_crypto(
        &self,
        request: DecisionRequest,
        item: Item,
        tx: Transaction,
        rate: Decimal,
        amount_crypto: Decimal,
        receipt: PayoutReceipt,
    ) -> Result<DecisionOutcome, SettlementError> {
        let outcome = Outcome::Complete {
            tx_hash: receipt.tx_hash.clone(),
            gas_used: receipt.gas_used,
            gas_price_gwei: receipt.gas_price_gwei,
        };
        // The broadcast succeeded: this write must not be lost.
        self.finalize_with_retry(tx.id, outcome, Some(&receipt.tx_hash))
            .await?;

        let updated = self
            .settle_item(&request, &item, ItemStatus::PayoutComplete, tx.id)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    item_id = %item.id,
                    tx_id = %tx.id,
                    tx_hash = %receipt.tx_hash,
                    error = %e,
                    "Payout confirmed and ledger finalized, but item update failed"
                );
            })?;

        metrics::record_decision("crypto", "complete");
        Ok(DecisionOutcome {
            item_id: item.id,
            transaction_id: tx.id,
            payout_method: PayoutMethod::Crypto,
            amount_local: request.final_valuation,
            amount_crypto: Some(amount_crypto),
            rate_used: Some(rate),
            tx_hash: Some(receipt.tx_hash),
            fiat_reference: None,
            resulting_status: updated.status,
            message: "Payout complete".to_string(),
        })
    }

    async fn fail_crypto(
        &self,
        request: DecisionRequest,
        item: Item,
        tx: Transaction,
        error: PayoutError,
    ) -> Result<DecisionOutcome, SettlementError> {
        let hash = error.tx_hash().map(|h| h.to_string());
        let outcome = if error.is_ambiguous() {
            metrics::record_decision("crypto", "unknown");
            Outcome::Unknown {
                tx_hash: hash.clone(),
                reason: format!("funds may have moved, reconcile before retrying: {}", error),
            }
        } else {
            metrics::record_decision("crypto", "failed");
            Outcome::Failed {
                reason: format!("no funds moved: {}", error),
            }
        };

        // Record the failure before touching the item; the attempt stays
        // auditable even if the item update below fails.
        if let Err(ledger_err) = self
            .finalize_with_retry(tx.id, outcome, hash.as_deref())
            .await
        {
            tracing::error!(
                tx_id = %tx.id,
                error = %ledger_err,
                "Failed to record payout failure in ledger"
            );
        }

        if let Err(item_err) = self
            .settle_item(&request, &item, ItemStatus::PayoutFailed, tx.id)
            .await
        {
            tracing::error!(
                item_id = %item.id,
                tx_id = %tx.id,
                error = %item_err,
                "Failed to mark item payout_failed"
            );
        }

        // The failure is recorded; report it to the caller rather than
        // panicking past this boundary.
        Err(SettlementError::Payout(error))
    }

    /// Conditional item update: wins only while the row is still
    /// `pending_valuation`.
    async fn settle_item(
        &self,
        request: &DecisionRequest,
        item: &Item,
        status: ItemStatus,
        tx_id: Uuid,
    ) -> Result<Item, SettlementError> {
        let settlement = ItemSettlement {
            status,
            final_payout: request.final_valuation,
            costs: request.costs,
            current_branch: request.decision.branch_label().to_string(),
            transaction_id: tx_id,
            processed_by: request.actor_id.clone(),
            processed_at: Utc::now(),
        };

        self.store
            .settle_item(item.id, ItemStatus::PendingValuation, settlement)
            .await
            .map_err(|e| match e {
                StoreError::Conflict { actual, .. } => SettlementError::State(format!(
                    "item {} was settled concurrently (status now {})",
                    item.id, actual
                )),
                other => SettlementError::Persistence(other),
            })
    }

    /// Finalize with bounded exponential backoff on store failures.
    ///
    /// After a successful broadcast the hash must never be lost: on
    /// exhaustion it is emitted at error level together with the ledger id
    /// so the record can be reconciled by hand.
    async fn finalize_with_retry(
        &self,
        tx_id: Uuid,
        outcome: Outcome,
        tx_hash: Option<&str>,
    ) -> Result<Transaction, SettlementError> {
        let mut attempt: u32 = 0;
        loop {
            match self.ledger.finalize(tx_id, outcome.clone()).await {
                Ok(tx) => return Ok(tx),
                Err(LedgerError::Store(e)) if attempt < self.config.finalize_retry_attempts => {
                    attempt += 1;
                    let delay = calculate_backoff(
                        attempt,
                        self.config.finalize_retry_base_ms,
                        self.config.finalize_retry_max_ms,
                    );
                    tracing::warn!(
                        tx_id = %tx_id,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Ledger finalize failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if let Some(hash) = tx_hash {
                        tracing::error!(
                            tx_id = %tx_id,
                            tx_hash = %hash,
                            error = %e,
                            "Ledger finalize exhausted retries after broadcast; reconcile manually"
                        );
                    }
                    return Err(e.into());
                }
            }
        }
    }
}
