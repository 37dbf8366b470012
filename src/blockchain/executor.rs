//! Payout execution: build, broadcast, and confirm native transfers.
//!
//! # Responsibilities
//! - Validate preconditions (address, amount, sender balance)
//! - Build the transfer with nonce sync and gas price guard
//! - Broadcast exactly once per call (retry policy belongs to the caller)
//! - Block until confirmed and extract fee telemetry
//!
//! Ambiguous outcomes (timeouts, missing receipts) are reported as distinct
//! errors so the orchestrator can record them as `unknown` instead of
//! re-broadcasting into a double spend.

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, timeout};

use crate::blockchain::client::BlockchainClient;
use crate::blockchain::signer::PayoutSigner;
use crate::blockchain::types::{BlockchainConfig, PayoutError, PayoutReceipt, PayoutResult};
use crate::observability::metrics;
use crate::wallet::is_valid_address;

const WEI_PER_ETH: u64 = 1_000_000_000_000_000_000;
const WEI_PER_GWEI: u64 = 1_000_000_000;

/// Gas for a native transfer with no call data.
const TRANSFER_GAS_LIMIT: u64 = 21_000;

/// Port for submitting a value transfer and waiting for confirmation.
#[async_trait]
pub trait PayoutExecutor: Send + Sync {
    /// Broadcast a single transfer of `amount_crypto` (whole-unit ETH) to
    /// `to_address` and wait for confirmation.
    async fn send_payout(
        &self,
        to_address: &str,
        amount_crypto: Decimal,
    ) -> PayoutResult<PayoutReceipt>;
}

/// Executor backed by a JSON-RPC node and a local signing key.
pub struct ChainPayoutExecutor {
    client: BlockchainClient,
    /// Signing provider used only for the broadcast itself.
    sender: Arc<dyn Provider + Send + Sync>,
    signer: PayoutSigner,
    config: BlockchainConfig,
}

impl ChainPayoutExecutor {
    pub async fn new(config: BlockchainConfig, signer: PayoutSigner) -> PayoutResult<Self> {
        let client = BlockchainClient::new(config.clone()).await?;

        let url: url::Url = config.rpc_url.parse().map_err(|e| {
            PayoutError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        let sender = Arc::new(
            ProviderBuilder::new()
                .wallet(signer.wallet())
                .connect_http(url),
        ) as Arc<dyn Provider + Send + Sync>;

        Ok(Self {
            client,
            sender,
            signer,
            config,
        })
    }

    /// The platform address payouts are sent from.
    pub fn sender_address(&self) -> Address {
        self.signer.address()
    }

    pub fn client(&self) -> &BlockchainClient {
        &self.client
    }

    /// Build the transfer request with chain nonce and a guarded gas price.
    async fn build_transfer(&self, to: Address, value: U256) -> PayoutResult<TransactionRequest> {
        let nonce = self
            .client
            .get_transaction_count(self.signer.address())
            .await?;

        let gas_price = self.client.get_gas_price().await?;
        let gas_price_gwei = gas_price / WEI_PER_GWEI as u128;
        if gas_price_gwei > self.config.max_gas_price_gwei as u128 {
            return Err(PayoutError::GasPriceTooHigh {
                current_gwei: gas_price_gwei as u64,
                max_gwei: self.config.max_gas_price_gwei,
            });
        }

        // Safety margin over the node's estimate
        let adjusted_gas_price = (gas_price as f64 * self.config.gas_price_multiplier) as u128;

        Ok(TransactionRequest::default()
            .with_from(self.signer.address())
            .with_to(to)
            .with_value(value)
            .with_nonce(nonce)
            .with_gas_price(adjusted_gas_price)
            .with_chain_id(self.signer.chain_id())
            .with_gas_limit(TRANSFER_GAS_LIMIT))
    }

    /// Poll for the receipt until confirmed or the deadline passes.
    async fn wait_for_confirmation(
        &self,
        tx_hash: alloy::primitives::TxHash,
    ) -> PayoutResult<TransactionReceipt> {
        let required_confirmations = self.client.confirmation_blocks();
        let deadline = Duration::from_secs(self.config.confirm_timeout_secs);
        let poll_interval = Duration::from_secs(2);

        let result = timeout(deadline, async {
            let mut ticker = interval(poll_interval);

            // The broadcast already happened: a client error here must never
            // surface as a plain RPC failure. Keep polling until the
            // deadline; the timeout below carries the hash.
            loop {
                ticker.tick().await;

                let receipt = match self.client.get_transaction_receipt(tx_hash).await {
                    Ok(Some(r)) => r,
                    Ok(None) => {
                        tracing::debug!(tx_hash = %tx_hash, "Transaction pending");
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(
                            tx_hash = %tx_hash,
                            error = %e,
                            "Receipt poll failed, retrying until deadline"
                        );
                        continue;
                    }
                };

                if !receipt.status() {
                    return Err(PayoutError::Reverted {
                        tx_hash: format!("{:#x}", tx_hash),
                    });
                }

                let current_block = match self.client.get_block_number().await {
                    Ok(b) => b,
                    Err(e) => {
                        tracing::warn!(
                            tx_hash = %tx_hash,
                            error = %e,
                            "Block number poll failed, retrying until deadline"
                        );
                        continue;
                    }
                };
                let tx_block = receipt.block_number.unwrap_or(current_block);
                let confirmations = current_block.saturating_sub(tx_block) as u32;

                if confirmations >= required_confirmations {
                    return Ok(receipt);
                }

                tracing::debug!(
                    tx_hash = %tx_hash,
                    confirmations = confirmations,
                    required = required_confirmations,
                    "Waiting for confirmations"
                );
            }
        })
        .await;

        match result {
            Ok(receipt) => receipt,
            // The hash is known; the transfer may still land.
            Err(_) => Err(PayoutError::ConfirmationTimeout {
                tx_hash: format!("{:#x}", tx_hash),
            }),
        }
    }
}

#[async_trait]
impl PayoutExecutor for ChainPayoutExecutor {
    async fn send_payout(
        &self,
        to_address: &str,
        amount_crypto: Decimal,
    ) -> PayoutResult<PayoutReceipt> {
        // Preconditions: checked before anything touches the network.
        if !is_valid_address(to_address) {
            return Err(PayoutError::InvalidRecipient(to_address.to_string()));
        }
        let to: Address = to_address
            .parse()
            .map_err(|_| PayoutError::InvalidRecipient(to_address.to_string()))?;

        if amount_crypto <= Decimal::ZERO {
            return Err(PayoutError::InvalidAmount(amount_crypto));
        }
        let value = eth_to_wei(amount_crypto)?;

        let balance = self.client.get_balance(self.signer.address()).await?;
        if balance < value {
            return Err(PayoutError::InsufficientBalance {
                required: amount_crypto,
                available: wei_to_eth(balance),
            });
        }

        let tx = self.build_transfer(to, value).await?;

        tracing::info!(
            to = %to,
            amount_eth = %amount_crypto,
            "Broadcasting payout transfer"
        );

        // Exactly one broadcast per call. A timeout here is ambiguous: the
        // node may have accepted the transaction before we gave up.
        let broadcast_timeout = Duration::from_secs(self.config.rpc_timeout_secs);
        let pending = match timeout(broadcast_timeout, self.sender.send_transaction(tx)).await {
            Ok(Ok(pending)) => pending,
            Ok(Err(e)) => return Err(classify_send_error(e.to_string(), amount_crypto)),
            Err(_) => {
                return Err(PayoutError::AmbiguousTimeout {
                    after_secs: self.config.rpc_timeout_secs,
                })
            }
        };

        let tx_hash = *pending.tx_hash();
        tracing::info!(tx_hash = %tx_hash, "Payout broadcast accepted, awaiting confirmation");

        let receipt = self.wait_for_confirmation(tx_hash).await?;

        let gas_used = receipt.gas_used;
        let gas_price_gwei = gwei_from_wei(receipt.effective_gas_price);

        tracing::info!(
            tx_hash = %tx_hash,
            gas_used = gas_used,
            gas_price_gwei = %gas_price_gwei,
            "Payout confirmed"
        );
        metrics::record_payout("confirmed");

        Ok(PayoutReceipt {
            tx_hash: format!("{:#x}", tx_hash),
            gas_used,
            gas_price_gwei,
        })
    }
}

/// Executor used when blockchain integration is turned off.
///
/// Crypto payouts fail cleanly (no funds moved) so fiat-only deployments
/// still settle fiat items and reject crypto ones with a clear reason.
pub struct DisabledExecutor;

#[async_trait]
impl PayoutExecutor for DisabledExecutor {
    async fn send_payout(
        &self,
        _to_address: &str,
        _amount_crypto: Decimal,
    ) -> PayoutResult<PayoutReceipt> {
        metrics::record_payout("disabled");
        Err(PayoutError::Rpc(
            "blockchain integration is disabled".to_string(),
        ))
    }
}

/// Map a node/signer error message onto the failure taxonomy.
fn classify_send_error(message: String, amount: Decimal) -> PayoutError {
    let lower = message.to_lowercase();
    if lower.contains("insufficient funds") {
        return PayoutError::InsufficientBalance {
            required: amount,
            available: Decimal::ZERO,
        };
    }
    if lower.contains("rejected") || lower.contains("denied") {
        return PayoutError::SignerRejected(message);
    }
    PayoutError::Rpc(message)
}

/// Whole-unit ETH to wei. Sub-wei precision is truncated.
pub fn eth_to_wei(amount: Decimal) -> PayoutResult<U256> {
    let wei = (amount * Decimal::from(WEI_PER_ETH)).trunc();
    let raw = wei
        .to_u128()
        .ok_or(PayoutError::InvalidAmount(amount))?;
    Ok(U256::from(raw))
}

/// Wei to whole-unit ETH, for balances and error messages.
pub fn wei_to_eth(value: U256) -> Decimal {
    let raw: u128 = value.try_into().unwrap_or(u128::MAX);
    Decimal::try_from_i128_with_scale(raw.min(i128::MAX as u128) as i128, 18)
        .map(|d| d.normalize())
        .unwrap_or(Decimal::MAX)
}

/// Gas price in wei to gwei.
fn gwei_from_wei(price: u128) -> Decimal {
    Decimal::try_from_i128_with_scale(price.min(i128::MAX as u128) as i128, 9)
        .map(|d| d.normalize())
        .unwrap_or(Decimal::MAX)
}
