//! Blockchain RPC reads used by the payout executor.
//!
//! # Responsibilities
//! - Query chain state (block number, balance, nonce, receipts, gas price)
//! - Bound every call by a per-request timeout
//! - Iterate over failover endpoints before giving up
//! - Report RPC health for the API surface

use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionReceipt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::blockchain::types::{BlockchainConfig, ChainId, PayoutError, PayoutResult};
use crate::observability::metrics;

type SharedProvider = Arc<dyn Provider + Send + Sync>;

/// RPC read client with per-call timeout and endpoint failover.
#[derive(Clone)]
pub struct BlockchainClient {
    /// Primary endpoint first, then failovers in config order.
    providers: Vec<SharedProvider>,
    config: BlockchainConfig,
    timeout_duration: Duration,
}

impl BlockchainClient {
    /// Create a new client.
    ///
    /// Creation succeeds even when the RPC is unreachable; chain
    /// verification failure is logged, not fatal.
    pub async fn new(config: BlockchainConfig) -> PayoutResult<Self> {
        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            PayoutError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;

        let mut providers: Vec<SharedProvider> =
            vec![Arc::new(ProviderBuilder::new().connect_http(primary_url))];
        for url_str in &config.failover_urls {
            match url_str.parse() {
                Ok(url) => providers.push(Arc::new(ProviderBuilder::new().connect_http(url))),
                Err(_) => tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL"),
            }
        }

        let client = Self {
            timeout_duration: Duration::from_secs(config.rpc_timeout_secs),
            providers,
            config: config.clone(),
        };

        match client.verify_chain_id().await {
            Ok(()) => tracing::info!(
                rpc_url = %config.rpc_url,
                chain_id = config.chain_id,
                "Blockchain client initialized"
            ),
            Err(e) => tracing::warn!(
                error = %e,
                "Blockchain client initialized but chain verification failed"
            ),
        }

        Ok(client)
    }

    /// Run `f` against each endpoint in order until one answers in time.
    async fn try_each<T, E, F, Fut>(&self, op: &'static str, f: F) -> PayoutResult<T>
    where
        F: Fn(SharedProvider) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, f(provider.clone())).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, op, error = %e, "RPC error, trying next provider");
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, op, "RPC timeout, trying next provider");
                }
            }
        }
        Err(PayoutError::Rpc(format!("all providers failed: {}", op)))
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> PayoutResult<()> {
        let chain_id = self.get_chain_id().await?;
        if chain_id.0 != self.config.chain_id {
            return Err(PayoutError::ChainMismatch {
                expected: self.config.chain_id,
                actual: chain_id.0,
            });
        }
        Ok(())
    }

    pub async fn get_chain_id(&self) -> PayoutResult<ChainId> {
        self.try_each("chain id", |p| async move { p.get_chain_id().await })
            .await
            .map(ChainId)
    }

    pub async fn get_block_number(&self) -> PayoutResult<u64> {
        self.try_each("block number", |p| async move { p.get_block_number().await })
            .await
    }

    /// Balance of an address in wei.
    pub async fn get_balance(&self, address: Address) -> PayoutResult<U256> {
        self.try_each("balance", move |p| async move { p.get_balance(address).await })
            .await
    }

    /// Transaction count (nonce) for an address.
    pub async fn get_transaction_count(&self, address: Address) -> PayoutResult<u64> {
        self.try_each("transaction count", move |p| async move {
            p.get_transaction_count(address).await
        })
        .await
    }

    pub async fn get_transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> PayoutResult<Option<TransactionReceipt>> {
        self.try_each("receipt", move |p| async move {
            p.get_transaction_receipt(tx_hash).await
        })
        .await
    }

    /// Current gas price in wei.
    pub async fn get_gas_price(&self) -> PayoutResult<u128> {
        self.try_each("gas price", |p| async move { p.get_gas_price().await })
            .await
    }

    /// Check connectivity and record the health gauge.
    pub async fn is_healthy(&self) -> bool {
        let healthy = self.get_block_number().await.is_ok();
        metrics::record_rpc_health(healthy);
        healthy
    }

    /// Number of confirmation blocks required for finality.
    pub fn confirmation_blocks(&self) -> u32 {
        self.config.confirmation_blocks
    }
}

impl std::fmt::Debug for BlockchainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockchainClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("chain_id", &self.config.chain_id)
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}
