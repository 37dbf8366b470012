//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! settlement core. All types derive Serde traits for deserialization from
//! config files. The payout signing key is never part of the file; it is
//! loaded from the environment only.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Root configuration for the settlement core.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SettlementConfig {
    /// API listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Exchange-rate oracle settings.
    pub oracle: OracleConfig,

    /// Blockchain integration settings.
    pub blockchain: BlockchainConfig,

    /// Payout policy (amount bounds, finalize retry).
    pub payout: PayoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout in seconds for the API surface.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 330,
        }
    }
}

/// Exchange-rate oracle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Price feed endpoint (simple-price shape).
    pub feed_url: String,

    /// Asset identifier in the feed response.
    pub asset_id: String,

    /// Local currency code in the feed response (lowercase).
    pub currency: String,

    /// Feed request timeout in seconds.
    pub feed_timeout_secs: u64,

    /// Cache time-to-live in seconds.
    pub cache_ttl_secs: u64,

    /// Fixed rate served when the feed is down and no snapshot exists.
    pub fallback_rate: Decimal,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            feed_url: "https://api.coingecko.com/api/v3/simple/price".to_string(),
            asset_id: "ethereum".to_string(),
            currency: "inr".to_string(),
            feed_timeout_secs: 10,
            cache_ttl_secs: 300,
            fallback_rate: dec!(250000),
        }
    }
}

/// Blockchain integration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BlockchainConfig {
    /// Enable blockchain integration.
    pub enabled: bool,

    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    #[serde(default)]
    pub failover_urls: Vec<String>,

    /// Chain ID (11155111 for Sepolia, 31337 for local Anvil).
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Number of block confirmations required for finality.
    pub confirmation_blocks: u32,

    /// Deadline in seconds for broadcast-and-confirm; past it the outcome
    /// is recorded as unknown.
    pub confirm_timeout_secs: u64,

    /// Gas price multiplier (1.0 = estimated, 1.2 = 20% buffer).
    pub gas_price_multiplier: f64,

    /// Maximum gas price in gwei (protection against spikes).
    pub max_gas_price_gwei: u64,
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rpc_url: "https://rpc.sepolia.org".to_string(),
            failover_urls: Vec::new(),
            chain_id: 11155111,
            rpc_timeout_secs: 10,
            confirmation_blocks: 1,
            confirm_timeout_secs: 300,
            gas_price_multiplier: 1.2,
            max_gas_price_gwei: 500,
        }
    }
}

/// Payout policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PayoutConfig {
    /// Currency code used in fiat transfer references.
    pub currency_code: String,

    /// Minimum accepted valuation in local currency.
    pub min_amount: Decimal,

    /// Maximum accepted valuation in local currency (safety limit).
    pub max_amount: Decimal,

    /// Maximum retries for the post-broadcast ledger finalize.
    pub finalize_retry_attempts: u32,

    /// Base delay for finalize retry backoff in milliseconds.
    pub finalize_retry_base_ms: u64,

    /// Maximum delay for finalize retry backoff in milliseconds.
    pub finalize_retry_max_ms: u64,
}

impl Default for PayoutConfig {
    fn default() -> Self {
        Self {
            currency_code: "INR".to_string(),
            min_amount: dec!(1),
            max_amount: dec!(10000000),
            finalize_retry_attempts: 4,
            finalize_retry_base_ms: 100,
            finalize_retry_max_ms: 2000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SettlementConfig::default();
        assert_eq!(config.oracle.cache_ttl_secs, 300);
        assert_eq!(config.oracle.fallback_rate, dec!(250000));
        assert_eq!(config.blockchain.chain_id, 11155111);
        assert_eq!(config.blockchain.confirmation_blocks, 1);
        assert_eq!(config.payout.currency_code, "INR");
    }

    #[test]
    fn test_minimal_toml_parses() {
        let config: SettlementConfig = toml::from_str(
            r#"
            [blockchain]
            enabled = true
            chain_id = 31337
            rpc_url = "http://localhost:8545"
            "#,
        )
        .unwrap();
        assert!(config.blockchain.enabled);
        assert_eq!(config.blockchain.chain_id, 31337);
        // Untouched sections fall back to defaults
        assert_eq!(config.oracle.currency, "inr");
    }
}
