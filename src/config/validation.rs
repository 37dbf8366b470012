//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, rates positive, bounds ordered)
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: SettlementConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use rust_decimal::Decimal;

use crate::config::schema::SettlementConfig;

/// A single semantic validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn err(field: &str, message: &str) -> ValidationError {
    ValidationError {
        field: field.to_string(),
        message: message.to_string(),
    }
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &SettlementConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(err("listener.bind_address", "not a valid socket address"));
    }

    if config.oracle.feed_url.is_empty() {
        errors.push(err("oracle.feed_url", "must not be empty"));
    }
    if config.oracle.cache_ttl_secs == 0 {
        errors.push(err("oracle.cache_ttl_secs", "must be greater than 0"));
    }
    if config.oracle.fallback_rate <= Decimal::ZERO {
        errors.push(err("oracle.fallback_rate", "must be positive"));
    }

    if config.blockchain.enabled {
        if config.blockchain.rpc_url.parse::<url::Url>().is_err() {
            errors.push(err("blockchain.rpc_url", "not a valid URL"));
        }
        if config.blockchain.rpc_timeout_secs == 0 {
            errors.push(err("blockchain.rpc_timeout_secs", "must be greater than 0"));
        }
        if config.blockchain.confirm_timeout_secs == 0 {
            errors.push(err(
                "blockchain.confirm_timeout_secs",
                "must be greater than 0",
            ));
        }
        if config.blockchain.gas_price_multiplier < 1.0 {
            errors.push(err(
                "blockchain.gas_price_multiplier",
                "must be at least 1.0",
            ));
        }
        if config.blockchain.max_gas_price_gwei == 0 {
            errors.push(err("blockchain.max_gas_price_gwei", "must be greater than 0"));
        }
    }

    if config.payout.min_amount <= Decimal::ZERO {
        errors.push(err("payout.min_amount", "must be positive"));
    }
    if config.payout.max_amount < config.payout.min_amount {
        errors.push(err("payout.max_amount", "must be at least min_amount"));
    }
    if config.payout.currency_code.is_empty() {
        errors.push(err("payout.currency_code", "must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
