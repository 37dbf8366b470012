//! Chain-specific types and error definitions.

use rust_decimal::Decimal;
use thiserror::Error;

// Re-export BlockchainConfig from config module to avoid duplication
pub use crate::config::schema::BlockchainConfig;

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

/// Errors that can occur while executing a payout.
///
/// Variants carrying a `tx_hash` mean the broadcast itself succeeded; the
/// caller must treat those as "money may have moved" and never re-broadcast
/// blindly.
#[derive(Debug, Error)]
pub enum PayoutError {
    /// Destination address failed format validation.
    #[error("invalid recipient address: {0}")]
    InvalidRecipient(String),

    /// Payout amount must be strictly positive.
    #[error("invalid payout amount: {0}")]
    InvalidAmount(Decimal),

    /// Sending account cannot cover the transfer.
    #[error("insufficient balance: required {required} ETH, available {available} ETH")]
    InsufficientBalance { required: Decimal, available: Decimal },

    /// The signer refused to sign the transaction.
    #[error("signer rejected transaction: {0}")]
    SignerRejected(String),

    /// RPC connection or request failed before any broadcast.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Gas price exceeded maximum allowed.
    #[error("gas price {current_gwei} gwei exceeds maximum {max_gwei} gwei")]
    GasPriceTooHigh { current_gwei: u64, max_gwei: u64 },

    /// Broadcast call timed out: the transfer may or may not have reached
    /// the network. Outcome unknown, needs reconciliation.
    #[error("broadcast timed out after {after_secs}s, outcome unknown")]
    AmbiguousTimeout { after_secs: u64 },

    /// Broadcast succeeded but no receipt arrived within the deadline.
    /// The transfer may still be mined. Needs reconciliation.
    #[error("transaction {tx_hash} not confirmed before deadline, outcome unknown")]
    ConfirmationTimeout { tx_hash: String },

    /// Transaction was mined and reverted.
    #[error("transaction {tx_hash} reverted on-chain")]
    Reverted { tx_hash: String },

    /// Broadcast returned but the node produced no usable receipt data.
    #[error("no receipt returned for transaction {tx_hash}")]
    MissingReceipt { tx_hash: String },

    /// Invalid private key format or derivation error.
    #[error("signer error: {0}")]
    Signer(String),

    /// Chain configuration mismatch.
    #[error("chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },
}

impl PayoutError {
    /// True when the transfer may have been mined despite the error. Such
    /// failures must be recorded as `unknown`, never silently retried.
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            PayoutError::AmbiguousTimeout { .. }
                | PayoutError::ConfirmationTimeout { .. }
                | PayoutError::MissingReceipt { .. }
        )
    }

    /// Hash of the broadcast transaction, when one exists.
    pub fn tx_hash(&self) -> Option<&str> {
        match self {
            PayoutError::ConfirmationTimeout { tx_hash }
            | PayoutError::Reverted { tx_hash }
            | PayoutError::MissingReceipt { tx_hash } => Some(tx_hash),
            _ => None,
        }
    }
}

/// Result type for blockchain operations.
pub type PayoutResult<T> = Result<T, PayoutError>;

/// Fee telemetry and proof of a confirmed payout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutReceipt {
    /// Mined transaction hash, 0x-prefixed.
    pub tx_hash: String,
    pub gas_used: u64,
    /// Effective gas price in gwei.
    pub gas_price_gwei: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_chain_id_conversion() {
        let chain_id = ChainId::from(11155111u64);
        assert_eq!(chain_id.0, 11155111);
        assert_eq!(u64::from(chain_id), 11155111);
    }

    #[test]
    fn test_error_display() {
        let err = PayoutError::InsufficientBalance {
            required: dec!(0.04),
            available: dec!(0.001),
        };
        assert!(err.to_string().contains("0.04"));
        assert!(err.to_string().contains("0.001"));

        let err = PayoutError::GasPriceTooHigh {
            current_gwei: 600,
            max_gwei: 500,
        };
        assert!(err.to_string().contains("600"));
    }

    #[test]
    fn test_ambiguity_classification() {
        assert!(PayoutError::AmbiguousTimeout { after_secs: 30 }.is_ambiguous());
        assert!(PayoutError::ConfirmationTimeout {
            tx_hash: "0xabc".to_string()
        }
        .is_ambiguous());
        assert!(!PayoutError::InsufficientBalance {
            required: dec!(1),
            available: dec!(0)
        }
        .is_ambiguous());
        assert!(!PayoutError::Reverted {
            tx_hash: "0xabc".to_string()
        }
        .is_ambiguous());
    }

    #[test]
    fn test_tx_hash_extraction() {
        let err = PayoutError::ConfirmationTimeout {
            tx_hash: "0xdeadbeef".to_string(),
        };
        assert_eq!(err.tx_hash(), Some("0xdeadbeef"));
        assert_eq!(PayoutError::Rpc("boom".to_string()).tx_hash(), None);
    }
}
