//! Platform payout signer.
//!
//! # Security
//! - Private keys are loaded ONLY from environment variables
//! - Keys are never logged or serialized

use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;

use crate::blockchain::types::{PayoutError, PayoutResult};

/// Environment variable name for the platform private key.
pub const PRIVATE_KEY_ENV_VAR: &str = "SETTLEMENT_PAYOUT_PRIVATE_KEY";

/// Signing identity the payout executor broadcasts from.
#[derive(Debug, Clone)]
pub struct PayoutSigner {
    /// The underlying signer (private key).
    signer: PrivateKeySigner,
    /// Chain ID for EIP-155 replay protection.
    chain_id: u64,
}

impl PayoutSigner {
    /// Create a signer from a hex-encoded private key string.
    ///
    /// # Security
    /// The private key is parsed and stored securely. It is never logged.
    pub fn from_private_key(private_key_hex: &str, chain_id: u64) -> PayoutResult<Self> {
        // Strip 0x prefix if present
        let key_hex = private_key_hex.strip_prefix("0x").unwrap_or(private_key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| PayoutError::Signer(format!("Invalid private key format: {}", e)))?;

        tracing::info!(
            address = %signer.address(),
            chain_id = chain_id,
            "Payout signer initialized"
        );

        Ok(Self { signer, chain_id })
    }

    /// Load the signer from `SETTLEMENT_PAYOUT_PRIVATE_KEY`.
    pub fn from_env(chain_id: u64) -> PayoutResult<Self> {
        let private_key = std::env::var(PRIVATE_KEY_ENV_VAR).map_err(|_| {
            PayoutError::Signer(format!(
                "Environment variable {} not set",
                PRIVATE_KEY_ENV_VAR
            ))
        })?;

        Self::from_private_key(&private_key, chain_id)
    }

    /// The platform's sending address.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Chain ID this signer is configured for.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Wallet handle for a signing provider.
    pub fn wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.signer.clone())
    }
}
