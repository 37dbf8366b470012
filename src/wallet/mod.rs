//! Wallet address validation and registration.
//!
//! Verification is purely syntactic: a well-formed address is marked
//! verified without any on-chain or signature proof.

use std::sync::Arc;
use thiserror::Error;

use crate::model::WalletProfile;
use crate::store::{SettlementStore, StoreError};

/// Errors from wallet registration and payout eligibility checks.
#[derive(Debug, Error)]
pub enum WalletError {
    /// Address is not `0x` followed by 40 hex characters.
    #[error("invalid wallet address format: must be 42 characters starting with 0x")]
    InvalidFormat,

    /// Another account already holds this exact address.
    #[error("wallet address already registered with another account")]
    AlreadyRegistered,

    /// No wallet on file for the account.
    #[error("no wallet address on record for account {0}")]
    NotRegistered(String),

    /// Wallet exists but has not passed verification.
    #[error("wallet address for account {0} is not verified")]
    NotVerified(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Check address syntax: `0x` prefix + exactly 40 hex characters,
/// case-insensitive, total length 42.
pub fn is_valid_address(address: &str) -> bool {
    address.len() == 42
        && address.starts_with("0x")
        && address[2..].bytes().all(|b| b.is_ascii_hexdigit())
}

/// Wallet registration service over the persistence port.
pub struct WalletValidator {
    store: Arc<dyn SettlementStore>,
}

impl WalletValidator {
    pub fn new(store: Arc<dyn SettlementStore>) -> Self {
        Self { store }
    }

    /// Register (or replace) an account's wallet address.
    ///
    /// Fails with [`WalletError::InvalidFormat`] on bad syntax and
    /// [`WalletError::AlreadyRegistered`] if another account holds the
    /// address. The uniqueness claim happens inside the store so two
    /// concurrent registrations of the same address cannot both succeed.
    pub async fn register_wallet(
        &self,
        account_id: &str,
        address: &str,
    ) -> Result<WalletProfile, WalletError> {
        if !is_valid_address(address) {
            return Err(WalletError::InvalidFormat);
        }

        let profile = self
            .store
            .bind_wallet_address(account_id, address)
            .await
            .map_err(|e| match e {
                StoreError::Conflict { .. } => WalletError::AlreadyRegistered,
                other => WalletError::Store(other),
            })?;

        tracing::info!(account_id = %account_id, "Wallet registered and verified");
        Ok(profile)
    }

    /// Clear an account's wallet address and verification flag.
    pub async fn remove_wallet(&self, account_id: &str) -> Result<(), WalletError> {
        self.store
            .upsert_profile(WalletProfile::unregistered(account_id))
            .await?;
        tracing::info!(account_id = %account_id, "Wallet removed");
        Ok(())
    }

    /// Address an account can receive a crypto payout on.
    ///
    /// Re-checks the stored address format defensively: the verified flag is
    /// only trusted while the address still parses.
    pub async fn wallet_for_payout(&self, account_id: &str) -> Result<String, WalletError> {
        let profile = self
            .store
            .get_profile(account_id)
            .await?
            .ok_or_else(|| WalletError::NotRegistered(account_id.to_string()))?;

        let address = profile
            .wallet_address
            .ok_or_else(|| WalletError::NotRegistered(account_id.to_string()))?;

        if !is_valid_address(&address) {
            return Err(WalletError::InvalidFormat);
        }
        if !profile.verified {
            return Err(WalletError::NotVerified(account_id.to_string()));
        }

        Ok(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn validator() -> (WalletValidator, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (WalletValidator::new(store.clone()), store)
    }

    #[test]
    fn test_address_format() {
        // 0x + 40 hex chars validates true
        assert!(is_valid_address(&format!("0x{}", "f".repeat(40))));
        assert!(is_valid_address(&format!("0x{}", "Ab1".repeat(13) + "c")));
        // Too short / too long
        assert!(!is_valid_address("0xabc"));
        assert!(!is_valid_address(&format!("0x{}", "f".repeat(41))));
        // Missing prefix
        assert!(!is_valid_address(&"f".repeat(42)));
        // Non-hex character
        assert!(!is_valid_address(&format!("0x{}g", "f".repeat(39))));
        assert!(!is_valid_address(""));
    }

    #[tokio::test]
    async fn test_register_and_verify() {
        let (validator, store) = validator();
        let address = format!("0x{}", "a".repeat(40));

        let profile = validator.register_wallet("acct-1", &address).await.unwrap();
        assert!(profile.verified);
        assert_eq!(profile.wallet_address.as_deref(), Some(address.as_str()));

        let stored = store.get_profile("acct-1").await.unwrap().unwrap();
        assert!(stored.verified);
    }

    #[tokio::test]
    async fn test_register_rejects_bad_format() {
        let (validator, _) = validator();
        let err = validator.register_wallet("acct-1", "0xabc").await.unwrap_err();
        assert!(matches!(err, WalletError::InvalidFormat));
    }

    #[tokio::test]
    async fn test_one_wallet_per_account() {
        let (validator, _) = validator();
        let address = format!("0x{}", "b".repeat(40));

        validator.register_wallet("acct-1", &address).await.unwrap();
        let err = validator
            .register_wallet("acct-2", &address)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::AlreadyRegistered));

        // Re-registering the same address on the same account is fine.
        validator.register_wallet("acct-1", &address).await.unwrap();
    }

    #[tokio::test]
    async fn test_wallet_for_payout() {
        let (validator, _) = validator();
        let address = format!("0x{}", "c".repeat(40));

        let err = validator.wallet_for_payout("acct-1").await.unwrap_err();
        assert!(matches!(err, WalletError::NotRegistered(_)));

        validator.register_wallet("acct-1", &address).await.unwrap();
        assert_eq!(validator.wallet_for_payout("acct-1").await.unwrap(), address);
    }

    #[tokio::test]
    async fn test_remove_wallet() {
        let (validator, _) = validator();
        let address = format!("0x{}", "d".repeat(40));

        validator.register_wallet("acct-1", &address).await.unwrap();
        validator.remove_wallet("acct-1").await.unwrap();

        let err = validator.wallet_for_payout("acct-1").await.unwrap_err();
        assert!(matches!(err, WalletError::NotRegistered(_)));
    }
}
