//! Wallet profile record, owned by the external account collaborator.

use serde::{Deserialize, Serialize};

/// Account wallet registration.
///
/// The core reads this record and only writes the verification flag, which
/// may be true only while the address passes format validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletProfile {
    pub account_id: String,
    pub wallet_address: Option<String>,
    pub verified: bool,
}

impl WalletProfile {
    pub fn unregistered(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            wallet_address: None,
            verified: false,
        }
    }
}
