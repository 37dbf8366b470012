//! Domain records for the settlement core.
//!
//! # Data Flow
//! ```text
//! Item (seller submission, pending_valuation)
//!     → DecisionProcessor opens a Transaction (ledger entry)
//!     → Transaction reaches exactly one terminal state
//!     → Item status reconciled from the Transaction outcome
//! ```
//!
//! WalletProfile is the external collaborator's record; the core reads it
//! and only ever touches the verification flag.

pub mod item;
pub mod profile;
pub mod transaction;

pub use item::{CostBreakdown, Decision, Item, ItemStatus, PayoutMethod};
pub use profile::WalletProfile;
pub use transaction::{Transaction, TransactionStatus};
