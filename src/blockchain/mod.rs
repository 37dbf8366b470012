//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! DecisionProcessor
//!     → executor.rs (preconditions, build, single broadcast, confirm)
//!     → client.rs (RPC queries with timeout + failover)
//!     → signer.rs (env-loaded platform key)
//! ```
//!
//! # Design Decisions
//! - One broadcast per `send_payout` call; retries belong to the caller
//! - Ambiguous outcomes are distinct error variants, not generic failures
//! - All RPC calls bounded by a per-request timeout

pub mod client;
pub mod executor;
pub mod signer;
pub mod types;

pub use client::BlockchainClient;
pub use executor::{ChainPayoutExecutor, DisabledExecutor, PayoutExecutor};
pub use signer::PayoutSigner;
pub use types::{BlockchainConfig, ChainId, PayoutError, PayoutReceipt, PayoutResult};
