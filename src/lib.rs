//! Settlement core for a used-device marketplace.
//!
//! Turns an official's disposition decision into a settled payout: fiat
//! items get a bank-transfer reference, crypto items get an on-chain
//! transfer to the seller's verified wallet, and every attempt leaves a
//! durable ledger record before the item row changes.

// Core subsystems
pub mod config;
pub mod ledger;
pub mod model;
pub mod oracle;
pub mod settlement;
pub mod store;
pub mod wallet;

// Blockchain integration
pub mod blockchain;

// Cross-cutting concerns
pub mod api;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::SettlementConfig;
pub use lifecycle::Shutdown;
pub use settlement::DecisionProcessor;
