//! Settlement orchestration subsystem.
//!
//! # Data Flow
//! ```text
//! DecisionRequest
//!     → processor.rs (validate, state guard)
//!     → oracle (rate) → ledger (open) → executor (broadcast)
//!     → ledger (finalize) → store (conditional item update)
//!     → DecisionOutcome / SettlementError
//! ```

pub mod processor;
pub mod types;

pub use processor::DecisionProcessor;
pub use types::{DecisionOutcome, DecisionRequest, SettlementError};
