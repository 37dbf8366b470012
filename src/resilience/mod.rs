//! Resilience primitives.
//!
//! Currently just exponential backoff, used by the settlement processor to
//! retry the post-broadcast ledger finalize (the one write that must not be
//! given up on lightly).

pub mod backoff;

pub use backoff::calculate_backoff;
