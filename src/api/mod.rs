//! HTTP surface over the settlement core.
//!
//! # Data Flow
//! ```text
//! request → router (server.rs)
//!     → handler (handlers.rs)
//!     → core (processor / validator / oracle)
//!     → JSON envelope response
//! ```
//!
//! The HTTP layer is deliberately thin: it translates between the wire
//! envelope and the library API, and maps the error taxonomy to status
//! codes. All business rules live below it.

pub mod handlers;
pub mod server;

pub use server::{ApiServer, AppState};
