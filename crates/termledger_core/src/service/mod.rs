//! Core use-case services.
//!
//! # Responsibility
//! - Turn model and ledger primitives into user-facing operations.
//! - Keep callers decoupled from storage and reconciliation details.

pub mod attribution;
pub mod auto_match;
pub mod reconcile;
pub mod workspace;
