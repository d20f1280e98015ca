//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define snapshot-oriented data access contracts.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes and reads enforce assignment ledger invariants.

pub mod profile_repo;
