//! Domain model for customers, devices, institutions and assignments.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep every record serde round-trippable for snapshot persistence.
//!
//! # Invariants
//! - Devices and registry records are read-only inputs.
//! - Domain hierarchies are pure forests without parent references.

pub mod assignment;
pub mod customer;
pub mod device;
pub mod domain_tree;
pub mod institution;
