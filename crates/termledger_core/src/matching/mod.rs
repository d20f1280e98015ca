//! Domain identity normalization and device-to-customer matching.
//!
//! # Responsibility
//! - Canonicalize raw domain strings into comparable identities.
//! - Decide whether a device domain belongs to a customer domain profile.
//!
//! # Invariants
//! - `normalize` is total, pure and idempotent.
//! - Blank identities never match anything.

pub mod matcher;
pub mod normalize;
