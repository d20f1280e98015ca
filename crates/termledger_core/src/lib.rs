//! Core domain logic for TermLedger.
//! This crate is the single source of truth for terminal attribution and
//! assignment invariants.

pub mod autosave;
pub mod config;
pub mod db;
pub mod ledger;
pub mod logging;
pub mod matching;
pub mod model;
pub mod repo;
pub mod service;

pub use autosave::{AutosaveScheduler, ProfileAutosaver};
pub use config::{ConfigError, CoreConfig};
pub use ledger::{AddDevicesReport, AssignmentLedger, CreateOutcome, DeviceConflict, LedgerError};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use matching::matcher::{DomainMatcher, MatchLevel};
pub use matching::normalize::normalize;
pub use model::assignment::{Assignment, AssignmentId, NewAssignment};
pub use model::customer::{CustomerId, CustomerProfile, DomainProfile};
pub use model::device::{DeviceId, DeviceRecord};
pub use model::domain_tree::{DomainForest, DomainNode, HierarchyError, NodePath};
pub use model::institution::{InstitutionKind, InstitutionRef, InstitutionRegistry, RegistryRecord};
pub use repo::profile_repo::{
    ProfileRepoError, ProfileRepoResult, ProfileRepository, RegistrySnapshotRepository,
    SqliteProfileRepository,
};
pub use service::attribution::{attribute, DeviceGroup};
pub use service::auto_match::{auto_match, AutoMatchReport, DomainPatternCatalog};
pub use service::reconcile::{recompute, LinkedInstitutions};
pub use service::workspace::{CustomerWorkspace, WorkspaceError};

/// Minimal health-check API for host integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
