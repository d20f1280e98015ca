//! Customer profile snapshot.
//!
//! # Responsibility
//! - Bundle the customer's domain profile, assignment ledger and linked
//!   institution sets into one round-trippable snapshot.
//!
//! # Invariants
//! - `manual_institution_ids` is only changed by explicit user action.
//! - `linked_institution_ids` is derived; callers replace it wholesale with
//!   the output of reconciliation.

use crate::ledger::AssignmentLedger;
use crate::model::domain_tree::DomainForest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Stable customer identifier.
pub type CustomerId = Uuid;

/// Domain matching settings of one customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainProfile {
    #[serde(default)]
    pub root_domain: String,
    #[serde(default)]
    pub hierarchy: DomainForest,
    /// When set, only hierarchy nodes are match candidates.
    #[serde(default)]
    pub ignore_root_domain: bool,
    /// Free-form reason recorded alongside the override.
    #[serde(default)]
    pub ignore_root_domain_note: Option<String>,
}

impl DomainProfile {
    pub fn new(root_domain: impl Into<String>) -> Self {
        Self {
            root_domain: root_domain.into(),
            ..Self::default()
        }
    }

    /// Toggles the ignore-root override.
    ///
    /// Turning the override off drops the note; a blank note is stored as
    /// `None`.
    pub fn set_ignore_root_domain(&mut self, ignore: bool, note: Option<String>) {
        self.ignore_root_domain = ignore;
        self.ignore_root_domain_note = if ignore {
            note.map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        } else {
            None
        };
    }
}

/// Full per-customer snapshot passed in and returned whole by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerProfile {
    pub id: CustomerId,
    /// Display name, also used for name-based institution linking.
    pub name: String,
    #[serde(default)]
    pub domain: DomainProfile,
    #[serde(default)]
    pub assignments: AssignmentLedger,
    #[serde(default)]
    pub manual_institution_ids: BTreeSet<String>,
    #[serde(default)]
    pub linked_institution_ids: BTreeSet<String>,
    /// Bumped by every mutation applied through the workspace facade.
    #[serde(default)]
    pub revision: u64,
}

impl CustomerProfile {
    pub fn new(name: impl Into<String>, domain: DomainProfile) -> Self {
        Self::with_id(Uuid::new_v4(), name, domain)
    }

    pub fn with_id(id: CustomerId, name: impl Into<String>, domain: DomainProfile) -> Self {
        Self {
            id,
            name: name.into(),
            domain,
            assignments: AssignmentLedger::new(),
            manual_institution_ids: BTreeSet::new(),
            linked_institution_ids: BTreeSet::new(),
            revision: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CustomerProfile, DomainProfile};

    #[test]
    fn ignore_root_note_is_dropped_when_override_is_off() {
        let mut domain = DomainProfile::new("acme.com");
        domain.set_ignore_root_domain(true, Some("  shared parent domain ".to_string()));
        assert!(domain.ignore_root_domain);
        assert_eq!(
            domain.ignore_root_domain_note.as_deref(),
            Some("shared parent domain")
        );

        domain.set_ignore_root_domain(true, Some("   ".to_string()));
        assert_eq!(domain.ignore_root_domain_note, None);

        domain.set_ignore_root_domain(false, Some("ignored".to_string()));
        assert!(!domain.ignore_root_domain);
        assert_eq!(domain.ignore_root_domain_note, None);
    }

    #[test]
    fn profile_serialization_uses_camel_case_fields() {
        let profile = CustomerProfile::new("Acme", DomainProfile::new("acme.com"));
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["domain"]["rootDomain"], "acme.com");
        assert_eq!(json["domain"]["ignoreRootDomain"], false);
        assert!(json["assignments"].as_array().unwrap().is_empty());

        let decoded: CustomerProfile = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, profile);
    }
}
