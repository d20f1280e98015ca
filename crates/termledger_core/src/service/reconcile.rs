//! Linked-institution reconciliation.
//!
//! # Responsibility
//! - Merge manual links, assignment-derived links and name-matched links
//!   into one deduplicated institution id set.
//!
//! # Invariants
//! - Pure: the same inputs always produce the same set.
//! - Order-insensitive: results are sets, not sequences.
//! - The manual portion is carried through untouched.

use crate::ledger::AssignmentLedger;
use crate::model::customer::CustomerProfile;
use crate::model::institution::InstitutionRegistry;
use serde::Serialize;
use std::collections::BTreeSet;

/// Per-source breakdown of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedInstitutions {
    pub manual: BTreeSet<String>,
    pub from_assignments: BTreeSet<String>,
    pub by_name: BTreeSet<String>,
}

impl LinkedInstitutions {
    /// Union of all three sources.
    pub fn all(&self) -> BTreeSet<String> {
        self.manual
            .iter()
            .chain(&self.from_assignments)
            .chain(&self.by_name)
            .cloned()
            .collect()
    }

    /// Ids linked only through derivation, not manually.
    pub fn derived_only(&self) -> BTreeSet<String> {
        self.from_assignments
            .iter()
            .chain(&self.by_name)
            .filter(|id| !self.manual.contains(*id))
            .cloned()
            .collect()
    }
}

/// Registry record ids reached through each assignment's back-reference.
pub fn derive_from_assignments(
    assignments: &AssignmentLedger,
    registry: &InstitutionRegistry,
) -> BTreeSet<String> {
    assignments
        .iter()
        .filter_map(|assignment| registry.resolve(&assignment.institution))
        .map(|record| record.id.clone())
        .collect()
}

/// Registry record ids whose display name equals the customer name,
/// compared trimmed and case-insensitively.
pub fn derive_by_name_match(customer_name: &str, registry: &InstitutionRegistry) -> BTreeSet<String> {
    let needle = fold_name(customer_name);
    if needle.is_empty() {
        return BTreeSet::new();
    }
    registry
        .all_records()
        .filter(|(_, record)| fold_name(&record.name) == needle)
        .map(|(_, record)| record.id.clone())
        .collect()
}

/// Full breakdown for one customer snapshot.
pub fn reconcile_report(
    customer: &CustomerProfile,
    assignments: &AssignmentLedger,
    registry: &InstitutionRegistry,
) -> LinkedInstitutions {
    LinkedInstitutions {
        manual: customer.manual_institution_ids.clone(),
        from_assignments: derive_from_assignments(assignments, registry),
        by_name: derive_by_name_match(&customer.name, registry),
    }
}

/// Linked institution set: manual ∪ assignment-derived ∪ name-matched.
pub fn recompute(
    customer: &CustomerProfile,
    assignments: &AssignmentLedger,
    registry: &InstitutionRegistry,
) -> BTreeSet<String> {
    reconcile_report(customer, assignments, registry).all()
}

fn fold_name(value: &str) -> String {
    value.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::{derive_by_name_match, derive_from_assignments, recompute, reconcile_report};
    use crate::ledger::AssignmentLedger;
    use crate::model::assignment::NewAssignment;
    use crate::model::customer::{CustomerProfile, DomainProfile};
    use crate::model::institution::{InstitutionRef, InstitutionRegistry, RegistryRecord};
    use std::collections::BTreeSet;

    fn registry() -> InstitutionRegistry {
        InstitutionRegistry {
            banks: vec![
                RegistryRecord::new("R-BANK-1", "First Bank").with_linked_source("b-1"),
                RegistryRecord::new("R-BANK-2", "Acme Payments"),
            ],
            epk: vec![RegistryRecord::new("R-EPK-1", "Wallet Co").with_linked_source("e-9")],
            ok: vec![RegistryRecord::new("R-OK-1", "  ACME payments ")],
        }
    }

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn assignment_links_resolve_by_kind_and_back_reference() {
        let mut ledger = AssignmentLedger::new();
        ledger.create_category(NewAssignment::new(InstitutionRef::bank("b-1").unwrap(), "First"));
        ledger.create_category(NewAssignment::new(InstitutionRef::ok("e-9").unwrap(), "Wrong kind"));
        ledger.create_category(NewAssignment::new(InstitutionRef::epk("e-9").unwrap(), "Wallet"));

        assert_eq!(
            derive_from_assignments(&ledger, &registry()),
            set(&["R-BANK-1", "R-EPK-1"])
        );
    }

    #[test]
    fn name_match_is_trimmed_and_case_insensitive() {
        assert_eq!(
            derive_by_name_match(" acme PAYMENTS", &registry()),
            set(&["R-BANK-2", "R-OK-1"])
        );
        assert!(derive_by_name_match("   ", &registry()).is_empty());
    }

    #[test]
    fn recompute_unions_sources_and_is_pure() {
        let mut customer = CustomerProfile::new("Acme Payments", DomainProfile::new("acme.com"));
        customer.manual_institution_ids = set(&["MANUAL-1", "R-BANK-1"]);
        let mut ledger = AssignmentLedger::new();
        ledger.create_category(NewAssignment::new(InstitutionRef::bank("b-1").unwrap(), "First"));

        let first = recompute(&customer, &ledger, &registry());
        let second = recompute(&customer, &ledger, &registry());
        assert_eq!(first, second);
        assert_eq!(first, set(&["MANUAL-1", "R-BANK-1", "R-BANK-2", "R-OK-1"]));

        let report = reconcile_report(&customer, &ledger, &registry());
        assert_eq!(report.derived_only(), set(&["R-BANK-2", "R-OK-1"]));
    }

    #[test]
    fn manual_links_survive_when_derivations_vanish() {
        let mut customer = CustomerProfile::new("Nobody", DomainProfile::default());
        customer.manual_institution_ids = set(&["R-EPK-1"]);

        let linked = recompute(&customer, &AssignmentLedger::new(), &InstitutionRegistry::new());
        assert_eq!(linked, set(&["R-EPK-1"]));
    }
}
