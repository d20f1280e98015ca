//! Bulk domain-pattern auto-matcher.
//!
//! # Responsibility
//! - Find devices whose reported domain contains a catalog fragment.
//! - Insert the unassigned ones into the catalog's target assignment.
//!
//! # Invariants
//! - Devices held by another institution are reported, never moved.
//! - The batch insert is pre-filtered, so it cannot raise a conflict.
//! - A run that finds nothing new leaves the ledger unchanged.

use crate::ledger::{AssignmentLedger, LedgerError};
use crate::model::assignment::NewAssignment;
use crate::model::device::{DeviceId, DeviceRecord};
use log::info;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Default number of held-elsewhere samples included in a report.
pub const DEFAULT_HELD_SAMPLE_LIMIT: usize = 3;

/// Domain fragments tied to one target institution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainPatternCatalog {
    pub target: NewAssignment,
    fragments: Vec<String>,
}

impl DomainPatternCatalog {
    /// Builds a catalog; blank fragments are dropped, order is kept.
    pub fn new<I, S>(target: NewAssignment, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fragments = fragments
            .into_iter()
            .map(|fragment| fragment.as_ref().trim().to_lowercase())
            .filter(|fragment| !fragment.is_empty())
            .collect();
        Self { target, fragments }
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    /// First fragment contained in `domain`, case-insensitively.
    pub fn first_match(&self, domain: &str) -> Option<&str> {
        let haystack = domain.trim().to_lowercase();
        if haystack.is_empty() {
            return None;
        }
        self.fragments
            .iter()
            .find(|fragment| haystack.contains(fragment.as_str()))
            .map(String::as_str)
    }
}

/// Classification counts and samples for one auto-match run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoMatchReport {
    pub scanned: usize,
    pub matched: usize,
    pub newly_assigned: usize,
    pub already_in_target: usize,
    pub held_elsewhere: usize,
    /// Up to the sample limit, in registry order.
    pub held_elsewhere_samples: Vec<String>,
    /// Hits per fragment (lower-cased).
    pub by_fragment: BTreeMap<String, usize>,
    pub target_created: bool,
}

/// Runs one catalog against the device registry with the default sample limit.
pub fn auto_match(
    ledger: &mut AssignmentLedger,
    devices: &[DeviceRecord],
    catalog: &DomainPatternCatalog,
) -> Result<AutoMatchReport, LedgerError> {
    auto_match_with_limit(ledger, devices, catalog, DEFAULT_HELD_SAMPLE_LIMIT)
}

/// Runs one catalog against the device registry.
///
/// # Errors
/// Only propagates ledger errors from the batch insert, which the
/// pre-filtering rules out in a single-writer setting.
pub fn auto_match_with_limit(
    ledger: &mut AssignmentLedger,
    devices: &[DeviceRecord],
    catalog: &DomainPatternCatalog,
    held_sample_limit: usize,
) -> Result<AutoMatchReport, LedgerError> {
    let mut report = AutoMatchReport::default();
    let target_id = ledger
        .find_by_institution(&catalog.target.institution)
        .map(|assignment| assignment.id);

    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut new_assignable: Vec<DeviceId> = Vec::new();

    for device in devices {
        let device_id = device.id.trim();
        if device_id.is_empty() || !seen.insert(device_id) {
            continue;
        }
        report.scanned += 1;

        let Some(fragment) = catalog.first_match(device.domain()) else {
            continue;
        };
        report.matched += 1;
        *report.by_fragment.entry(fragment.to_string()).or_default() += 1;

        match ledger.owner_of(device_id) {
            None => new_assignable.push(device_id.to_string()),
            Some(owner) if Some(owner.id) == target_id => report.already_in_target += 1,
            Some(_) => {
                report.held_elsewhere += 1;
                if report.held_elsewhere_samples.len() < held_sample_limit {
                    report
                        .held_elsewhere_samples
                        .push(device.display_identifier().to_string());
                }
            }
        }
    }

    if !new_assignable.is_empty() {
        let target_id = match target_id {
            Some(id) => id,
            None => {
                let outcome = ledger.create_category(catalog.target.clone());
                report.target_created = outcome.is_created();
                outcome.id()
            }
        };
        let added = ledger.add_devices(target_id, new_assignable)?;
        report.newly_assigned = added.added.len();
    }

    info!(
        "event=auto_match module=auto_match status=ok institution={} matched={} new={} in_target={} held_elsewhere={} target_created={}",
        catalog.target.institution,
        report.matched,
        report.newly_assigned,
        report.already_in_target,
        report.held_elsewhere,
        report.target_created
    );
    Ok(report)
}
