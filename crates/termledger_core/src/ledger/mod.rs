//! Bank/payment-facilitator assignment ledger.
//!
//! # Responsibility
//! - Own the per-customer list of assignments, the sole source of
//!   device-to-institution ownership.
//! - Guard every mutation with the exclusive-ownership conflict check.
//!
//! # Invariants
//! - `device_ids` of all assignments are pairwise disjoint.
//! - At most one assignment exists per institution reference.
//! - A rejected `add_devices` call leaves every assignment unchanged.
//! - Missing assignment targets are no-ops, never errors.

use crate::model::assignment::{Assignment, AssignmentId, NewAssignment};
use crate::model::device::DeviceId;
use crate::model::institution::InstitutionRef;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

/// One candidate device already owned by a different assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConflict {
    pub device_id: DeviceId,
    pub assignment_id: AssignmentId,
    pub institution: InstitutionRef,
    pub institution_name: String,
}

/// Errors from ledger mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Caller passed no device ids.
    EmptySelection,
    /// A device id is blank after trim.
    InvalidDeviceId(String),
    /// Candidates are owned elsewhere; nothing was mutated.
    Conflict(Vec<DeviceConflict>),
}

impl LedgerError {
    /// Conflicting device ids, empty for non-conflict errors.
    pub fn conflicting_device_ids(&self) -> Vec<&str> {
        match self {
            Self::Conflict(conflicts) => conflicts
                .iter()
                .map(|conflict| conflict.device_id.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySelection => write!(f, "no devices selected"),
            Self::InvalidDeviceId(value) => write!(f, "invalid device id: `{value}`"),
            Self::Conflict(conflicts) => {
                write!(f, "{} device(s) already assigned elsewhere:", conflicts.len())?;
                for conflict in conflicts {
                    write!(
                        f,
                        " {} ({})",
                        conflict.device_id, conflict.institution_name
                    )?;
                }
                Ok(())
            }
        }
    }
}

impl Error for LedgerError {}

/// Result of `create_category`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(AssignmentId),
    /// An assignment for the same institution already existed; nothing changed.
    AlreadyExists(AssignmentId),
}

impl CreateOutcome {
    pub fn id(self) -> AssignmentId {
        match self {
            Self::Created(id) | Self::AlreadyExists(id) => id,
        }
    }

    pub fn is_created(self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Report for a successful `add_devices` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddDevicesReport {
    /// `false` when the target assignment does not exist; nothing changed.
    pub target_found: bool,
    pub added: Vec<DeviceId>,
    /// Ids that were already in the target and were skipped.
    pub already_present: Vec<DeviceId>,
}

/// Invariant violation found in a loaded ledger snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerViolation {
    OverlappingDevice {
        device_id: DeviceId,
        assignments: Vec<AssignmentId>,
    },
    DuplicateInstitution {
        institution: InstitutionRef,
        assignments: Vec<AssignmentId>,
    },
    DuplicateAssignmentId(AssignmentId),
}

impl Display for LedgerViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OverlappingDevice {
                device_id,
                assignments,
            } => write!(
                f,
                "device {device_id} is owned by {} assignments",
                assignments.len()
            ),
            Self::DuplicateInstitution {
                institution,
                assignments,
            } => write!(
                f,
                "institution {institution} has {} assignments",
                assignments.len()
            ),
            Self::DuplicateAssignmentId(id) => write!(f, "assignment id {id} is not unique"),
        }
    }
}

/// Per-customer ordered list of assignments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssignmentLedger {
    assignments: Vec<Assignment>,
}

impl AssignmentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Assignment> {
        self.assignments.iter()
    }

    pub fn get(&self, id: AssignmentId) -> Option<&Assignment> {
        self.assignments.iter().find(|assignment| assignment.id == id)
    }

    pub fn find_by_institution(&self, institution: &InstitutionRef) -> Option<&Assignment> {
        self.assignments
            .iter()
            .find(|assignment| &assignment.institution == institution)
    }

    /// Assignment currently owning `device_id`.
    pub fn owner_of(&self, device_id: &str) -> Option<&Assignment> {
        self.assignments
            .iter()
            .find(|assignment| assignment.contains(device_id))
    }

    /// Union of all assigned device ids.
    pub fn assigned_device_ids(&self) -> BTreeSet<&str> {
        self.assignments
            .iter()
            .flat_map(|assignment| assignment.device_ids.iter().map(String::as_str))
            .collect()
    }

    /// Creates an empty assignment for `request.institution`.
    ///
    /// Rejects duplicates atomically by returning the existing id.
    pub fn create_category(&mut self, request: NewAssignment) -> CreateOutcome {
        self.create_category_at(request, now_epoch_ms())
    }

    /// Same as [`Self::create_category`] with an explicit creation timestamp.
    pub fn create_category_at(&mut self, request: NewAssignment, created_at: i64) -> CreateOutcome {
        if let Some(existing) = self.find_by_institution(&request.institution) {
            info!(
                "event=ledger_create_category module=ledger status=exists assignment_id={}",
                existing.id
            );
            return CreateOutcome::AlreadyExists(existing.id);
        }

        let assignment = Assignment::from_request(request, created_at);
        let id = assignment.id;
        info!(
            "event=ledger_create_category module=ledger status=ok assignment_id={} institution={}",
            id, assignment.institution
        );
        self.assignments.push(assignment);
        CreateOutcome::Created(id)
    }

    /// Adds devices to one assignment, all-or-nothing.
    ///
    /// # Errors
    /// - `EmptySelection` when `device_ids` is empty.
    /// - `InvalidDeviceId` when any id is blank.
    /// - `Conflict` when any id is owned by another assignment.
    pub fn add_devices<I, S>(
        &mut self,
        assignment_id: AssignmentId,
        device_ids: I,
    ) -> Result<AddDevicesReport, LedgerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<DeviceId>,
    {
        let mut candidates = Vec::new();
        let mut seen = BTreeSet::new();
        for raw in device_ids {
            let raw: DeviceId = raw.into();
            let id = raw.trim();
            if id.is_empty() {
                return Err(LedgerError::InvalidDeviceId(raw));
            }
            if seen.insert(id.to_string()) {
                candidates.push(id.to_string());
            }
        }
        if candidates.is_empty() {
            return Err(LedgerError::EmptySelection);
        }

        let Some(target_index) = self.index_of(assignment_id) else {
            warn!(
                "event=ledger_add_devices module=ledger status=not_found assignment_id={}",
                assignment_id
            );
            return Ok(AddDevicesReport::default());
        };

        let conflicts = self.conflicts_for(assignment_id, &candidates);
        if !conflicts.is_empty() {
            warn!(
                "event=ledger_add_devices module=ledger status=conflict assignment_id={} conflicts={}",
                assignment_id,
                conflicts.len()
            );
            return Err(LedgerError::Conflict(conflicts));
        }

        let target = &mut self.assignments[target_index];
        let mut report = AddDevicesReport {
            target_found: true,
            ..AddDevicesReport::default()
        };
        for id in candidates {
            if target.device_ids.contains(&id) {
                report.already_present.push(id);
            } else {
                target.device_ids.insert(id.clone());
                report.added.push(id);
            }
        }

        info!(
            "event=ledger_add_devices module=ledger status=ok assignment_id={} added={} skipped={}",
            assignment_id,
            report.added.len(),
            report.already_present.len()
        );
        Ok(report)
    }

    /// Removes one device from one assignment. Returns whether it was present.
    pub fn remove_device(&mut self, assignment_id: AssignmentId, device_id: &str) -> bool {
        let removed = self
            .assignment_mut(assignment_id)
            .map(|assignment| assignment.device_ids.remove(device_id.trim()))
            .unwrap_or(false);
        if removed {
            info!(
                "event=ledger_remove_device module=ledger status=ok assignment_id={}",
                assignment_id
            );
        }
        removed
    }

    /// Empties one assignment. Returns the number of devices detached.
    pub fn clear_all(&mut self, assignment_id: AssignmentId) -> usize {
        let Some(assignment) = self.assignment_mut(assignment_id) else {
            return 0;
        };
        let cleared = assignment.device_ids.len();
        assignment.device_ids.clear();
        if cleared > 0 {
            info!(
                "event=ledger_clear_all module=ledger status=ok assignment_id={} cleared={}",
                assignment_id, cleared
            );
        }
        cleared
    }

    /// Removes one assignment; its devices become unassigned.
    pub fn delete_category(&mut self, assignment_id: AssignmentId) -> Option<Assignment> {
        let index = self.index_of(assignment_id)?;
        let removed = self.assignments.remove(index);
        info!(
            "event=ledger_delete_category module=ledger status=ok assignment_id={} detached={}",
            assignment_id,
            removed.device_ids.len()
        );
        Some(removed)
    }

    /// Conflicts `device_ids` would raise if added to `assignment_id`.
    pub fn conflicts_for(
        &self,
        assignment_id: AssignmentId,
        device_ids: &[DeviceId],
    ) -> Vec<DeviceConflict> {
        let mut conflicts = Vec::new();
        for device_id in device_ids {
            let owner = self
                .assignments
                .iter()
                .filter(|assignment| assignment.id != assignment_id)
                .find(|assignment| assignment.contains(device_id));
            if let Some(owner) = owner {
                conflicts.push(DeviceConflict {
                    device_id: device_id.clone(),
                    assignment_id: owner.id,
                    institution: owner.institution.clone(),
                    institution_name: owner.institution_name.clone(),
                });
            }
        }
        conflicts
    }

    /// Re-checks ledger invariants, e.g. after loading a persisted snapshot.
    pub fn validate(&self) -> Result<(), Vec<LedgerViolation>> {
        let mut violations = Vec::new();

        let mut ids = BTreeSet::new();
        for assignment in &self.assignments {
            if !ids.insert(assignment.id) {
                violations.push(LedgerViolation::DuplicateAssignmentId(assignment.id));
            }
        }

        let mut owners: BTreeMap<&str, Vec<AssignmentId>> = BTreeMap::new();
        let mut institutions: BTreeMap<&InstitutionRef, Vec<AssignmentId>> = BTreeMap::new();
        for assignment in &self.assignments {
            for device_id in &assignment.device_ids {
                owners
                    .entry(device_id.as_str())
                    .or_default()
                    .push(assignment.id);
            }
            institutions
                .entry(&assignment.institution)
                .or_default()
                .push(assignment.id);
        }
        for (device_id, assignments) in owners {
            if assignments.len() > 1 {
                violations.push(LedgerViolation::OverlappingDevice {
                    device_id: device_id.to_string(),
                    assignments,
                });
            }
        }
        for (institution, assignments) in institutions {
            if assignments.len() > 1 {
                violations.push(LedgerViolation::DuplicateInstitution {
                    institution: institution.clone(),
                    assignments,
                });
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    fn index_of(&self, assignment_id: AssignmentId) -> Option<usize> {
        self.assignments
            .iter()
            .position(|assignment| assignment.id == assignment_id)
    }

    fn assignment_mut(&mut self, assignment_id: AssignmentId) -> Option<&mut Assignment> {
        self.assignments
            .iter_mut()
            .find(|assignment| assignment.id == assignment_id)
    }
}

impl<'a> IntoIterator for &'a AssignmentLedger {
    type Item = &'a Assignment;
    type IntoIter = std::slice::Iter<'a, Assignment>;

    fn into_iter(self) -> Self::IntoIter {
        self.assignments.iter()
    }
}

/// Current wall-clock time in epoch milliseconds.
pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}
