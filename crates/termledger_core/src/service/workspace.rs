//! Customer workspace use-case facade.
//!
//! # Responsibility
//! - Apply user actions to one customer snapshot: domain settings,
//!   hierarchy edits, ledger mutations, manual links and auto-matching.
//! - Re-run reconciliation after every change that can affect links.
//! - Hand every changed snapshot to the debounced autosaver.
//!
//! # Invariants
//! - `linked_institution_ids` always equals `recompute(...)` of the current
//!   snapshot and registry.
//! - `revision` increases by one per applied change; no-ops leave it alone.
//! - A rejected mutation leaves the snapshot untouched and schedules nothing.
//! - Autosave deadlines, `tick` and `flush` all read the workspace clock.

use crate::autosave::ProfileAutosaver;
use crate::config::CoreConfig;
use crate::ledger::{AddDevicesReport, CreateOutcome, LedgerError};
use crate::model::assignment::{AssignmentId, NewAssignment};
use crate::model::customer::CustomerProfile;
use crate::model::device::{DeviceId, DeviceRecord};
use crate::model::domain_tree::{DomainNode, HierarchyError, NodePath};
use crate::model::institution::InstitutionRegistry;
use crate::repo::profile_repo::{ProfileRepoError, ProfileRepository};
use crate::service::attribution::{attribute, DeviceGroup};
use crate::service::auto_match::{auto_match_with_limit, AutoMatchReport, DomainPatternCatalog};
use crate::service::reconcile::{reconcile_report, recompute, LinkedInstitutions};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Errors from workspace operations.
#[derive(Debug)]
pub enum WorkspaceError {
    Ledger(LedgerError),
    Hierarchy(HierarchyError),
    /// Manual institution id is blank after trim.
    BlankInstitutionId,
    Repo(ProfileRepoError),
}

impl Display for WorkspaceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ledger(err) => write!(f, "{err}"),
            Self::Hierarchy(err) => write!(f, "{err}"),
            Self::BlankInstitutionId => write!(f, "institution id must not be blank"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for WorkspaceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Ledger(err) => Some(err),
            Self::Hierarchy(err) => Some(err),
            Self::BlankInstitutionId => None,
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<LedgerError> for WorkspaceError {
    fn from(value: LedgerError) -> Self {
        Self::Ledger(value)
    }
}

impl From<HierarchyError> for WorkspaceError {
    fn from(value: HierarchyError) -> Self {
        Self::Hierarchy(value)
    }
}

impl From<ProfileRepoError> for WorkspaceError {
    fn from(value: ProfileRepoError) -> Self {
        Self::Repo(value)
    }
}

/// Time source for autosave deadlines.
pub type Clock = Box<dyn Fn() -> Instant>;

/// One customer's editable snapshot plus its collaborators.
pub struct CustomerWorkspace<R: ProfileRepository> {
    profile: CustomerProfile,
    registry: InstitutionRegistry,
    autosaver: ProfileAutosaver<R>,
    held_sample_limit: usize,
    clock: Clock,
}

impl<R: ProfileRepository> CustomerWorkspace<R> {
    /// Opens a workspace; the linked set is reconciled immediately.
    pub fn new(
        profile: CustomerProfile,
        registry: InstitutionRegistry,
        repo: R,
        config: &CoreConfig,
    ) -> Self {
        let mut workspace = Self {
            profile,
            registry,
            autosaver: ProfileAutosaver::new(repo, config.autosave_quiet_period()),
            held_sample_limit: config.held_sample_limit,
            clock: Box::new(Instant::now),
        };
        workspace.relink();
        workspace
    }

    /// Replaces the real clock, e.g. with a simulated one.
    ///
    /// Changes recorded afterwards are stamped with this clock, so hosts
    /// that drive `tick` from it see deadlines on the same timeline.
    pub fn with_clock(mut self, clock: impl Fn() -> Instant + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn profile(&self) -> &CustomerProfile {
        &self.profile
    }

    pub fn registry(&self) -> &InstitutionRegistry {
        &self.registry
    }

    pub fn autosaver(&self) -> &ProfileAutosaver<R> {
        &self.autosaver
    }

    /// Consumes the workspace, returning the latest snapshot.
    pub fn into_profile(self) -> CustomerProfile {
        self.profile
    }

    /// Device groups attributed to this customer.
    pub fn attribute(&self, devices: &[DeviceRecord]) -> Vec<DeviceGroup> {
        attribute(&self.profile.domain, devices)
    }

    /// Per-source breakdown of the linked institution set.
    pub fn linked_institutions(&self) -> LinkedInstitutions {
        reconcile_report(&self.profile, &self.profile.assignments, &self.registry)
    }

    pub fn rename_customer(&mut self, name: impl Into<String>) {
        let name = name.into().trim().to_string();
        if name == self.profile.name {
            return;
        }
        self.profile.name = name;
        self.commit();
    }

    pub fn set_root_domain(&mut self, root_domain: impl Into<String>) {
        let root_domain = root_domain.into().trim().to_string();
        if root_domain == self.profile.domain.root_domain {
            return;
        }
        self.profile.domain.root_domain = root_domain;
        self.commit();
    }

    pub fn set_ignore_root_domain(&mut self, ignore: bool, note: Option<String>) {
        let before = self.profile.domain.clone();
        self.profile.domain.set_ignore_root_domain(ignore, note);
        if self.profile.domain != before {
            self.commit();
        }
    }

    pub fn add_root_node(&mut self, name: impl Into<String>) -> NodePath {
        let path = self.profile.domain.hierarchy.add_root(name);
        self.commit();
        path
    }

    pub fn add_child_node(&mut self, path: &[usize]) -> Result<Option<NodePath>, WorkspaceError> {
        let created = self.profile.domain.hierarchy.add_child(path)?;
        if created.is_some() {
            self.commit();
        }
        Ok(created)
    }

    pub fn add_sibling_node(&mut self, path: &[usize]) -> Result<Option<NodePath>, WorkspaceError> {
        let created = self.profile.domain.hierarchy.add_sibling(path)?;
        if created.is_some() {
            self.commit();
        }
        Ok(created)
    }

    pub fn rename_node(
        &mut self,
        path: &[usize],
        name: impl Into<String>,
    ) -> Result<bool, WorkspaceError> {
        let renamed = self.profile.domain.hierarchy.rename(path, name)?;
        if renamed {
            self.commit();
        }
        Ok(renamed)
    }

    pub fn delete_node(&mut self, path: &[usize]) -> Result<Option<DomainNode>, WorkspaceError> {
        let removed = self.profile.domain.hierarchy.delete(path)?;
        if removed.is_some() {
            self.commit();
        }
        Ok(removed)
    }

    pub fn create_category(&mut self, request: NewAssignment) -> CreateOutcome {
        let outcome = self.profile.assignments.create_category(request);
        if outcome.is_created() {
            self.commit();
        }
        outcome
    }

    pub fn add_devices<I, S>(
        &mut self,
        assignment_id: AssignmentId,
        device_ids: I,
    ) -> Result<AddDevicesReport, WorkspaceError>
    where
        I: IntoIterator<Item = S>,
        S: Into<DeviceId>,
    {
        let report = self
            .profile
            .assignments
            .add_devices(assignment_id, device_ids)?;
        if !report.added.is_empty() {
            self.commit();
        }
        Ok(report)
    }

    pub fn remove_device(&mut self, assignment_id: AssignmentId, device_id: &str) -> bool {
        let removed = self
            .profile
            .assignments
            .remove_device(assignment_id, device_id);
        if removed {
            self.commit();
        }
        removed
    }

    pub fn clear_all(&mut self, assignment_id: AssignmentId) -> usize {
        let cleared = self.profile.assignments.clear_all(assignment_id);
        if cleared > 0 {
            self.commit();
        }
        cleared
    }

    pub fn delete_category(&mut self, assignment_id: AssignmentId) -> bool {
        let deleted = self
            .profile
            .assignments
            .delete_category(assignment_id)
            .is_some();
        if deleted {
            self.commit();
        }
        deleted
    }

    pub fn run_auto_match(
        &mut self,
        devices: &[DeviceRecord],
        catalog: &DomainPatternCatalog,
    ) -> Result<AutoMatchReport, WorkspaceError> {
        let report = auto_match_with_limit(
            &mut self.profile.assignments,
            devices,
            catalog,
            self.held_sample_limit,
        )?;
        if report.newly_assigned > 0 || report.target_created {
            self.commit();
        }
        Ok(report)
    }

    /// Adds a manually linked institution id. Returns whether it was new.
    pub fn add_manual_institution(&mut self, institution_id: &str) -> Result<bool, WorkspaceError> {
        let id = institution_id.trim();
        if id.is_empty() {
            return Err(WorkspaceError::BlankInstitutionId);
        }
        let inserted = self.profile.manual_institution_ids.insert(id.to_string());
        if inserted {
            self.commit();
        }
        Ok(inserted)
    }

    /// Removes a manual link. Derived links for the same id are unaffected.
    pub fn remove_manual_institution(&mut self, institution_id: &str) -> bool {
        let removed = self
            .profile
            .manual_institution_ids
            .remove(institution_id.trim());
        if removed {
            self.commit();
        }
        removed
    }

    /// Swaps in a refreshed registry and re-reconciles.
    pub fn replace_registry(&mut self, registry: InstitutionRegistry) {
        if registry == self.registry {
            return;
        }
        self.registry = registry;
        if self.relink() {
            self.commit_without_relink();
        }
    }

    /// Saves the latest snapshot when the autosave quiet period has elapsed.
    pub fn tick(&mut self) -> Result<Option<u64>, WorkspaceError> {
        let now = (self.clock)();
        Ok(self.autosaver.tick(now)?)
    }

    /// Saves the latest snapshot immediately if a save is pending.
    pub fn flush(&mut self) -> Result<Option<u64>, WorkspaceError> {
        let now = (self.clock)();
        Ok(self.autosaver.flush(now)?)
    }

    fn commit(&mut self) {
        self.relink();
        self.commit_without_relink();
    }

    fn commit_without_relink(&mut self) {
        self.profile.revision += 1;
        let now = (self.clock)();
        self.autosaver.record(&self.profile, now);
    }

    /// Recomputes the linked set. Returns whether it changed.
    fn relink(&mut self) -> bool {
        let linked = recompute(&self.profile, &self.profile.assignments, &self.registry);
        if linked == self.profile.linked_institution_ids {
            return false;
        }
        self.profile.linked_institution_ids = linked;
        true
    }
}
