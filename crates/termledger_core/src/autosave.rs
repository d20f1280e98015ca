//! Debounced profile persistence.
//!
//! # Responsibility
//! - Coalesce rapid profile mutations into one save after a quiet period.
//! - Prevent overlapping saves while one is in flight.
//!
//! # Invariants
//! - Every `mark_dirty` resets the deadline; a save fires once per quiet
//!   period, never while another save is in flight.
//! - A mutation recorded during a flight is deferred, not dropped.
//! - The saved snapshot is always the latest recorded one.
//! - A storage failure keeps the snapshot and re-arms; a snapshot the
//!   repository rejects is dropped and nothing is re-armed.
//! - Time is passed in by the caller; nothing here sleeps or polls a clock.

use crate::model::customer::CustomerProfile;
use crate::repo::profile_repo::{ProfileRepoResult, ProfileRepository};
use log::{debug, error, warn};
use std::time::{Duration, Instant};

/// Default quiet period before a pending save fires.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(1500);

/// Handle for one in-flight save.
#[derive(Debug, PartialEq, Eq)]
pub struct SaveTicket {
    id: u64,
}

/// Clock-driven debounce state machine.
#[derive(Debug, Clone)]
pub struct AutosaveScheduler {
    quiet_period: Duration,
    deadline: Option<Instant>,
    in_flight: Option<u64>,
    next_ticket: u64,
}

impl Default for AutosaveScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_PERIOD)
    }
}

impl AutosaveScheduler {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            deadline: None,
            in_flight: None,
            next_ticket: 0,
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Records a mutation at `now`, pushing the deadline out.
    pub fn mark_dirty(&mut self, now: Instant) {
        self.deadline = Some(now + self.quiet_period);
    }

    /// Whether a save is scheduled (possibly deferred behind a flight).
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fires a save when the quiet period has elapsed and nothing is in flight.
    pub fn poll(&mut self, now: Instant) -> Option<SaveTicket> {
        if self.in_flight.is_some() {
            return None;
        }
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                self.next_ticket += 1;
                self.in_flight = Some(self.next_ticket);
                Some(SaveTicket {
                    id: self.next_ticket,
                })
            }
            _ => None,
        }
    }

    /// Fires immediately regardless of the deadline, if anything is pending.
    pub fn force(&mut self) -> Option<SaveTicket> {
        let deadline = self.deadline?;
        self.poll(deadline)
    }

    /// Ends the flight started by `ticket`.
    ///
    /// When `succeeded` is false the save is re-armed from `now`.
    pub fn finish(&mut self, ticket: SaveTicket, succeeded: bool, now: Instant) {
        if self.in_flight != Some(ticket.id) {
            warn!(
                "event=autosave_finish module=autosave status=unknown_ticket ticket={}",
                ticket.id
            );
            return;
        }
        self.in_flight = None;
        if !succeeded && self.deadline.is_none() {
            self.mark_dirty(now);
        }
    }

    /// Drops any pending save. An in-flight save is unaffected.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

/// Pairs the scheduler with the latest snapshot and a repository.
pub struct ProfileAutosaver<R: ProfileRepository> {
    repo: R,
    scheduler: AutosaveScheduler,
    latest: Option<CustomerProfile>,
}

impl<R: ProfileRepository> ProfileAutosaver<R> {
    pub fn new(repo: R, quiet_period: Duration) -> Self {
        Self {
            repo,
            scheduler: AutosaveScheduler::new(quiet_period),
            latest: None,
        }
    }

    pub fn scheduler(&self) -> &AutosaveScheduler {
        &self.scheduler
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Records the newest snapshot and resets the debounce deadline.
    pub fn record(&mut self, profile: &CustomerProfile, now: Instant) {
        self.latest = Some(profile.clone());
        self.scheduler.mark_dirty(now);
    }

    /// Saves the latest snapshot if the quiet period has elapsed.
    ///
    /// Returns the saved revision, or `None` when nothing fired.
    pub fn tick(&mut self, now: Instant) -> ProfileRepoResult<Option<u64>> {
        match self.scheduler.poll(now) {
            Some(ticket) => self.run(ticket, now),
            None => Ok(None),
        }
    }

    /// Saves the latest snapshot now if one is pending.
    pub fn flush(&mut self, now: Instant) -> ProfileRepoResult<Option<u64>> {
        match self.scheduler.force() {
            Some(ticket) => self.run(ticket, now),
            None => Ok(None),
        }
    }

    fn run(&mut self, ticket: SaveTicket, now: Instant) -> ProfileRepoResult<Option<u64>> {
        let Some(snapshot) = self.latest.take() else {
            self.scheduler.finish(ticket, true, now);
            return Ok(None);
        };

        match self.repo.save_profile(&snapshot) {
            Ok(()) => {
                debug!(
                    "event=autosave module=autosave status=ok customer_id={} revision={}",
                    snapshot.id, snapshot.revision
                );
                self.scheduler.finish(ticket, true, now);
                Ok(Some(snapshot.revision))
            }
            Err(err) if err.is_retryable() => {
                warn!(
                    "event=autosave module=autosave status=retry customer_id={} error={}",
                    snapshot.id, err
                );
                self.latest.get_or_insert(snapshot);
                self.scheduler.finish(ticket, false, now);
                Err(err)
            }
            Err(err) => {
                error!(
                    "event=autosave module=autosave status=rejected customer_id={} revision={} error={}",
                    snapshot.id, snapshot.revision, err
                );
                // Ends the flight without re-arming.
                self.scheduler.finish(ticket, true, now);
                Err(err)
            }
        }
    }
}
