//! Device attribution use-case.
//!
//! # Responsibility
//! - Select the devices whose reported domain matches a customer profile.
//! - Group them by matched identity and label each group by hierarchy level.
//!
//! # Invariants
//! - A device is attributed iff the domain matcher accepts it.
//! - Groups are ordered by hierarchy level ascending, then size descending,
//!   then hierarchy pre-order.
//! - Devices keep registry order within a group.
//! - Read-only: neither the profile nor the device list is mutated.

use crate::matching::matcher::{DomainMatcher, MatchLevel};
use crate::model::customer::DomainProfile;
use crate::model::device::DeviceRecord;
use log::debug;
use serde::Serialize;
use std::collections::HashMap;

/// Devices sharing one matched domain identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceGroup {
    /// Normalized matched identity.
    pub domain: String,
    pub level: MatchLevel,
    /// Display label, e.g. `Root Domain` or `Level 2 Sub-domain`.
    pub label: String,
    pub devices: Vec<DeviceRecord>,
    #[serde(skip)]
    order: usize,
}

impl DeviceGroup {
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Dashboard header counts for one attribution run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributionSummary {
    pub matched: usize,
    pub unmatched: usize,
    pub groups: usize,
}

/// Attributes devices to one customer domain profile.
pub fn attribute(profile: &DomainProfile, devices: &[DeviceRecord]) -> Vec<DeviceGroup> {
    let matcher = DomainMatcher::from_profile(profile);
    let mut groups: Vec<DeviceGroup> = Vec::new();
    let mut index_by_identity: HashMap<String, usize> = HashMap::new();

    for device in devices {
        let Some(matched) = matcher.resolve(device.domain()) else {
            continue;
        };
        let index = *index_by_identity
            .entry(matched.identity.clone())
            .or_insert_with(|| {
                groups.push(DeviceGroup {
                    domain: matched.identity.clone(),
                    level: matched.level,
                    label: matched.level.to_string(),
                    devices: Vec::new(),
                    order: matched.order,
                });
                groups.len() - 1
            });
        groups[index].devices.push(device.clone());
    }

    groups.sort_by(|left, right| {
        left.level
            .rank()
            .cmp(&right.level.rank())
            .then_with(|| right.devices.len().cmp(&left.devices.len()))
            .then_with(|| left.order.cmp(&right.order))
    });

    debug!(
        "event=attribute module=attribution status=ok devices={} groups={}",
        devices.len(),
        groups.len()
    );
    groups
}

/// Devices the profile does not attribute, in registry order.
pub fn unattributed<'a>(profile: &DomainProfile, devices: &'a [DeviceRecord]) -> Vec<&'a DeviceRecord> {
    let matcher = DomainMatcher::from_profile(profile);
    devices
        .iter()
        .filter(|device| !matcher.matches(device.domain()))
        .collect()
}

/// Counts for an attribution result against the full device list.
pub fn summarize(groups: &[DeviceGroup], total_devices: usize) -> AttributionSummary {
    let matched = groups.iter().map(DeviceGroup::len).sum::<usize>();
    AttributionSummary {
        matched,
        unmatched: total_devices.saturating_sub(matched),
        groups: groups.len(),
    }
}
