//! Device-to-customer domain identity matcher.
//!
//! # Responsibility
//! - Decide whether a device's reported domain belongs to a customer.
//! - Resolve the matched identity to its hierarchy level for grouping.
//!
//! # Invariants
//! - Matching is exact on normalized identities; no suffix matching.
//! - With `ignore_root_domain`, the root identity is never a candidate, even
//!   when a hierarchy node repeats it.
//! - When several nodes share one identity, the first in pre-order wins.

use crate::matching::normalize::normalize;
use crate::model::customer::DomainProfile;
use crate::model::domain_tree::DomainForest;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// Hierarchy level of a matched identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "level")]
pub enum MatchLevel {
    Root,
    /// One-based sub-domain level; root-level hierarchy nodes are level 1.
    SubDomain(usize),
    Unknown,
}

impl MatchLevel {
    /// Sort rank: root first, then sub-domain levels, unknown last.
    pub fn rank(self) -> usize {
        match self {
            Self::Root => 0,
            Self::SubDomain(level) => level,
            Self::Unknown => usize::MAX,
        }
    }
}

impl Display for MatchLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Root => write!(f, "Root Domain"),
            Self::SubDomain(level) => write!(f, "Level {level} Sub-domain"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Candidate identity a device domain resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedIdentity {
    pub identity: String,
    pub level: MatchLevel,
    /// Position in hierarchy order: root first, then nodes in pre-order.
    pub order: usize,
}

/// Matcher prepared once per domain profile.
#[derive(Debug, Clone, Default)]
pub struct DomainMatcher {
    candidates: HashMap<String, MatchedIdentity>,
}

impl DomainMatcher {
    pub fn new(
        root_domain: &str,
        ignore_root_domain: bool,
        hierarchy: &DomainForest,
    ) -> Self {
        let mut candidates = HashMap::new();
        let root_identity = normalize(root_domain);

        if !ignore_root_domain && !root_identity.is_empty() {
            candidates.insert(
                root_identity.clone(),
                MatchedIdentity {
                    identity: root_identity.clone(),
                    level: MatchLevel::Root,
                    order: 0,
                },
            );
        }

        for (index, entry) in hierarchy.enumerate().enumerate() {
            let identity = normalize(&entry.node.name);
            if identity.is_empty() {
                continue;
            }
            if ignore_root_domain && identity == root_identity {
                continue;
            }
            candidates
                .entry(identity.clone())
                .or_insert(MatchedIdentity {
                    identity,
                    level: MatchLevel::SubDomain(entry.depth + 1),
                    order: index + 1,
                });
        }

        Self { candidates }
    }

    pub fn from_profile(profile: &DomainProfile) -> Self {
        Self::new(
            &profile.root_domain,
            profile.ignore_root_domain,
            &profile.hierarchy,
        )
    }

    /// Resolves one raw device domain. Blank domains never resolve.
    pub fn resolve(&self, device_domain: &str) -> Option<&MatchedIdentity> {
        let identity = normalize(device_domain);
        if identity.is_empty() {
            return None;
        }
        self.candidates.get(&identity)
    }

    pub fn matches(&self, device_domain: &str) -> bool {
        self.resolve(device_domain).is_some()
    }

    /// Level for an identity, `Unknown` when it is not a candidate.
    pub fn level_of(&self, identity: &str) -> MatchLevel {
        self.candidates
            .get(identity)
            .map(|candidate| candidate.level)
            .unwrap_or(MatchLevel::Unknown)
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }
}

/// One-shot matcher over explicit inputs.
///
/// Mode A (`ignore_root == false`): the root domain or any hierarchy node.
/// Mode B (`ignore_root == true`): hierarchy nodes only; an empty hierarchy
/// matches nothing.
pub fn matches(
    device_domain: &str,
    root_domain: &str,
    ignore_root: bool,
    hierarchy: &DomainForest,
) -> bool {
    let device_identity = normalize(device_domain);
    if device_identity.is_empty() {
        return false;
    }

    let root_identity = normalize(root_domain);
    if !ignore_root && device_identity == root_identity {
        return true;
    }
    if ignore_root && device_identity == root_identity {
        return false;
    }

    hierarchy
        .enumerate()
        .any(|entry| normalize(&entry.node.name) == device_identity)
}
