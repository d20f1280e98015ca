//! Manual device-to-institution assignment record.
//!
//! # Invariants
//! - `device_ids` is a set; order carries no meaning.
//! - Only the assignment ledger mutates `device_ids`.

use crate::model::device::DeviceId;
use crate::model::institution::InstitutionRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Stable assignment identifier.
pub type AssignmentId = Uuid;

/// Institution a new assignment category is created for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssignment {
    pub institution: InstitutionRef,
    pub institution_name: String,
    #[serde(default)]
    pub institution_code: Option<String>,
}

impl NewAssignment {
    pub fn new(institution: InstitutionRef, institution_name: impl Into<String>) -> Self {
        Self {
            institution,
            institution_name: institution_name.into(),
            institution_code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.institution_code = Some(code.into());
        self
    }
}

/// Exclusive ownership of a device set by one institution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: AssignmentId,
    pub institution: InstitutionRef,
    pub institution_name: String,
    #[serde(default)]
    pub institution_code: Option<String>,
    #[serde(default)]
    pub device_ids: BTreeSet<DeviceId>,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
}

impl Assignment {
    pub(crate) fn from_request(request: NewAssignment, created_at: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            institution: request.institution,
            institution_name: request.institution_name,
            institution_code: request.institution_code,
            device_ids: BTreeSet::new(),
            created_at,
        }
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.device_ids.contains(device_id)
    }

    pub fn is_empty(&self) -> bool {
        self.device_ids.is_empty()
    }
}
