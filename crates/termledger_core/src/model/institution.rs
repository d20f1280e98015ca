//! Institution references and the three-catalog institution registry.
//!
//! # Responsibility
//! - Tag raw institution ids with their catalog kind.
//! - Model registry records and their back-reference lists.
//!
//! # Invariants
//! - A tagged reference always has a non-blank raw id.
//! - Text form is `<kind>:<raw id>` with kind in `bank|epk|ok`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Registry catalog an institution belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum InstitutionKind {
    /// Licensed bank.
    #[serde(rename = "bank")]
    Bank,
    /// Electronic money institution (EPK).
    #[serde(rename = "epk")]
    ElectronicMoney,
    /// Payment institution (OK).
    #[serde(rename = "ok")]
    Payment,
}

impl InstitutionKind {
    pub const ALL: [InstitutionKind; 3] = [Self::Bank, Self::ElectronicMoney, Self::Payment];

    /// Stable tag used in text-form references.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bank => "bank",
            Self::ElectronicMoney => "epk",
            Self::Payment => "ok",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "bank" => Some(Self::Bank),
            "epk" => Some(Self::ElectronicMoney),
            "ok" => Some(Self::Payment),
            _ => None,
        }
    }
}

/// Malformed institution reference input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstitutionRefError {
    /// Raw id is blank after trim.
    BlankId,
    /// Text form is missing the `<kind>:` tag.
    MissingKind(String),
    /// Tag does not name a known catalog.
    UnknownKind(String),
}

impl Display for InstitutionRefError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankId => write!(f, "institution id must not be blank"),
            Self::MissingKind(value) => {
                write!(f, "institution reference is missing a kind tag: `{value}`")
            }
            Self::UnknownKind(value) => write!(f, "unknown institution kind: `{value}`"),
        }
    }
}

impl Error for InstitutionRefError {}

/// Kind-tagged raw institution id that an assignment points at.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawInstitutionRef")]
pub struct InstitutionRef {
    pub kind: InstitutionKind,
    pub id: String,
}

/// Unchecked wire shape; decoding goes through `InstitutionRef::new`.
#[derive(Deserialize)]
struct RawInstitutionRef {
    kind: InstitutionKind,
    id: String,
}

impl TryFrom<RawInstitutionRef> for InstitutionRef {
    type Error = InstitutionRefError;

    fn try_from(raw: RawInstitutionRef) -> Result<Self, Self::Error> {
        Self::new(raw.kind, raw.id)
    }
}

impl InstitutionRef {
    pub fn new(kind: InstitutionKind, id: impl Into<String>) -> Result<Self, InstitutionRefError> {
        let id = id.into().trim().to_string();
        if id.is_empty() {
            return Err(InstitutionRefError::BlankId);
        }
        Ok(Self { kind, id })
    }

    pub fn bank(id: impl Into<String>) -> Result<Self, InstitutionRefError> {
        Self::new(InstitutionKind::Bank, id)
    }

    pub fn epk(id: impl Into<String>) -> Result<Self, InstitutionRefError> {
        Self::new(InstitutionKind::ElectronicMoney, id)
    }

    pub fn ok(id: impl Into<String>) -> Result<Self, InstitutionRefError> {
        Self::new(InstitutionKind::Payment, id)
    }
}

impl Display for InstitutionRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

impl FromStr for InstitutionRef {
    type Err = InstitutionRefError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let (kind, id) = trimmed
            .split_once(':')
            .ok_or_else(|| InstitutionRefError::MissingKind(trimmed.to_string()))?;
        let kind = InstitutionKind::parse(kind.trim().to_ascii_lowercase().as_str())
            .ok_or_else(|| InstitutionRefError::UnknownKind(kind.to_string()))?;
        Self::new(kind, id)
    }
}

/// One institution in a registry catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryRecord {
    /// Registry-owned id; this is what the linked-institution set holds.
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    /// Raw institution ids that resolve to this record.
    #[serde(default)]
    pub linked_source_ids: Vec<String>,
}

impl RegistryRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            code: None,
            linked_source_ids: Vec::new(),
        }
    }

    pub fn with_linked_source(mut self, raw_id: impl Into<String>) -> Self {
        self.linked_source_ids.push(raw_id.into());
        self
    }

    /// Whether this record's back-reference list contains `raw_id`.
    pub fn references(&self, raw_id: &str) -> bool {
        let needle = raw_id.trim();
        self.linked_source_ids
            .iter()
            .any(|candidate| candidate.trim() == needle)
    }
}

/// Three parallel institution catalogs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionRegistry {
    #[serde(default)]
    pub banks: Vec<RegistryRecord>,
    #[serde(default)]
    pub epk: Vec<RegistryRecord>,
    #[serde(default)]
    pub ok: Vec<RegistryRecord>,
}

impl InstitutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog for one kind.
    pub fn catalog(&self, kind: InstitutionKind) -> &[RegistryRecord] {
        match kind {
            InstitutionKind::Bank => &self.banks,
            InstitutionKind::ElectronicMoney => &self.epk,
            InstitutionKind::Payment => &self.ok,
        }
    }

    /// All records across catalogs in `bank, epk, ok` order.
    pub fn all_records(&self) -> impl Iterator<Item = (InstitutionKind, &RegistryRecord)> {
        InstitutionKind::ALL
            .into_iter()
            .flat_map(move |kind| self.catalog(kind).iter().map(move |record| (kind, record)))
    }

    /// Resolves a tagged reference through its catalog's back-references.
    pub fn resolve(&self, reference: &InstitutionRef) -> Option<&RegistryRecord> {
        self.catalog(reference.kind)
            .iter()
            .find(|record| record.references(&reference.id))
    }
}
