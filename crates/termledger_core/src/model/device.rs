//! Payment terminal read model.
//!
//! Device records are owned by the external device registry; core code only
//! reads them.

use serde::{Deserialize, Serialize};

/// Registry-assigned device identifier.
pub type DeviceId = String;

/// One payment terminal as reported by the device registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub id: DeviceId,
    /// Domain the terminal reports itself under. May be blank.
    #[serde(default)]
    pub reported_domain: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl DeviceRecord {
    pub fn new(id: impl Into<DeviceId>, reported_domain: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reported_domain: Some(reported_domain.into()),
            serial_number: None,
            name: None,
            model: None,
        }
    }

    /// Raw reported domain, empty when absent.
    pub fn domain(&self) -> &str {
        self.reported_domain.as_deref().unwrap_or_default()
    }

    /// Human-facing identifier: serial number, then name, then id.
    pub fn display_identifier(&self) -> &str {
        [self.serial_number.as_deref(), self.name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|value| !value.is_empty())
            .unwrap_or(self.id.as_str())
    }
}
