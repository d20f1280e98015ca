//! Core runtime configuration.
//!
//! # Responsibility
//! - Resolve logging and autosave settings from the environment or from a
//!   host-provided JSON document.
//!
//! # Invariants
//! - Every field has a default; a missing variable never fails loading.
//! - Present-but-invalid values are rejected, never silently replaced.

use crate::autosave::DEFAULT_QUIET_PERIOD;
use crate::logging::{default_log_level, normalize_level};
use crate::service::auto_match::DEFAULT_HELD_SAMPLE_LIMIT;
use serde::Deserialize;
use std::env;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub const ENV_LOG_LEVEL: &str = "TERMLEDGER_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "TERMLEDGER_LOG_DIR";
pub const ENV_AUTOSAVE_QUIET_MS: &str = "TERMLEDGER_AUTOSAVE_QUIET_MS";
pub const ENV_HELD_SAMPLE_LIMIT: &str = "TERMLEDGER_HELD_SAMPLE_LIMIT";

/// Resolved core configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CoreConfig {
    pub log_level: String,
    /// Absolute directory for rolling log files; logging stays off when unset.
    pub log_dir: Option<String>,
    pub autosave_quiet_period_ms: u64,
    pub held_sample_limit: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            log_dir: None,
            autosave_quiet_period_ms: DEFAULT_QUIET_PERIOD.as_millis() as u64,
            held_sample_limit: DEFAULT_HELD_SAMPLE_LIMIT,
        }
    }
}

impl CoreConfig {
    /// Reads and validates `TERMLEDGER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Parses a JSON settings document; absent fields take defaults.
    pub fn from_json_str(value: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(value).map_err(ConfigError::Json)?;
        config.validated()
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        if let Some(dir) = lookup(ENV_LOG_DIR) {
            let trimmed = dir.trim();
            config.log_dir = (!trimmed.is_empty()).then(|| trimmed.to_string());
        }
        if let Some(raw) = lookup(ENV_AUTOSAVE_QUIET_MS) {
            config.autosave_quiet_period_ms = parse_number(ENV_AUTOSAVE_QUIET_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_HELD_SAMPLE_LIMIT) {
            config.held_sample_limit = parse_number(ENV_HELD_SAMPLE_LIMIT, &raw)?;
        }

        config.validated()
    }

    fn validated(mut self) -> Result<Self, ConfigError> {
        self.log_level = normalize_level(&self.log_level)
            .map_err(|err| ConfigError::InvalidLogLevel(err.to_string()))?
            .to_string();
        if self.autosave_quiet_period_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: ENV_AUTOSAVE_QUIET_MS,
                value: "0".to_string(),
            });
        }
        Ok(self)
    }

    pub fn autosave_quiet_period(&self) -> Duration {
        Duration::from_millis(self.autosave_quiet_period_ms)
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidLogLevel(String),
    InvalidValue { key: &'static str, value: String },
    Json(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLogLevel(message) => write!(f, "{message}"),
            Self::InvalidValue { key, value } => {
                write!(f, "{key} has an invalid value (got `{value}`)")
            }
            Self::Json(err) => write!(f, "invalid configuration document: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ConfigError, CoreConfig, ENV_AUTOSAVE_QUIET_MS, ENV_HELD_SAMPLE_LIMIT, ENV_LOG_DIR,
        ENV_LOG_LEVEL,
    };
    use std::collections::HashMap;
    use std::time::Duration;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = CoreConfig::from_lookup(lookup(&[])).expect("defaults load");
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.autosave_quiet_period(), Duration::from_millis(1500));
        assert_eq!(config.held_sample_limit, 3);
        assert_eq!(config.log_dir, None);
    }

    #[test]
    fn reads_and_normalizes_overrides() {
        let config = CoreConfig::from_lookup(lookup(&[
            (ENV_LOG_LEVEL, " WARNING "),
            (ENV_LOG_DIR, " /var/log/termledger "),
            (ENV_AUTOSAVE_QUIET_MS, "250"),
            (ENV_HELD_SAMPLE_LIMIT, "5"),
        ]))
        .expect("overrides load");
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir.as_deref(), Some("/var/log/termledger"));
        assert_eq!(config.autosave_quiet_period_ms, 250);
        assert_eq!(config.held_sample_limit, 5);
    }

    #[test]
    fn rejects_invalid_values() {
        let err = CoreConfig::from_lookup(lookup(&[(ENV_AUTOSAVE_QUIET_MS, "soon")]))
            .expect_err("non-numeric quiet period must fail");
        assert!(matches!(
            err,
            ConfigError::InvalidValue { key, .. } if key == ENV_AUTOSAVE_QUIET_MS
        ));

        let err = CoreConfig::from_lookup(lookup(&[(ENV_LOG_LEVEL, "loud")]))
            .expect_err("unknown level must fail");
        assert!(matches!(err, ConfigError::InvalidLogLevel(_)));

        let err = CoreConfig::from_lookup(lookup(&[(ENV_AUTOSAVE_QUIET_MS, "0")]))
            .expect_err("zero quiet period must fail");
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn json_document_fills_missing_fields_with_defaults() {
        let config = CoreConfig::from_json_str(r#"{"heldSampleLimit": 1}"#).expect("json loads");
        assert_eq!(config.held_sample_limit, 1);
        assert_eq!(config.autosave_quiet_period_ms, 1500);

        assert!(matches!(
            CoreConfig::from_json_str("{").unwrap_err(),
            ConfigError::Json(_)
        ));
    }
}
