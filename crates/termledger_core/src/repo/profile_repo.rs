//! Customer profile repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist whole customer profile snapshots and the institution registry
//!   snapshot.
//! - Keep SQL and JSON encoding details inside the repository boundary.
//!
//! # Invariants
//! - Saving never accepts a snapshot whose assignment ledger or domain
//!   hierarchy is invalid.
//! - Loading rejects persisted snapshots that break ledger or hierarchy
//!   invariants instead of masking them.
//! - A save with an older revision than the stored one is rejected.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::ledger::LedgerViolation;
use crate::model::domain_tree::HierarchyError;
use crate::model::customer::{CustomerId, CustomerProfile};
use crate::model::institution::InstitutionRegistry;
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type ProfileRepoResult<T> = Result<T, ProfileRepoError>;

/// Errors from profile persistence.
#[derive(Debug)]
pub enum ProfileRepoError {
    Db(DbError),
    Encoding(serde_json::Error),
    /// Snapshot breaks assignment ledger invariants.
    InvalidLedger {
        customer_id: CustomerId,
        violations: Vec<LedgerViolation>,
    },
    /// Snapshot hierarchy has duplicate node ids.
    InvalidHierarchy {
        customer_id: CustomerId,
        error: HierarchyError,
    },
    /// Stored revision is newer than the snapshot being saved.
    StaleRevision {
        customer_id: CustomerId,
        stored: u64,
        attempted: u64,
    },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    InvalidData(String),
}

impl Display for ProfileRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Encoding(err) => write!(f, "profile payload encoding failed: {err}"),
            Self::InvalidLedger {
                customer_id,
                violations,
            } => {
                write!(f, "invalid assignment ledger for customer {customer_id}:")?;
                for violation in violations {
                    write!(f, " {violation};")?;
                }
                Ok(())
            }
            Self::InvalidHierarchy { customer_id, error } => {
                write!(f, "invalid domain hierarchy for customer {customer_id}: {error}")
            }
            Self::StaleRevision {
                customer_id,
                stored,
                attempted,
            } => write!(
                f,
                "stale profile revision for customer {customer_id}: stored {stored}, attempted {attempted}"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "profile repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted profile data: {message}"),
        }
    }
}

impl Error for ProfileRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Encoding(err) => Some(err),
            Self::InvalidHierarchy { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl ProfileRepoError {
    /// Whether the same save can succeed later without a new snapshot.
    ///
    /// Only storage failures qualify; a rejected snapshot stays rejected.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Db(_))
    }
}

impl From<DbError> for ProfileRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for ProfileRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for ProfileRepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encoding(value)
    }
}

/// Repository interface for customer profile snapshots.
pub trait ProfileRepository {
    /// Inserts or replaces one snapshot.
    fn save_profile(&self, profile: &CustomerProfile) -> ProfileRepoResult<()>;
    /// Loads one snapshot by customer id.
    fn load_profile(&self, customer_id: CustomerId) -> ProfileRepoResult<Option<CustomerProfile>>;
    /// Lists stored customer ids ordered by display name.
    fn list_profile_ids(&self) -> ProfileRepoResult<Vec<CustomerId>>;
    /// Deletes one snapshot. Returns whether a row was removed.
    fn delete_profile(&self, customer_id: CustomerId) -> ProfileRepoResult<bool>;
}

/// Repository interface for the cached institution registry.
pub trait RegistrySnapshotRepository {
    fn save_registry(&self, registry: &InstitutionRegistry) -> ProfileRepoResult<()>;
    /// Returns an empty registry when nothing was stored yet.
    fn load_registry(&self) -> ProfileRepoResult<InstitutionRegistry>;
}

/// SQLite-backed profile repository.
pub struct SqliteProfileRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProfileRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> ProfileRepoResult<Self> {
        let expected_version = latest_version();
        let actual_version: u32 =
            conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if actual_version != expected_version {
            return Err(ProfileRepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }
}

impl ProfileRepository for SqliteProfileRepository<'_> {
    fn save_profile(&self, profile: &CustomerProfile) -> ProfileRepoResult<()> {
        ensure_valid_profile(profile)?;

        let stored: Option<i64> = self
            .conn
            .query_row(
                "SELECT revision FROM customer_profiles WHERE customer_id = ?1;",
                [profile.id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(stored) = stored {
            let stored = stored.max(0) as u64;
            if stored > profile.revision {
                warn!(
                    "event=profile_save module=repo status=stale customer_id={} stored={} attempted={}",
                    profile.id, stored, profile.revision
                );
                return Err(ProfileRepoError::StaleRevision {
                    customer_id: profile.id,
                    stored,
                    attempted: profile.revision,
                });
            }
        }

        let payload = serde_json::to_string(profile)?;
        self.conn.execute(
            "INSERT INTO customer_profiles (customer_id, display_name, payload, revision)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(customer_id) DO UPDATE SET
                display_name = excluded.display_name,
                payload = excluded.payload,
                revision = excluded.revision,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                profile.id.to_string(),
                profile.name.as_str(),
                payload,
                profile.revision as i64,
            ],
        )?;

        info!(
            "event=profile_save module=repo status=ok customer_id={} revision={} assignments={}",
            profile.id,
            profile.revision,
            profile.assignments.len()
        );
        Ok(())
    }

    fn load_profile(&self, customer_id: CustomerId) -> ProfileRepoResult<Option<CustomerProfile>> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM customer_profiles WHERE customer_id = ?1;",
                [customer_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(payload) = payload else {
            return Ok(None);
        };

        let profile: CustomerProfile = serde_json::from_str(&payload)?;
        if profile.id != customer_id {
            return Err(ProfileRepoError::InvalidData(format!(
                "payload id {} does not match row id {customer_id}",
                profile.id
            )));
        }
        ensure_valid_profile(&profile)?;
        Ok(Some(profile))
    }

    fn list_profile_ids(&self) -> ProfileRepoResult<Vec<CustomerId>> {
        let mut stmt = self.conn.prepare(
            "SELECT customer_id
             FROM customer_profiles
             ORDER BY display_name COLLATE NOCASE ASC, customer_id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value)?);
        }
        Ok(ids)
    }

    fn delete_profile(&self, customer_id: CustomerId) -> ProfileRepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM customer_profiles WHERE customer_id = ?1;",
            [customer_id.to_string()],
        )?;
        Ok(changed > 0)
    }
}

impl RegistrySnapshotRepository for SqliteProfileRepository<'_> {
    fn save_registry(&self, registry: &InstitutionRegistry) -> ProfileRepoResult<()> {
        let payload = serde_json::to_string(registry)?;
        self.conn.execute(
            "INSERT INTO institution_registry_snapshots (snapshot_id, payload)
             VALUES (1, ?1)
             ON CONFLICT(snapshot_id) DO UPDATE SET
                payload = excluded.payload,
                updated_at = (strftime('%s', 'now') * 1000);",
            [payload],
        )?;
        Ok(())
    }

    fn load_registry(&self) -> ProfileRepoResult<InstitutionRegistry> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM institution_registry_snapshots WHERE snapshot_id = 1;",
                [],
                |row| row.get(0),
            )
            .optional()?;
        match payload {
            Some(payload) => Ok(serde_json::from_str(&payload)?),
            None => Ok(InstitutionRegistry::default()),
        }
    }
}

fn ensure_valid_profile(profile: &CustomerProfile) -> ProfileRepoResult<()> {
    profile
        .assignments
        .validate()
        .map_err(|violations| ProfileRepoError::InvalidLedger {
            customer_id: profile.id,
            violations,
        })?;
    profile
        .domain
        .hierarchy
        .validate()
        .map_err(|error| ProfileRepoError::InvalidHierarchy {
            customer_id: profile.id,
            error,
        })
}

fn parse_uuid(value: &str) -> ProfileRepoResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| {
        ProfileRepoError::InvalidData(format!(
            "invalid uuid `{value}` in customer_profiles.customer_id"
        ))
    })
}
