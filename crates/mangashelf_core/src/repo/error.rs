//! Error type shared by every repository in this crate.

use crate::db::DbError;
use crate::model::validation::ValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for library persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Entity rejected before reaching SQL.
    Validation(ValidationError),
    /// Underlying SQLite/bootstrap failure.
    Db(DbError),
    /// Lookup by id found nothing where an existing row is required.
    NotFound { entity: &'static str, id: Uuid },
    /// A must-be-unique read matched `matched` rows.
    Cardinality {
        entity: &'static str,
        key: String,
        matched: usize,
    },
    /// A staged update/delete no longer matches a stored row.
    ConcurrencyConflict { entity: &'static str, id: Uuid },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Persisted data cannot be converted to a valid entity.
    InvalidData(String),
    /// Background task running the blocking SQLite work failed.
    Join(String),
    /// A previous panic left the shared connection or change set poisoned.
    LockPoisoned,
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Cardinality {
                entity,
                key,
                matched,
            } => write!(
                f,
                "expected exactly one {entity} for {key}, found {matched}"
            ),
            Self::ConcurrencyConflict { entity, id } => write!(
                f,
                "{entity} {id} was changed or removed since it was loaded"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "library repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted library data: {message}"),
            Self::Join(message) => write!(f, "repository task failed: {message}"),
            Self::LockPoisoned => write!(f, "repository state lock poisoned"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
