//! Per-entity access layer over the shared store.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for users, categories
//!   and tasks.
//! - Isolate SQLite query details from service/scoping orchestration.
//! - Offer one-shot reads, mutations and live (push-based) reads.
//!
//! # Invariants
//! - Repository writes must enforce the record's `validate()` before SQL.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`,
//!   `InvalidReference`) in addition to storage errors.
//! - Every successful mutation commits in one transaction and yields one
//!   change notice.

use crate::db::DbError;
use crate::model::{EntityId, ValidationError};
use rusqlite::ffi;
use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod category_repo;
pub mod task_repo;
pub mod user_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    NotFound {
        entity: &'static str,
        id: EntityId,
    },
    /// Uniqueness violation, e.g. a duplicate email.
    Conflict(String),
    /// Foreign key points at a missing row.
    InvalidReference(String),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict(detail) => write!(f, "conflicting record: {detail}"),
            Self::InvalidReference(detail) => write!(f, "invalid reference: {detail}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound { .. } => None,
            Self::Conflict(_) => None,
            Self::InvalidReference(_) => None,
            Self::InvalidData(_) => None,
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
        if let rusqlite::Error::SqliteFailure(failure, message) = &value {
            if failure.code == ErrorCode::ConstraintViolation {
                let detail = message
                    .clone()
                    .unwrap_or_else(|| failure.to_string());
                match failure.extended_code {
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        return Self::Conflict(detail);
                    }
                    ffi::SQLITE_CONSTRAINT_FOREIGNKEY => return Self::InvalidReference(detail),
                    _ => {}
                }
            }
        }
        Self::Db(DbError::Sqlite(value))
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn int_to_bool(value: i64, column: &'static str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

/// `None` lets SQLite assign a fresh rowid.
fn id_param(id: EntityId) -> Option<EntityId> {
    (id != crate::model::UNASSIGNED_ID).then_some(id)
}

fn color_from_db(value: i64, column: &'static str) -> RepoResult<u32> {
    u32::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid color value `{value}` in {column}")))
}
