//! Profile-scoped use-case services.
//!
//! # Responsibility
//! - Resolve the current profile at call time and scope task/category
//!   access to it.
//! - Translate repository failures into caller-facing error kinds.
//! - Build derived live views (counts, joins, statistics).
//!
//! # Invariants
//! - Scoped reads with no current profile yield empty results.
//! - Scoped writes with no current profile fail with `NoActiveProfile`.
//! - Scoped live queries re-target when the current profile changes.

use crate::model::{EntityId, ValidationError};
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod category_service;
pub mod profile_service;
pub mod session;
pub mod stats_service;
pub mod task_service;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Id reported for an insert attempted while no profile is active.
pub const NO_ACTIVE_PROFILE_ID: EntityId = -1;

/// Coarse error category for callers that only branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    NoActiveProfile,
    Storage,
}

/// Errors returned by scoped services.
#[derive(Debug)]
pub enum ServiceError {
    /// Caller-supplied data failed a precondition.
    Validation(ValidationError),
    /// Target record does not exist or belongs to another profile.
    NotFound {
        entity: &'static str,
        id: EntityId,
    },
    /// Uniqueness violation.
    Conflict(String),
    /// Scoped write attempted with no current profile.
    NoActiveProfile,
    /// Underlying storage failure.
    Storage(RepoError),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::NoActiveProfile => ErrorKind::NoActiveProfile,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: EntityId) -> Self {
        Self::NotFound { entity, id }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict(detail) => write!(f, "{detail}"),
            Self::NoActiveProfile => write!(f, "no active profile"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::NotFound { .. } | Self::Conflict(_) | Self::NoActiveProfile => None,
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepoError::Conflict(detail) => Self::Conflict(detail),
            RepoError::InvalidReference(detail) => {
                Self::Validation(ValidationError::InvalidReference(detail))
            }
            other @ (RepoError::Db(_) | RepoError::InvalidData(_)) => Self::Storage(other),
        }
    }
}

/// Collapses an insert outcome into an id, using [`NO_ACTIVE_PROFILE_ID`]
/// when no profile was active.
///
/// Other errors are passed through.
pub fn insert_id_or_sentinel(result: ServiceResult<EntityId>) -> ServiceResult<EntityId> {
    match result {
        Err(ServiceError::NoActiveProfile) => Ok(NO_ACTIVE_PROFILE_ID),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::{insert_id_or_sentinel, ErrorKind, ServiceError, NO_ACTIVE_PROFILE_ID};
    use crate::model::ValidationError;
    use crate::repo::RepoError;

    #[test]
    fn sentinel_replaces_only_missing_profile() {
        assert_eq!(
            insert_id_or_sentinel(Err(ServiceError::NoActiveProfile)).unwrap(),
            NO_ACTIVE_PROFILE_ID
        );
        assert_eq!(insert_id_or_sentinel(Ok(7)).unwrap(), 7);
        let err = insert_id_or_sentinel(Err(ServiceError::Validation(
            ValidationError::BlankTitle,
        )))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn repo_errors_map_to_kinds() {
        let conflict: ServiceError = RepoError::Conflict("users.email".to_string()).into();
        assert_eq!(conflict.kind(), ErrorKind::Conflict);

        let missing: ServiceError = RepoError::NotFound {
            entity: "task",
            id: 3,
        }
        .into();
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        let dangling: ServiceError = RepoError::InvalidReference("fk".to_string()).into();
        assert_eq!(dangling.kind(), ErrorKind::Validation);

        let corrupt: ServiceError = RepoError::InvalidData("bad".to_string()).into();
        assert_eq!(corrupt.kind(), ErrorKind::Storage);
    }
}
