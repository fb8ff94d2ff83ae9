//! Domain model for profiles, categories and tasks.
//!
//! # Responsibility
//! - Define the records persisted by the store and consumed by callers.
//! - Own field-level validation and the stored encodings of enums/lists.
//!
//! # Invariants
//! - Every record is identified by a store-generated `EntityId`; `0` means
//!   "not yet persisted".
//! - Timestamps are Unix epoch milliseconds.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod category;
pub mod task;
pub mod user;

/// Store-generated row identifier shared by all entity kinds.
pub type EntityId = i64;

/// Id value for records that have not been persisted yet.
pub const UNASSIGNED_ID: EntityId = 0;

/// Current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

/// Caller-supplied data that fails a precondition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    BlankName,
    BlankEmail,
    MalformedEmail,
    BlankTitle,
    BlankIcon,
    /// A category cannot be its own parent.
    SelfParent(EntityId),
    /// Referenced category does not exist for the active profile.
    UnknownCategory(EntityId),
    /// Re-parenting would make a category its own ancestor.
    ParentCycle {
        category_id: EntityId,
        parent_id: EntityId,
    },
    /// Storage rejected a reference to a missing record.
    InvalidReference(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "name is required"),
            Self::BlankEmail => write!(f, "email is required"),
            Self::MalformedEmail => write!(f, "invalid email address"),
            Self::BlankTitle => write!(f, "title cannot be empty"),
            Self::BlankIcon => write!(f, "icon is required"),
            Self::SelfParent(id) => write!(f, "category {id} cannot be its own parent"),
            Self::UnknownCategory(id) => write!(f, "category not found: {id}"),
            Self::ParentCycle {
                category_id,
                parent_id,
            } => write!(
                f,
                "moving category {category_id} under {parent_id} would create a cycle"
            ),
            Self::InvalidReference(detail) => {
                write!(f, "referenced record does not exist: {detail}")
            }
        }
    }
}

impl Error for ValidationError {}
