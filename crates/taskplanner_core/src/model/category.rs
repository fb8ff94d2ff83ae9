//! Category record.
//!
//! # Invariants
//! - `parent_category_id`, when set, references an existing category and is
//!   cleared (never cascaded) when that parent is deleted.
//! - Name uniqueness is a convention only; listings sort by name ignoring
//!   case.

use super::{now_epoch_ms, EntityId, ValidationError, UNASSIGNED_ID};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: EntityId,
    pub name: String,
    /// ARGB colour.
    pub color: u32,
    pub icon: String,
    pub user_id: EntityId,
    pub parent_category_id: Option<EntityId>,
    pub is_shared: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Category {
    /// Creates an unsaved root category. `user_id` is filled in by scoping.
    pub fn new(name: impl Into<String>, color: u32, icon: impl Into<String>) -> Self {
        let now = now_epoch_ms();
        Self {
            id: UNASSIGNED_ID,
            name: name.into(),
            color,
            icon: icon.into(),
            user_id: UNASSIGNED_ID,
            parent_category_id: None,
            is_shared: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::BlankName);
        }
        if self.icon.trim().is_empty() {
            return Err(ValidationError::BlankIcon);
        }
        if self.id != UNASSIGNED_ID && self.parent_category_id == Some(self.id) {
            return Err(ValidationError::SelfParent(self.id));
        }
        Ok(())
    }
}
