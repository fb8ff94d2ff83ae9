//! Task record and its stored encodings.
//!
//! # Invariants
//! - `category_id`, when set, references an existing category and is
//!   cleared (never cascaded) when that category is deleted.
//! - `order` need not be unique or contiguous; it defines the default
//!   display sequence ascending.
//! - Enums persist as their symbolic name; unknown stored names decode to
//!   the documented default instead of failing.

use super::{now_epoch_ms, EntityId, ValidationError, UNASSIGNED_ID};
use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }

    /// Decodes a stored name; unknown values fall back to `Medium`.
    pub fn from_db_str(value: &str) -> Self {
        match value {
            "LOW" => Self::Low,
            "MEDIUM" => Self::Medium,
            "HIGH" => Self::High,
            _ => Self::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Todo => "TODO",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
        }
    }

    /// Decodes a stored name; unknown values fall back to `Todo`.
    pub fn from_db_str(value: &str) -> Self {
        match value {
            "TODO" => Self::Todo,
            "IN_PROGRESS" => Self::InProgress,
            "COMPLETED" => Self::Completed,
            _ => Self::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: EntityId,
    pub title: String,
    pub description: String,
    /// Epoch milliseconds.
    pub due_date: Option<i64>,
    pub priority: Priority,
    pub status: TaskStatus,
    pub category_id: Option<EntityId>,
    pub user_id: EntityId,
    /// Manual sort position.
    pub order: i64,
    /// Free-form labels, persisted as a JSON array.
    pub tags: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    /// Creates an unsaved task with default priority and status.
    pub fn new(title: impl Into<String>) -> Self {
        let now = now_epoch_ms();
        Self {
            id: UNASSIGNED_ID,
            title: title.into(),
            description: String::new(),
            due_date: None,
            priority: Priority::default(),
            status: TaskStatus::default(),
            category_id: None,
            user_id: UNASSIGNED_ID,
            order: 0,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::BlankTitle);
        }
        Ok(())
    }
}

/// Encodes tags as a compact JSON array.
pub fn encode_tags(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

/// Decodes a stored tag list. Malformed input yields an empty list.
pub fn decode_tags(value: &str) -> Vec<String> {
    if value.trim().is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Vec<String>>(value) {
        Ok(tags) => tags,
        Err(err) => {
            warn!("event=decode_tags module=model status=error error_code=invalid_json error={err}");
            Vec::new()
        }
    }
}
