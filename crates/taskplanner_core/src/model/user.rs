//! Profile (user) record.
//!
//! # Invariants
//! - `email` is unique ignoring ASCII case.
//! - `avatar_initial` is derived from `name`; writers re-derive it.
//! - At most one user has `is_current = true`.

use super::{now_epoch_ms, EntityId, ValidationError, UNASSIGNED_ID};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("valid email regex")
});

/// ARGB palette used for generated avatars.
const AVATAR_PALETTE: [u32; 16] = [
    0xFFE9_1E63,
    0xFF9C_27B0,
    0xFF67_3AB7,
    0xFF3F_51B5,
    0xFF21_96F3,
    0xFF03_A9F4,
    0xFF00_BCD4,
    0xFF00_9688,
    0xFF4C_AF50,
    0xFF8B_C34A,
    0xFFCD_DC39,
    0xFFFF_EB3B,
    0xFFFF_C107,
    0xFFFF_9800,
    0xFFFF_5722,
    0xFF79_5548,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: EntityId,
    pub email: String,
    pub name: String,
    /// ARGB colour of the avatar badge.
    pub avatar_color: u32,
    pub avatar_initial: String,
    pub is_current: bool,
    pub last_used: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    /// Creates an unsaved, non-current profile with derived avatar fields.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        let name = name.into();
        let now = now_epoch_ms();
        Self {
            id: UNASSIGNED_ID,
            email: email.into(),
            avatar_color: derive_avatar_color(&name),
            avatar_initial: derive_avatar_initial(&name),
            name,
            is_current: false,
            last_used: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the display name and re-derives avatar fields.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.avatar_initial = derive_avatar_initial(&self.name);
        self.avatar_color = derive_avatar_color(&self.name);
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::BlankName);
        }
        validate_email(&self.email)
    }
}

/// Checks that `email` is present and well-formed.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::BlankEmail);
    }
    if !EMAIL_RE.is_match(trimmed) {
        return Err(ValidationError::MalformedEmail);
    }
    Ok(())
}

/// First letter of the trimmed name, uppercased; `?` for blank names.
pub fn derive_avatar_initial(name: &str) -> String {
    match name.trim().chars().next() {
        Some(first) => first.to_uppercase().collect(),
        None => "?".to_string(),
    }
}

/// Deterministic palette colour for `name`.
///
/// Uses the 31-multiplier string hash over UTF-16 units so a name keeps
/// the same colour across platforms.
pub fn derive_avatar_color(name: &str) -> u32 {
    let hash = name
        .encode_utf16()
        .fold(0i32, |acc, unit| acc.wrapping_mul(31).wrapping_add(i32::from(unit)));
    let index = hash.unsigned_abs() as usize % AVATAR_PALETTE.len();
    AVATAR_PALETTE[index]
}
