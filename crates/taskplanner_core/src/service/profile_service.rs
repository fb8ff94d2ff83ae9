//! Profile management use-cases.
//!
//! # Responsibility
//! - Create, edit, delete and switch profiles with input validation.
//! - Keep the session's published profile in step with every change.
//!
//! # Invariants
//! - Names and emails are trimmed; emails must be well-formed.
//! - An email may belong to at most one profile, ignoring case.
//! - Deleting a profile leaves its categories and tasks in the store.

use super::session::Session;
use super::{ServiceError, ServiceResult};
use crate::live::LiveQuery;
use crate::model::user::User;
use crate::model::{EntityId, UNASSIGNED_ID};
use crate::repo::user_repo::{UserRepository, RECENT_PROFILE_LIMIT};

/// Use-case facade over the user repository and session.
#[derive(Clone)]
pub struct ProfileService {
    session: Session,
}

impl ProfileService {
    pub fn new(session: &Session) -> Self {
        Self {
            session: session.clone(),
        }
    }

    /// Creates a profile, optionally making it current.
    pub fn create_profile(
        &self,
        name: &str,
        email: &str,
        make_current: bool,
    ) -> ServiceResult<User> {
        let user = User::new(name.trim(), email.trim());
        user.validate()?;

        let created = self.session.mutate_profiles(|users| {
            ensure_email_free(users, &user.email, UNASSIGNED_ID)?;
            if make_current {
                return Ok(users.insert_current(&user)?);
            }
            let id = users.insert(&user)?;
            users
                .get_by_id(id)?
                .ok_or_else(|| ServiceError::not_found("user", id))
        })?;

        log::info!(
            "event=profile_create module=service status=ok user_id={} current={}",
            created.id,
            created.is_current
        );
        Ok(created)
    }

    /// Changes a profile's name and email.
    pub fn update_profile(&self, id: EntityId, name: &str, email: &str) -> ServiceResult<User> {
        self.session.mutate_profiles(|users| {
            let mut user = users
                .get_by_id(id)?
                .ok_or_else(|| ServiceError::not_found("user", id))?;
            user.rename(name.trim());
            user.email = email.trim().to_string();
            user.validate()?;
            ensure_email_free(users, &user.email, id)?;
            users.update(&user)?;
            users
                .get_by_id(id)?
                .ok_or_else(|| ServiceError::not_found("user", id))
        })
    }

    /// Deletes one profile. Deleting the current profile leaves none active.
    pub fn delete_profile(&self, id: EntityId) -> ServiceResult<()> {
        self.session.mutate_profiles(|users| Ok(users.delete(id)?))?;
        log::info!("event=profile_delete module=service status=ok user_id={id}");
        Ok(())
    }

    /// Deletes the current profile.
    pub fn delete_current_profile(&self) -> ServiceResult<()> {
        let current = self.session.require_current_user()?;
        self.delete_profile(current.id)
    }

    /// Deletes every profile.
    pub fn delete_all_profiles(&self) -> ServiceResult<usize> {
        let removed = self
            .session
            .mutate_profiles(|users| Ok(users.delete_all()?))?;
        log::info!("event=profile_delete_all module=service status=ok removed={removed}");
        Ok(removed)
    }

    /// Makes `id` the current profile.
    pub fn switch_to(&self, id: EntityId) -> ServiceResult<User> {
        self.session.switch_to(id)
    }

    pub fn current_profile(&self) -> ServiceResult<Option<User>> {
        self.session.current_user()
    }

    pub fn get_profile(&self, id: EntityId) -> ServiceResult<Option<User>> {
        Ok(self.session.users().get_by_id(id)?)
    }

    pub fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        Ok(self.session.users().get_by_email(email)?)
    }

    /// Lists profiles, most recently used first.
    pub fn list_profiles(&self) -> ServiceResult<Vec<User>> {
        Ok(self.session.users().list_all()?)
    }

    /// Lists the most recently used profiles.
    pub fn recent_profiles(&self) -> ServiceResult<Vec<User>> {
        Ok(self.session.users().list_recent(RECENT_PROFILE_LIMIT)?)
    }

    pub fn is_email_taken(&self, email: &str, exclude_id: EntityId) -> ServiceResult<bool> {
        Ok(self.session.users().is_email_taken(email, exclude_id)?)
    }

    pub fn observe_profiles(&self) -> LiveQuery<Vec<User>> {
        self.session.users().observe_all()
    }

    pub fn observe_recent_profiles(&self) -> LiveQuery<Vec<User>> {
        self.session.users().observe_recent(RECENT_PROFILE_LIMIT)
    }

    pub fn observe_current_profile(&self) -> LiveQuery<Option<User>> {
        self.session.observe_current()
    }
}

fn ensure_email_free(
    users: &impl UserRepository,
    email: &str,
    exclude_id: EntityId,
) -> ServiceResult<()> {
    if users.is_email_taken(email, exclude_id)? {
        return Err(ServiceError::Conflict(format!(
            "email is already in use: {email}"
        )));
    }
    Ok(())
}
