//! Current-profile session.
//!
//! # Responsibility
//! - Hold the process-wide notion of "who is signed in".
//! - Serialize profile switches and publish the active profile to scoped
//!   services and live queries.
//!
//! # Invariants
//! - The published profile always reflects a committed store state.
//! - Scope watchers are only notified when the active profile id changes.
//! - Switches never interleave: the store update and the publish happen
//!   under one lock.

use super::{ServiceError, ServiceResult};
use crate::db::Database;
use crate::live::LiveQuery;
use crate::model::user::User;
use crate::model::EntityId;
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

/// Observable state of the current profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileState {
    NoProfile,
    ProfileActive(User),
}

impl From<Option<User>> for ProfileState {
    fn from(value: Option<User>) -> Self {
        match value {
            Some(user) => Self::ProfileActive(user),
            None => Self::NoProfile,
        }
    }
}

/// Shared handle on the store plus the current profile.
///
/// Cloning is cheap; clones share the same profile state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    db: Database,
    users: SqliteUserRepository,
    profile: watch::Sender<Option<User>>,
    scope: watch::Sender<Option<EntityId>>,
    switch_lock: Mutex<()>,
}

impl Session {
    /// Opens a session and loads the persisted current profile.
    pub fn open(db: &Database) -> ServiceResult<Self> {
        let users = SqliteUserRepository::new(db);
        let current = users.get_current()?;
        let scope = current.as_ref().map(|user| user.id);

        log::info!(
            "event=session_open module=service status=ok current_user_id={}",
            scope.map_or_else(|| "none".to_string(), |id| id.to_string())
        );

        let (profile, _) = watch::channel(current);
        let (scope, _) = watch::channel(scope);
        Ok(Self {
            inner: Arc::new(SessionInner {
                db: db.clone(),
                users,
                profile,
                scope,
                switch_lock: Mutex::new(()),
            }),
        })
    }

    pub fn database(&self) -> &Database {
        &self.inner.db
    }

    pub(crate) fn users(&self) -> &SqliteUserRepository {
        &self.inner.users
    }

    /// Reads the current profile from the store.
    ///
    /// The published state is brought in line with what was read.
    pub fn current_user(&self) -> ServiceResult<Option<User>> {
        let _guard = self.inner.switch_lock.lock();
        self.reload()
    }

    /// Current profile, or `NoActiveProfile`.
    pub fn require_current_user(&self) -> ServiceResult<User> {
        self.current_user()?.ok_or(ServiceError::NoActiveProfile)
    }

    /// Id of the current profile, read at call time.
    pub fn current_user_id(&self) -> ServiceResult<Option<EntityId>> {
        Ok(self.current_user()?.map(|user| user.id))
    }

    /// Last published profile state, without touching the store.
    pub fn state(&self) -> ProfileState {
        self.inner.profile.borrow().clone().into()
    }

    /// Makes `user_id` the current profile.
    pub fn switch_to(&self, user_id: EntityId) -> ServiceResult<User> {
        let _guard = self.inner.switch_lock.lock();
        let user = self.inner.users.set_current(user_id)?;
        self.publish(Some(user.clone()));

        log::info!("event=profile_switch module=service status=ok user_id={user_id}");
        Ok(user)
    }

    /// Runs a profile mutation under the switch lock, then republishes
    /// whatever profile is current afterwards.
    pub(crate) fn mutate_profiles<T>(
        &self,
        f: impl FnOnce(&SqliteUserRepository) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        let _guard = self.inner.switch_lock.lock();
        let outcome = f(&self.inner.users);
        self.reload()?;
        outcome
    }

    /// Receiver that yields every published profile value.
    pub fn watch_profile(&self) -> watch::Receiver<Option<User>> {
        self.inner.profile.subscribe()
    }

    /// Receiver that only changes when the active profile id changes.
    pub(crate) fn watch_scope(&self) -> watch::Receiver<Option<EntityId>> {
        self.inner.scope.subscribe()
    }

    /// Live current profile read straight from the store.
    pub fn observe_current(&self) -> LiveQuery<Option<User>> {
        self.inner.users.observe_current()
    }

    fn reload(&self) -> ServiceResult<Option<User>> {
        let current = self.inner.users.get_current()?;
        self.publish(current.clone());
        Ok(current)
    }

    fn publish(&self, user: Option<User>) {
        let id = user.as_ref().map(|user| user.id);
        self.inner.profile.send_if_modified(|published| {
            if *published == user {
                return false;
            }
            *published = user;
            true
        });
        self.inner.scope.send_if_modified(|published| {
            if *published == id {
                return false;
            }
            log::debug!(
                "event=profile_scope_change module=service status=ok from={published:?} to={id:?}"
            );
            *published = id;
            true
        });
    }
}
