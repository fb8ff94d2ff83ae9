//! Category use-cases scoped to the current profile.
//!
//! # Responsibility
//! - Stamp new categories with the current profile.
//! - Validate parent links before they reach the store.
//!
//! # Invariants
//! - A parent must belong to the same profile.
//! - Re-parenting never creates a cycle.

use super::session::Session;
use super::{insert_id_or_sentinel, ServiceError, ServiceResult};
use crate::live::LiveQuery;
use crate::model::category::Category;
use crate::model::{EntityId, ValidationError, UNASSIGNED_ID};
use crate::repo::category_repo::{
    CategoryRepository, ParentFilter, SqliteCategoryRepository, CATEGORY_TABLES,
};
use std::collections::HashSet;

/// Profile-scoped facade over a [`CategoryRepository`].
#[derive(Clone)]
pub struct CategoryService<R: CategoryRepository = SqliteCategoryRepository> {
    session: Session,
    repo: R,
}

impl CategoryService<SqliteCategoryRepository> {
    /// Builds a service over the session's store.
    pub fn from_session(session: &Session) -> Self {
        Self::new(session, SqliteCategoryRepository::new(session.database()))
    }
}

impl<R> CategoryService<R>
where
    R: CategoryRepository + Clone + Send + Sync + 'static,
{
    pub fn new(session: &Session, repo: R) -> Self {
        Self {
            session: session.clone(),
            repo,
        }
    }

    pub fn get_category(&self, id: EntityId) -> ServiceResult<Option<Category>> {
        let Some(user_id) = self.session.current_user_id()? else {
            return Ok(None);
        };
        Ok(self.repo.get_for_user(user_id, id)?)
    }

    /// Lists categories of the current profile. Empty when none is active.
    pub fn list_categories(&self, filter: ParentFilter) -> ServiceResult<Vec<Category>> {
        let Some(user_id) = self.session.current_user_id()? else {
            return Ok(Vec::new());
        };
        Ok(self.repo.list(user_id, filter)?)
    }

    pub fn root_categories(&self) -> ServiceResult<Vec<Category>> {
        self.list_categories(ParentFilter::Root)
    }

    pub fn subcategories(&self, parent_id: EntityId) -> ServiceResult<Vec<Category>> {
        self.list_categories(ParentFilter::ChildrenOf(parent_id))
    }

    pub fn count_categories(&self) -> ServiceResult<i64> {
        let Some(user_id) = self.session.current_user_id()? else {
            return Ok(0);
        };
        Ok(self.repo.count(user_id)?)
    }

    /// Inserts a category for the current profile.
    ///
    /// An assigned `id` replaces that category only if the current profile
    /// owns it, under the same parent checks as [`Self::update_category`].
    pub fn insert_category(&self, category: &Category) -> ServiceResult<EntityId> {
        category.validate()?;
        let user_id = self.require_user_id()?;
        let replaces = self.ensure_not_foreign(user_id, category.id)?;
        if let Some(parent_id) = category.parent_category_id {
            self.ensure_parent(user_id, parent_id)?;
            if replaces {
                self.ensure_acyclic(user_id, category.id, parent_id)?;
            }
        }

        let mut category = category.clone();
        category.user_id = user_id;
        Ok(self.repo.insert(&category)?)
    }

    /// Like [`Self::insert_category`], but reports a missing profile as
    /// [`super::NO_ACTIVE_PROFILE_ID`].
    pub fn insert_category_or_sentinel(&self, category: &Category) -> ServiceResult<EntityId> {
        insert_id_or_sentinel(self.insert_category(category))
    }

    /// Rewrites a category of the current profile.
    pub fn update_category(&self, category: &Category) -> ServiceResult<()> {
        category.validate()?;
        let user_id = self.require_user_id()?;
        self.ensure_owned(user_id, category.id)?;
        if let Some(parent_id) = category.parent_category_id {
            self.ensure_parent(user_id, parent_id)?;
            self.ensure_acyclic(user_id, category.id, parent_id)?;
        }

        let mut category = category.clone();
        category.user_id = user_id;
        Ok(self.repo.update(&category)?)
    }

    /// Deletes a category. Children become roots and tasks lose the link.
    pub fn delete_category(&self, id: EntityId) -> ServiceResult<()> {
        let user_id = self.require_user_id()?;
        self.ensure_owned(user_id, id)?;
        Ok(self.repo.delete(id)?)
    }

    /// Deletes every category of the current profile.
    pub fn delete_all_categories(&self) -> ServiceResult<usize> {
        let user_id = self.require_user_id()?;
        let removed = self.repo.delete_all_for_user(user_id)?;
        log::info!(
            "event=category_delete_all module=service status=ok user_id={user_id} removed={removed}"
        );
        Ok(removed)
    }

    /// Live category listing that follows the current profile.
    pub fn observe_categories(&self, filter: ParentFilter) -> LiveQuery<Vec<Category>> {
        let repo = self.repo.clone();
        LiveQuery::spawn_scoped(
            self.session.database(),
            CATEGORY_TABLES,
            self.session.watch_scope(),
            move |_, user_id| match user_id {
                Some(user_id) => repo.list(user_id, filter),
                None => Ok(Vec::new()),
            },
        )
    }

    pub fn observe_all_categories(&self) -> LiveQuery<Vec<Category>> {
        self.observe_categories(ParentFilter::Any)
    }

    pub fn observe_root_categories(&self) -> LiveQuery<Vec<Category>> {
        self.observe_categories(ParentFilter::Root)
    }

    pub fn observe_subcategories(&self, parent_id: EntityId) -> LiveQuery<Vec<Category>> {
        self.observe_categories(ParentFilter::ChildrenOf(parent_id))
    }

    pub fn observe_count(&self) -> LiveQuery<i64> {
        let repo = self.repo.clone();
        LiveQuery::spawn_scoped(
            self.session.database(),
            CATEGORY_TABLES,
            self.session.watch_scope(),
            move |_, user_id| match user_id {
                Some(user_id) => repo.count(user_id),
                None => Ok(0),
            },
        )
    }

    fn require_user_id(&self) -> ServiceResult<EntityId> {
        Ok(self.session.require_current_user()?.id)
    }

    fn ensure_owned(&self, user_id: EntityId, id: EntityId) -> ServiceResult<Category> {
        if id == UNASSIGNED_ID {
            return Err(ServiceError::not_found("category", id));
        }
        self.repo
            .get_for_user(user_id, id)?
            .ok_or_else(|| ServiceError::not_found("category", id))
    }

    /// Returns whether `id` names an existing category of `user_id`.
    fn ensure_not_foreign(&self, user_id: EntityId, id: EntityId) -> ServiceResult<bool> {
        if id == UNASSIGNED_ID {
            return Ok(false);
        }
        match self.repo.get_by_id(id)? {
            Some(existing) if existing.user_id != user_id => {
                Err(ServiceError::not_found("category", id))
            }
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }

    fn ensure_parent(&self, user_id: EntityId, parent_id: EntityId) -> ServiceResult<()> {
        if self.repo.get_for_user(user_id, parent_id)?.is_none() {
            return Err(ValidationError::UnknownCategory(parent_id).into());
        }
        Ok(())
    }

    /// Walks up from `parent_id`; reaching `category_id` means a cycle.
    fn ensure_acyclic(
        &self,
        user_id: EntityId,
        category_id: EntityId,
        parent_id: EntityId,
    ) -> ServiceResult<()> {
        let mut visited = HashSet::new();
        let mut cursor = Some(parent_id);
        while let Some(current) = cursor {
            if current == category_id {
                return Err(ValidationError::ParentCycle {
                    category_id,
                    parent_id,
                }
                .into());
            }
            if !visited.insert(current) {
                break;
            }
            cursor = self
                .repo
                .get_for_user(user_id, current)?
                .and_then(|category| category.parent_category_id);
        }
        Ok(())
    }
}
