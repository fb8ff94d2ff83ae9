//! Task use-cases scoped to the current profile.
//!
//! # Responsibility
//! - Stamp new tasks with the current profile and guard cross-profile
//!   access.
//! - Expose live task listings and counts that follow profile switches.
//!
//! # Invariants
//! - A task's `category_id`, when set, names a category of the same
//!   profile.
//! - Tasks of other profiles behave as if they do not exist.

use super::session::Session;
use super::{insert_id_or_sentinel, ServiceError, ServiceResult};
use crate::live::LiveQuery;
use crate::model::task::{Task, TaskStatus};
use crate::model::{EntityId, ValidationError, UNASSIGNED_ID};
use crate::repo::category_repo::{CategoryRepository, SqliteCategoryRepository};
use crate::repo::task_repo::{SqliteTaskRepository, TaskQuery, TaskRepository, TASK_TABLES};

/// Profile-scoped facade over a [`TaskRepository`].
#[derive(Clone)]
pub struct TaskService<R: TaskRepository = SqliteTaskRepository> {
    session: Session,
    repo: R,
    categories: SqliteCategoryRepository,
}

impl TaskService<SqliteTaskRepository> {
    /// Builds a service over the session's store.
    pub fn from_session(session: &Session) -> Self {
        Self::new(session, SqliteTaskRepository::new(session.database()))
    }
}

impl<R> TaskService<R>
where
    R: TaskRepository + Clone + Send + Sync + 'static,
{
    pub fn new(session: &Session, repo: R) -> Self {
        Self {
            categories: SqliteCategoryRepository::new(session.database()),
            session: session.clone(),
            repo,
        }
    }

    /// Loads one task of the current profile.
    pub fn get_task(&self, id: EntityId) -> ServiceResult<Option<Task>> {
        let Some(user_id) = self.session.current_user_id()? else {
            return Ok(None);
        };
        Ok(self.repo.get_for_user(user_id, id)?)
    }

    /// Lists tasks of the current profile. Empty when no profile is active.
    pub fn list_tasks(&self, query: &TaskQuery) -> ServiceResult<Vec<Task>> {
        let Some(user_id) = self.session.current_user_id()? else {
            return Ok(Vec::new());
        };
        Ok(self.repo.list(user_id, query)?)
    }

    /// Counts tasks of the current profile. Zero when no profile is active.
    pub fn count_tasks(&self, query: &TaskQuery) -> ServiceResult<i64> {
        let Some(user_id) = self.session.current_user_id()? else {
            return Ok(0);
        };
        Ok(self.repo.count(user_id, query)?)
    }

    /// Inserts a task for the current profile, keeping its `order`.
    ///
    /// An assigned `id` replaces that task only if the current profile owns
    /// it; a task of another profile is reported as `NotFound`.
    pub fn insert_task(&self, task: &Task) -> ServiceResult<EntityId> {
        task.validate()?;
        let user_id = self.require_user_id()?;
        self.ensure_not_foreign(user_id, task.id)?;
        self.ensure_category(user_id, task.category_id)?;

        let mut task = task.clone();
        task.user_id = user_id;
        Ok(self.repo.insert(&task)?)
    }

    /// Inserts a task after every existing task of the current profile.
    pub fn append_task(&self, task: &Task) -> ServiceResult<EntityId> {
        task.validate()?;
        let user_id = self.require_user_id()?;
        self.ensure_not_foreign(user_id, task.id)?;
        self.ensure_category(user_id, task.category_id)?;

        let mut task = task.clone();
        task.user_id = user_id;
        task.order = self.repo.next_order(user_id)?;
        Ok(self.repo.insert(&task)?)
    }

    /// Like [`Self::insert_task`], but reports a missing profile as
    /// [`super::NO_ACTIVE_PROFILE_ID`] instead of an error.
    pub fn insert_task_or_sentinel(&self, task: &Task) -> ServiceResult<EntityId> {
        insert_id_or_sentinel(self.insert_task(task))
    }

    /// Inserts several tasks for the current profile, returning their ids.
    pub fn insert_tasks(&self, tasks: &[Task]) -> ServiceResult<Vec<EntityId>> {
        tasks.iter().map(|task| self.insert_task(task)).collect()
    }

    /// Rewrites a task of the current profile.
    pub fn update_task(&self, task: &Task) -> ServiceResult<()> {
        task.validate()?;
        let user_id = self.require_user_id()?;
        self.ensure_owned(user_id, task.id)?;
        self.ensure_category(user_id, task.category_id)?;

        let mut task = task.clone();
        task.user_id = user_id;
        Ok(self.repo.update(&task)?)
    }

    pub fn set_status(&self, id: EntityId, status: TaskStatus) -> ServiceResult<()> {
        let user_id = self.require_user_id()?;
        self.ensure_owned(user_id, id)?;
        Ok(self.repo.set_status(id, status)?)
    }

    /// Flips a task between `Completed` and `Todo`.
    pub fn toggle_completed(&self, id: EntityId) -> ServiceResult<TaskStatus> {
        let user_id = self.require_user_id()?;
        let task = self.ensure_owned(user_id, id)?;
        let next = if task.is_completed() {
            TaskStatus::Todo
        } else {
            TaskStatus::Completed
        };
        self.repo.set_status(id, next)?;
        Ok(next)
    }

    /// Assigns `order = index` for each id. Returns the updated count.
    pub fn reorder(&self, ordered_ids: &[EntityId]) -> ServiceResult<usize> {
        let user_id = self.require_user_id()?;
        Ok(self.repo.reorder(user_id, ordered_ids)?)
    }

    pub fn delete_task(&self, id: EntityId) -> ServiceResult<()> {
        let user_id = self.require_user_id()?;
        self.ensure_owned(user_id, id)?;
        Ok(self.repo.delete(id)?)
    }

    /// Deletes every task of the current profile.
    pub fn delete_all_tasks(&self) -> ServiceResult<usize> {
        let user_id = self.require_user_id()?;
        let removed = self.repo.delete_all_for_user(user_id)?;
        log::info!(
            "event=task_delete_all module=service status=ok user_id={user_id} removed={removed}"
        );
        Ok(removed)
    }

    /// Live task listing that follows the current profile.
    pub fn observe_tasks(&self, query: TaskQuery) -> LiveQuery<Vec<Task>> {
        let repo = self.repo.clone();
        LiveQuery::spawn_scoped(
            self.session.database(),
            TASK_TABLES,
            self.session.watch_scope(),
            move |_, user_id| match user_id {
                Some(user_id) => repo.list(user_id, &query),
                None => Ok(Vec::new()),
            },
        )
    }

    /// Live task count that follows the current profile.
    pub fn observe_count(&self, query: TaskQuery) -> LiveQuery<i64> {
        let repo = self.repo.clone();
        LiveQuery::spawn_scoped(
            self.session.database(),
            TASK_TABLES,
            self.session.watch_scope(),
            move |_, user_id| match user_id {
                Some(user_id) => repo.count(user_id, &query),
                None => Ok(0),
            },
        )
    }

    pub fn observe_all_tasks(&self) -> LiveQuery<Vec<Task>> {
        self.observe_tasks(TaskQuery::all())
    }

    pub fn observe_by_status(&self, status: TaskStatus) -> LiveQuery<Vec<Task>> {
        self.observe_tasks(TaskQuery::by_status(status))
    }

    pub fn observe_by_category(&self, category_id: EntityId) -> LiveQuery<Vec<Task>> {
        self.observe_tasks(TaskQuery::by_category(category_id))
    }

    pub fn observe_by_due_range(&self, start: i64, end: i64) -> LiveQuery<Vec<Task>> {
        self.observe_tasks(TaskQuery::by_due_range(start, end))
    }

    pub fn observe_count_by_status(&self, status: TaskStatus) -> LiveQuery<i64> {
        self.observe_count(TaskQuery::by_status(status))
    }

    fn require_user_id(&self) -> ServiceResult<EntityId> {
        Ok(self.session.require_current_user()?.id)
    }

    fn ensure_owned(&self, user_id: EntityId, id: EntityId) -> ServiceResult<Task> {
        if id == UNASSIGNED_ID {
            return Err(ServiceError::not_found("task", id));
        }
        self.repo
            .get_for_user(user_id, id)?
            .ok_or_else(|| ServiceError::not_found("task", id))
    }

    fn ensure_not_foreign(&self, user_id: EntityId, id: EntityId) -> ServiceResult<()> {
        if id == UNASSIGNED_ID {
            return Ok(());
        }
        match self.repo.get_by_id(id)? {
            Some(existing) if existing.user_id != user_id => {
                Err(ServiceError::not_found("task", id))
            }
            _ => Ok(()),
        }
    }

    fn ensure_category(&self, user_id: EntityId, category_id: Option<EntityId>) -> ServiceResult<()> {
        let Some(category_id) = category_id else {
            return Ok(());
        };
        if self.categories.get_for_user(user_id, category_id)?.is_none() {
            return Err(ValidationError::UnknownCategory(category_id).into());
        }
        Ok(())
    }
}
