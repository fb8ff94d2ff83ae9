//! Task repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist per-user tasks and serve filtered, ordered listings.
//! - Provide counts and manual reordering.
//!
//! # Invariants
//! - Default ordering is `order ASC`, then due date ascending with
//!   undated tasks last, then id.
//! - Status/priority strings that cannot be decoded fall back to defaults.

use super::{id_param, RepoError, RepoResult};
use crate::db::Database;
use crate::live::{LiveQuery, Table};
use crate::model::task::{decode_tags, encode_tags, Priority, Task, TaskStatus};
use crate::model::{now_epoch_ms, EntityId};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

/// Tables a task listing depends on.
pub(crate) const TASK_TABLES: &[Table] = &[Table::Tasks];

const TASK_SELECT_SQL: &str = "SELECT
    id,
    title,
    description,
    due_date,
    priority,
    status,
    category_id,
    user_id,
    \"order\",
    tags,
    created_at,
    updated_at
FROM tasks";

const TASK_UPSERT_SQL: &str = "INSERT INTO tasks (
    id,
    title,
    description,
    due_date,
    priority,
    status,
    category_id,
    user_id,
    \"order\",
    tags,
    created_at,
    updated_at
)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
ON CONFLICT(id) DO UPDATE SET
    title = excluded.title,
    description = excluded.description,
    due_date = excluded.due_date,
    priority = excluded.priority,
    status = excluded.status,
    category_id = excluded.category_id,
    user_id = excluded.user_id,
    \"order\" = excluded.\"order\",
    tags = excluded.tags,
    created_at = excluded.created_at,
    updated_at = excluded.updated_at
WHERE tasks.user_id = excluded.user_id
RETURNING id;";

const PRIORITY_RANK_SQL: &str =
    "CASE priority WHEN 'LOW' THEN 0 WHEN 'HIGH' THEN 2 ELSE 1 END";

/// Sort order for task listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TaskSort {
    /// Manual `order`, then due date (undated last), then id.
    #[default]
    Manual,
    DueDateAsc,
    DueDateDesc,
    PriorityAsc,
    PriorityDesc,
    TitleAsc,
    TitleDesc,
}

impl TaskSort {
    fn order_by_sql(self) -> String {
        match self {
            Self::Manual => {
                "\"order\" ASC, due_date IS NULL ASC, due_date ASC, id ASC".to_string()
            }
            Self::DueDateAsc => {
                "due_date IS NULL ASC, due_date ASC, \"order\" ASC, id ASC".to_string()
            }
            Self::DueDateDesc => {
                "due_date IS NULL ASC, due_date DESC, \"order\" ASC, id ASC".to_string()
            }
            Self::PriorityAsc => format!("{PRIORITY_RANK_SQL} ASC, \"order\" ASC, id ASC"),
            Self::PriorityDesc => format!("{PRIORITY_RANK_SQL} DESC, \"order\" ASC, id ASC"),
            Self::TitleAsc => "title COLLATE NOCASE ASC, id ASC".to_string(),
            Self::TitleDesc => "title COLLATE NOCASE DESC, id ASC".to_string(),
        }
    }
}

/// Filter and sort options for task listings and counts.
///
/// Filters combine with AND. `due_between` bounds are inclusive and never
/// match undated tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
    pub category_id: Option<EntityId>,
    pub due_between: Option<(i64, i64)>,
    pub sort: TaskSort,
}

impl TaskQuery {
    /// All tasks in manual order.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn by_category(category_id: EntityId) -> Self {
        Self {
            category_id: Some(category_id),
            ..Self::default()
        }
    }

    pub fn by_due_range(start: i64, end: i64) -> Self {
        Self {
            due_between: Some((start, end)),
            ..Self::default()
        }
    }

    pub fn sorted(mut self, sort: TaskSort) -> Self {
        self.sort = sort;
        self
    }
}

/// Repository interface for task records.
pub trait TaskRepository {
    /// Loads one task by id regardless of owner.
    fn get_by_id(&self, id: EntityId) -> RepoResult<Option<Task>>;
    /// Loads one task by id if `user_id` owns it.
    fn get_for_user(&self, user_id: EntityId, id: EntityId) -> RepoResult<Option<Task>>;
    /// Lists a user's tasks matching `query`.
    fn list(&self, user_id: EntityId, query: &TaskQuery) -> RepoResult<Vec<Task>>;
    /// Counts a user's tasks matching `query`. Sort is ignored.
    fn count(&self, user_id: EntityId, query: &TaskQuery) -> RepoResult<i64>;
    /// Returns `max(order) + 1` over a user's tasks, or 0 when none exist.
    fn next_order(&self, user_id: EntityId) -> RepoResult<i64>;
    /// Inserts or replaces a task and returns its id.
    ///
    /// Replacing is limited to rows of the same `user_id`; an id owned by
    /// another user yields `NotFound`.
    fn insert(&self, task: &Task) -> RepoResult<EntityId>;
    /// Updates an existing task by id.
    fn update(&self, task: &Task) -> RepoResult<()>;
    /// Changes only the status of one task.
    fn set_status(&self, id: EntityId, status: TaskStatus) -> RepoResult<()>;
    /// Rewrites `order` to each id's index in `ordered_ids`.
    ///
    /// Ids not owned by `user_id` are skipped. Returns the number of
    /// updated rows.
    fn reorder(&self, user_id: EntityId, ordered_ids: &[EntityId]) -> RepoResult<usize>;
    /// Deletes one task by id.
    fn delete(&self, id: EntityId) -> RepoResult<()>;
    /// Deletes every task owned by `user_id`.
    fn delete_all_for_user(&self, user_id: EntityId) -> RepoResult<usize>;
    /// Live listing of a user's tasks matching `query`.
    fn observe(&self, user_id: EntityId, query: TaskQuery) -> LiveQuery<Vec<Task>>;
    /// Live count of a user's tasks matching `query`.
    fn observe_count(&self, user_id: EntityId, query: TaskQuery) -> LiveQuery<i64>;

    fn observe_all(&self, user_id: EntityId) -> LiveQuery<Vec<Task>> {
        self.observe(user_id, TaskQuery::all())
    }

    fn observe_by_status(&self, user_id: EntityId, status: TaskStatus) -> LiveQuery<Vec<Task>> {
        self.observe(user_id, TaskQuery::by_status(status))
    }

    fn observe_by_category(&self, user_id: EntityId, category_id: EntityId) -> LiveQuery<Vec<Task>> {
        self.observe(user_id, TaskQuery::by_category(category_id))
    }

    fn observe_by_due_range(&self, user_id: EntityId, start: i64, end: i64) -> LiveQuery<Vec<Task>> {
        self.observe(user_id, TaskQuery::by_due_range(start, end))
    }
}

/// SQLite-backed task repository.
#[derive(Clone)]
pub struct SqliteTaskRepository {
    db: Database,
}

impl SqliteTaskRepository {
    pub fn new(db: &Database) -> Self {
        Self { db: db.clone() }
    }
}

impl TaskRepository for SqliteTaskRepository {
    fn get_by_id(&self, id: EntityId) -> RepoResult<Option<Task>> {
        self.db.read(|conn| load_task(conn, id, None))
    }

    fn get_for_user(&self, user_id: EntityId, id: EntityId) -> RepoResult<Option<Task>> {
        self.db.read(|conn| load_task(conn, id, Some(user_id)))
    }

    fn list(&self, user_id: EntityId, query: &TaskQuery) -> RepoResult<Vec<Task>> {
        self.db.read(|conn| list_tasks(conn, user_id, query))
    }

    fn count(&self, user_id: EntityId, query: &TaskQuery) -> RepoResult<i64> {
        self.db.read(|conn| count_tasks(conn, user_id, query))
    }

    fn next_order(&self, user_id: EntityId) -> RepoResult<i64> {
        self.db.read(|conn| {
            let next: i64 = conn.query_row(
                "SELECT COALESCE(MAX(\"order\") + 1, 0) FROM tasks WHERE user_id = ?1;",
                params![user_id],
                |row| row.get(0),
            )?;
            Ok(next)
        })
    }

    fn insert(&self, task: &Task) -> RepoResult<EntityId> {
        task.validate()?;
        let now = now_epoch_ms();
        let id = self.db.write(TASK_TABLES, |conn| -> RepoResult<EntityId> {
            let id: Option<EntityId> = conn
                .query_row(
                    TASK_UPSERT_SQL,
                    params![
                        id_param(task.id),
                        task.title.trim(),
                        task.description,
                        task.due_date,
                        task.priority.as_db_str(),
                        task.status.as_db_str(),
                        task.category_id,
                        task.user_id,
                        task.order,
                        encode_tags(&task.tags),
                        task.created_at,
                        now,
                    ],
                    |row| row.get(0),
                )
                .optional()?;
            // No row back means the id is held by another owner.
            id.ok_or(RepoError::NotFound {
                entity: "task",
                id: task.id,
            })
        })?;

        log::info!(
            "event=task_insert module=repo status=ok task_id={id} user_id={}",
            task.user_id
        );
        Ok(id)
    }

    fn update(&self, task: &Task) -> RepoResult<()> {
        task.validate()?;
        let now = now_epoch_ms();
        self.db.write(TASK_TABLES, |conn| {
            let changed = conn.execute(
                "UPDATE tasks
                 SET
                    title = ?2,
                    description = ?3,
                    due_date = ?4,
                    priority = ?5,
                    status = ?6,
                    category_id = ?7,
                    user_id = ?8,
                    \"order\" = ?9,
                    tags = ?10,
                    updated_at = ?11
                 WHERE id = ?1;",
                params![
                    task.id,
                    task.title.trim(),
                    task.description,
                    task.due_date,
                    task.priority.as_db_str(),
                    task.status.as_db_str(),
                    task.category_id,
                    task.user_id,
                    task.order,
                    encode_tags(&task.tags),
                    now,
                ],
            )?;
            if changed == 0 {
                return Err(RepoError::NotFound {
                    entity: "task",
                    id: task.id,
                });
            }
            Ok(())
        })
    }

    fn set_status(&self, id: EntityId, status: TaskStatus) -> RepoResult<()> {
        let now = now_epoch_ms();
        self.db.write(TASK_TABLES, |conn| {
            let changed = conn.execute(
                "UPDATE tasks SET status = ?2, updated_at = ?3 WHERE id = ?1;",
                params![id, status.as_db_str(), now],
            )?;
            if changed == 0 {
                return Err(RepoError::NotFound { entity: "task", id });
            }
            Ok(())
        })
    }

    fn reorder(&self, user_id: EntityId, ordered_ids: &[EntityId]) -> RepoResult<usize> {
        let now = now_epoch_ms();
        let updated = self.db.write(TASK_TABLES, |conn| -> RepoResult<usize> {
            let mut stmt = conn.prepare(
                "UPDATE tasks
                 SET \"order\" = ?2, updated_at = ?3
                 WHERE id = ?1 AND user_id = ?4;",
            )?;
            let mut updated = 0;
            for (index, id) in ordered_ids.iter().enumerate() {
                let order = i64::try_from(index)
                    .map_err(|_| RepoError::InvalidData(format!("order index overflow: {index}")))?;
                updated += stmt.execute(params![id, order, now, user_id])?;
            }
            Ok(updated)
        })?;

        log::info!(
            "event=task_reorder module=repo status=ok user_id={user_id} requested={} updated={updated}",
            ordered_ids.len()
        );
        Ok(updated)
    }

    fn delete(&self, id: EntityId) -> RepoResult<()> {
        self.db.write(TASK_TABLES, |conn| {
            let changed = conn.execute("DELETE FROM tasks WHERE id = ?1;", params![id])?;
            if changed == 0 {
                return Err(RepoError::NotFound { entity: "task", id });
            }
            Ok(())
        })?;

        log::info!("event=task_delete module=repo status=ok task_id={id}");
        Ok(())
    }

    fn delete_all_for_user(&self, user_id: EntityId) -> RepoResult<usize> {
        self.db.write(TASK_TABLES, |conn| -> RepoResult<usize> {
            Ok(conn.execute("DELETE FROM tasks WHERE user_id = ?1;", params![user_id])?)
        })
    }

    fn observe(&self, user_id: EntityId, query: TaskQuery) -> LiveQuery<Vec<Task>> {
        LiveQuery::spawn(&self.db, TASK_TABLES, move |db| {
            db.read(|conn| list_tasks(conn, user_id, &query))
        })
    }

    fn observe_count(&self, user_id: EntityId, query: TaskQuery) -> LiveQuery<i64> {
        LiveQuery::spawn(&self.db, TASK_TABLES, move |db| {
            db.read(|conn| count_tasks(conn, user_id, &query))
        })
    }
}

fn load_task(conn: &Connection, id: EntityId, owner: Option<EntityId>) -> RepoResult<Option<Task>> {
    let task = match owner {
        Some(user_id) => {
            let sql = format!("{TASK_SELECT_SQL} WHERE id = ?1 AND user_id = ?2;");
            conn.query_row(&sql, params![id, user_id], parse_task_row)
                .optional()?
        }
        None => {
            let sql = format!("{TASK_SELECT_SQL} WHERE id = ?1;");
            conn.query_row(&sql, params![id], parse_task_row)
                .optional()?
        }
    };
    Ok(task)
}

/// Builds the shared `WHERE` clause for listings and counts.
fn task_filter_sql(user_id: EntityId, query: &TaskQuery) -> (String, Vec<Value>) {
    let mut sql = String::from(" WHERE user_id = ?");
    let mut bind_values = vec![Value::Integer(user_id)];

    if let Some(status) = query.status {
        sql.push_str(" AND status = ?");
        bind_values.push(Value::Text(status.as_db_str().to_string()));
    }
    if let Some(category_id) = query.category_id {
        sql.push_str(" AND category_id = ?");
        bind_values.push(Value::Integer(category_id));
    }
    if let Some((start, end)) = query.due_between {
        sql.push_str(" AND due_date IS NOT NULL AND due_date BETWEEN ? AND ?");
        bind_values.push(Value::Integer(start));
        bind_values.push(Value::Integer(end));
    }

    (sql, bind_values)
}

fn list_tasks(conn: &Connection, user_id: EntityId, query: &TaskQuery) -> RepoResult<Vec<Task>> {
    let (filter_sql, bind_values) = task_filter_sql(user_id, query);
    let sql = format!(
        "{TASK_SELECT_SQL}{filter_sql} ORDER BY {};",
        query.sort.order_by_sql()
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut tasks = Vec::new();
    while let Some(row) = rows.next()? {
        tasks.push(parse_task_row(row)?);
    }
    Ok(tasks)
}

fn count_tasks(conn: &Connection, user_id: EntityId, query: &TaskQuery) -> RepoResult<i64> {
    let (filter_sql, bind_values) = task_filter_sql(user_id, query);
    let sql = format!("SELECT COUNT(*) FROM tasks{filter_sql};");
    Ok(conn.query_row(&sql, params_from_iter(bind_values), |row| row.get(0))?)
}

fn parse_task_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let priority: String = row.get("priority")?;
    let status: String = row.get("status")?;
    let tags: String = row.get("tags")?;

    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        due_date: row.get("due_date")?,
        priority: Priority::from_db_str(&priority),
        status: TaskStatus::from_db_str(&status),
        category_id: row.get("category_id")?,
        user_id: row.get("user_id")?,
        order: row.get("order")?,
        tags: decode_tags(&tags),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
