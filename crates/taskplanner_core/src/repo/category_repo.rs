//! Category repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist per-user categories with optional parent links.
//! - Provide root/child listings and counts.
//!
//! # Invariants
//! - Deleting a category nulls `parent_category_id` on children and
//!   `category_id` on tasks; neither is deleted.
//! - Listings are ordered by name (case-insensitive), then id.

use super::{bool_to_int, color_from_db, id_param, int_to_bool, RepoError, RepoResult};
use crate::db::Database;
use crate::live::{LiveQuery, Table};
use crate::model::category::Category;
use crate::model::{now_epoch_ms, EntityId};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

/// Tables a category listing depends on.
pub(crate) const CATEGORY_TABLES: &[Table] = &[Table::Categories];
/// Tables a category delete touches (`tasks.category_id` is nulled).
const CATEGORY_DELETE_TABLES: &[Table] = &[Table::Categories, Table::Tasks];

const CATEGORY_SELECT_SQL: &str = "SELECT
    id,
    name,
    color,
    icon,
    user_id,
    parent_category_id,
    is_shared,
    created_at,
    updated_at
FROM categories";

const CATEGORY_UPSERT_SQL: &str = "INSERT INTO categories (
    id,
    name,
    color,
    icon,
    user_id,
    parent_category_id,
    is_shared,
    created_at,
    updated_at
)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
ON CONFLICT(id) DO UPDATE SET
    name = excluded.name,
    color = excluded.color,
    icon = excluded.icon,
    user_id = excluded.user_id,
    parent_category_id = excluded.parent_category_id,
    is_shared = excluded.is_shared,
    created_at = excluded.created_at,
    updated_at = excluded.updated_at
WHERE categories.user_id = excluded.user_id
RETURNING id;";

/// Parent-link filter for category listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParentFilter {
    /// Every category of the user.
    #[default]
    Any,
    /// Categories without a parent.
    Root,
    /// Direct children of one category.
    ChildrenOf(EntityId),
}

/// Repository interface for category records.
pub trait CategoryRepository {
    /// Loads one category by id regardless of owner.
    fn get_by_id(&self, id: EntityId) -> RepoResult<Option<Category>>;
    /// Loads one category by id if `user_id` owns it.
    fn get_for_user(&self, user_id: EntityId, id: EntityId) -> RepoResult<Option<Category>>;
    /// Lists a user's categories matching `filter`.
    fn list(&self, user_id: EntityId, filter: ParentFilter) -> RepoResult<Vec<Category>>;
    /// Counts a user's categories.
    fn count(&self, user_id: EntityId) -> RepoResult<i64>;
    /// Inserts or replaces a category and returns its id.
    ///
    /// An id owned by another user yields `NotFound` instead of a replace.
    fn insert(&self, category: &Category) -> RepoResult<EntityId>;
    /// Updates an existing category by id.
    fn update(&self, category: &Category) -> RepoResult<()>;
    /// Deletes one category by id.
    fn delete(&self, id: EntityId) -> RepoResult<()>;
    /// Deletes every category owned by `user_id`.
    fn delete_all_for_user(&self, user_id: EntityId) -> RepoResult<usize>;
    /// Live listing of a user's categories.
    fn observe(&self, user_id: EntityId, filter: ParentFilter) -> LiveQuery<Vec<Category>>;
    /// Live category count for a user.
    fn observe_count(&self, user_id: EntityId) -> LiveQuery<i64>;
}

/// SQLite-backed category repository.
#[derive(Clone)]
pub struct SqliteCategoryRepository {
    db: Database,
}

impl SqliteCategoryRepository {
    pub fn new(db: &Database) -> Self {
        Self { db: db.clone() }
    }
}

impl CategoryRepository for SqliteCategoryRepository {
    fn get_by_id(&self, id: EntityId) -> RepoResult<Option<Category>> {
        self.db.read(|conn| load_category(conn, id, None))
    }

    fn get_for_user(&self, user_id: EntityId, id: EntityId) -> RepoResult<Option<Category>> {
        self.db.read(|conn| load_category(conn, id, Some(user_id)))
    }

    fn list(&self, user_id: EntityId, filter: ParentFilter) -> RepoResult<Vec<Category>> {
        self.db.read(|conn| list_categories(conn, user_id, filter))
    }

    fn count(&self, user_id: EntityId) -> RepoResult<i64> {
        self.db.read(|conn| count_categories(conn, user_id))
    }

    fn insert(&self, category: &Category) -> RepoResult<EntityId> {
        category.validate()?;
        let now = now_epoch_ms();
        let id = self
            .db
            .write(CATEGORY_TABLES, |conn| -> RepoResult<EntityId> {
                let id: Option<EntityId> = conn
                    .query_row(
                        CATEGORY_UPSERT_SQL,
                        params![
                            id_param(category.id),
                            category.name.trim(),
                            i64::from(category.color),
                            category.icon.trim(),
                            category.user_id,
                            category.parent_category_id,
                            bool_to_int(category.is_shared),
                            category.created_at,
                            now,
                        ],
                        |row| row.get(0),
                    )
                    .optional()?;
                id.ok_or(RepoError::NotFound {
                    entity: "category",
                    id: category.id,
                })
            })?;

        log::info!(
            "event=category_insert module=repo status=ok category_id={id} user_id={}",
            category.user_id
        );
        Ok(id)
    }

    fn update(&self, category: &Category) -> RepoResult<()> {
        category.validate()?;
        let now = now_epoch_ms();
        self.db.write(CATEGORY_TABLES, |conn| {
            let changed = conn.execute(
                "UPDATE categories
                 SET
                    name = ?2,
                    color = ?3,
                    icon = ?4,
                    user_id = ?5,
                    parent_category_id = ?6,
                    is_shared = ?7,
                    updated_at = ?8
                 WHERE id = ?1;",
                params![
                    category.id,
                    category.name.trim(),
                    i64::from(category.color),
                    category.icon.trim(),
                    category.user_id,
                    category.parent_category_id,
                    bool_to_int(category.is_shared),
                    now,
                ],
            )?;
            if changed == 0 {
                return Err(RepoError::NotFound {
                    entity: "category",
                    id: category.id,
                });
            }
            Ok(())
        })
    }

    fn delete(&self, id: EntityId) -> RepoResult<()> {
        self.db.write(CATEGORY_DELETE_TABLES, |conn| {
            let changed = conn.execute("DELETE FROM categories WHERE id = ?1;", params![id])?;
            if changed == 0 {
                return Err(RepoError::NotFound {
                    entity: "category",
                    id,
                });
            }
            Ok(())
        })?;

        log::info!("event=category_delete module=repo status=ok category_id={id}");
        Ok(())
    }

    fn delete_all_for_user(&self, user_id: EntityId) -> RepoResult<usize> {
        self.db
            .write(CATEGORY_DELETE_TABLES, |conn| -> RepoResult<usize> {
                Ok(conn.execute(
                    "DELETE FROM categories WHERE user_id = ?1;",
                    params![user_id],
                )?)
            })
    }

    fn observe(&self, user_id: EntityId, filter: ParentFilter) -> LiveQuery<Vec<Category>> {
        LiveQuery::spawn(&self.db, CATEGORY_TABLES, move |db| {
            db.read(|conn| list_categories(conn, user_id, filter))
        })
    }

    fn observe_count(&self, user_id: EntityId) -> LiveQuery<i64> {
        LiveQuery::spawn(&self.db, CATEGORY_TABLES, move |db| {
            db.read(|conn| count_categories(conn, user_id))
        })
    }
}

fn load_category(
    conn: &Connection,
    id: EntityId,
    owner: Option<EntityId>,
) -> RepoResult<Option<Category>> {
    let category = match owner {
        Some(user_id) => {
            let sql = format!("{CATEGORY_SELECT_SQL} WHERE id = ?1 AND user_id = ?2;");
            conn.query_row(&sql, params![id, user_id], parse_category_row)
                .optional()?
        }
        None => {
            let sql = format!("{CATEGORY_SELECT_SQL} WHERE id = ?1;");
            conn.query_row(&sql, params![id], parse_category_row)
                .optional()?
        }
    };
    category.transpose()
}

fn list_categories(
    conn: &Connection,
    user_id: EntityId,
    filter: ParentFilter,
) -> RepoResult<Vec<Category>> {
    let mut sql = format!("{CATEGORY_SELECT_SQL} WHERE user_id = ?");
    let mut bind_values = vec![Value::Integer(user_id)];

    match filter {
        ParentFilter::Any => {}
        ParentFilter::Root => sql.push_str(" AND parent_category_id IS NULL"),
        ParentFilter::ChildrenOf(parent_id) => {
            sql.push_str(" AND parent_category_id = ?");
            bind_values.push(Value::Integer(parent_id));
        }
    }
    sql.push_str(" ORDER BY name COLLATE NOCASE ASC, id ASC;");

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut categories = Vec::new();
    while let Some(row) = rows.next()? {
        categories.push(parse_category_row(row)??);
    }
    Ok(categories)
}

fn count_categories(conn: &Connection, user_id: EntityId) -> RepoResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM categories WHERE user_id = ?1;",
        params![user_id],
        |row| row.get(0),
    )?)
}

fn parse_category_row(row: &Row<'_>) -> rusqlite::Result<RepoResult<Category>> {
    let color: i64 = row.get("color")?;
    let is_shared: i64 = row.get("is_shared")?;

    let category = (|| -> RepoResult<Category> {
        Ok(Category {
            id: row.get("id")?,
            name: row.get("name")?,
            color: color_from_db(color, "categories.color")?,
            icon: row.get("icon")?,
            user_id: row.get("user_id")?,
            parent_category_id: row.get("parent_category_id")?,
            is_shared: int_to_bool(is_shared, "categories.is_shared")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    })();
    Ok(category)
}
