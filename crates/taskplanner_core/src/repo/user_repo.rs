//! User repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist profile records and answer profile lookups.
//! - Own the current-profile switch transaction.
//!
//! # Invariants
//! - At most one row has `is_current = 1` after any committed write.
//! - Emails are unique ignoring ASCII case.
//! - `avatar_initial` is re-derived from `name` on every write.

use super::{bool_to_int, color_from_db, id_param, int_to_bool, RepoError, RepoResult};
use crate::db::Database;
use crate::live::{LiveQuery, Table};
use crate::model::user::{derive_avatar_initial, User};
use crate::model::{now_epoch_ms, EntityId};
use rusqlite::{params, Connection, OptionalExtension, Row};

const USER_TABLES: &[Table] = &[Table::Users];

const USER_SELECT_SQL: &str = "SELECT
    id,
    email,
    name,
    avatar_color,
    avatar_initial,
    is_current,
    last_used,
    created_at,
    updated_at
FROM users";

const USER_UPSERT_SQL: &str = "INSERT INTO users (
    id,
    email,
    name,
    avatar_color,
    avatar_initial,
    is_current,
    last_used,
    created_at,
    updated_at
)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
ON CONFLICT(id) DO UPDATE SET
    email = excluded.email,
    name = excluded.name,
    avatar_color = excluded.avatar_color,
    avatar_initial = excluded.avatar_initial,
    is_current = excluded.is_current,
    last_used = excluded.last_used,
    created_at = excluded.created_at,
    updated_at = excluded.updated_at
RETURNING id;";

/// Default number of profiles returned by recent-profile listings.
pub const RECENT_PROFILE_LIMIT: u32 = 5;

/// Repository interface for profile records.
pub trait UserRepository {
    /// Loads one user by id.
    fn get_by_id(&self, id: EntityId) -> RepoResult<Option<User>>;
    /// Loads one user by email, ignoring case.
    fn get_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    /// Loads the user flagged current, if any.
    fn get_current(&self) -> RepoResult<Option<User>>;
    /// Lists all users, most recently used first.
    fn list_all(&self) -> RepoResult<Vec<User>>;
    /// Lists at most `limit` users, most recently used first.
    fn list_recent(&self, limit: u32) -> RepoResult<Vec<User>>;
    /// Checks whether any user other than `exclude_id` owns `email`.
    fn is_email_taken(&self, email: &str, exclude_id: EntityId) -> RepoResult<bool>;
    /// Inserts or replaces a user and returns its id.
    fn insert(&self, user: &User) -> RepoResult<EntityId>;
    /// Updates an existing user by id.
    fn update(&self, user: &User) -> RepoResult<()>;
    /// Deletes one user by id.
    fn delete(&self, id: EntityId) -> RepoResult<()>;
    /// Deletes every user and returns how many rows were removed.
    fn delete_all(&self) -> RepoResult<usize>;
    /// Makes `id` the only current user and stamps `last_used`.
    fn set_current(&self, id: EntityId) -> RepoResult<User>;
    /// Inserts a user and makes it current in one transaction.
    fn insert_current(&self, user: &User) -> RepoResult<User>;
    /// Live list of all users.
    fn observe_all(&self) -> LiveQuery<Vec<User>>;
    /// Live list of the most recently used users.
    fn observe_recent(&self, limit: u32) -> LiveQuery<Vec<User>>;
    /// Live current user.
    fn observe_current(&self) -> LiveQuery<Option<User>>;
}

/// SQLite-backed user repository.
#[derive(Clone)]
pub struct SqliteUserRepository {
    db: Database,
}

impl SqliteUserRepository {
    pub fn new(db: &Database) -> Self {
        Self { db: db.clone() }
    }
}

impl UserRepository for SqliteUserRepository {
    fn get_by_id(&self, id: EntityId) -> RepoResult<Option<User>> {
        self.db.read(|conn| load_user(conn, id))
    }

    fn get_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let email = email.trim();
        self.db.read(|conn| {
            let sql = format!("{USER_SELECT_SQL} WHERE email = ?1;");
            let user = conn
                .query_row(&sql, params![email], parse_user_row)
                .optional()?;
            user.transpose()
        })
    }

    fn get_current(&self) -> RepoResult<Option<User>> {
        self.db.read(load_current)
    }

    fn list_all(&self) -> RepoResult<Vec<User>> {
        self.db.read(|conn| list_users(conn, None))
    }

    fn list_recent(&self, limit: u32) -> RepoResult<Vec<User>> {
        self.db.read(|conn| list_users(conn, Some(limit)))
    }

    fn is_email_taken(&self, email: &str, exclude_id: EntityId) -> RepoResult<bool> {
        let email = email.trim();
        self.db.read(|conn| {
            let taken: i64 = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1 AND id != ?2);",
                params![email, exclude_id],
                |row| row.get(0),
            )?;
            Ok(taken == 1)
        })
    }

    fn insert(&self, user: &User) -> RepoResult<EntityId> {
        user.validate()?;
        let now = now_epoch_ms();
        let id = self
            .db
            .write(USER_TABLES, |conn| upsert_user(conn, user, now))?;

        log::info!("event=user_insert module=repo status=ok user_id={id}");
        Ok(id)
    }

    fn update(&self, user: &User) -> RepoResult<()> {
        user.validate()?;
        let now = now_epoch_ms();
        self.db.write(USER_TABLES, |conn| {
            let changed = conn.execute(
                "UPDATE users
                 SET
                    email = ?2,
                    name = ?3,
                    avatar_color = ?4,
                    avatar_initial = ?5,
                    is_current = ?6,
                    last_used = ?7,
                    updated_at = ?8
                 WHERE id = ?1;",
                params![
                    user.id,
                    user.email.trim(),
                    user.name.trim(),
                    i64::from(user.avatar_color),
                    derive_avatar_initial(&user.name),
                    bool_to_int(user.is_current),
                    user.last_used,
                    now,
                ],
            )?;
            if changed == 0 {
                return Err(RepoError::NotFound {
                    entity: "user",
                    id: user.id,
                });
            }
            Ok(())
        })
    }

    fn delete(&self, id: EntityId) -> RepoResult<()> {
        self.db.write(USER_TABLES, |conn| {
            let changed = conn.execute("DELETE FROM users WHERE id = ?1;", params![id])?;
            if changed == 0 {
                return Err(RepoError::NotFound { entity: "user", id });
            }
            Ok(())
        })?;

        log::info!("event=user_delete module=repo status=ok user_id={id}");
        Ok(())
    }

    fn delete_all(&self) -> RepoResult<usize> {
        self.db.write(USER_TABLES, |conn| -> RepoResult<usize> {
            Ok(conn.execute("DELETE FROM users;", [])?)
        })
    }

    fn set_current(&self, id: EntityId) -> RepoResult<User> {
        let now = now_epoch_ms();
        let user = self
            .db
            .write(USER_TABLES, |conn| mark_current(conn, id, now))?;

        log::info!("event=user_set_current module=repo status=ok user_id={id}");
        Ok(user)
    }

    fn insert_current(&self, user: &User) -> RepoResult<User> {
        user.validate()?;
        let now = now_epoch_ms();
        // The flag is set by `mark_current` after the old one is cleared.
        let mut pending = user.clone();
        pending.is_current = false;
        let user = self.db.write(USER_TABLES, |conn| -> RepoResult<User> {
            let id = upsert_user(conn, &pending, now)?;
            mark_current(conn, id, now)
        })?;

        log::info!(
            "event=user_insert_current module=repo status=ok user_id={}",
            user.id
        );
        Ok(user)
    }

    fn observe_all(&self) -> LiveQuery<Vec<User>> {
        LiveQuery::spawn(&self.db, USER_TABLES, |db| {
            db.read(|conn| list_users(conn, None))
        })
    }

    fn observe_recent(&self, limit: u32) -> LiveQuery<Vec<User>> {
        LiveQuery::spawn(&self.db, USER_TABLES, move |db| {
            db.read(|conn| list_users(conn, Some(limit)))
        })
    }

    fn observe_current(&self) -> LiveQuery<Option<User>> {
        LiveQuery::spawn(&self.db, USER_TABLES, |db| db.read(load_current))
    }
}

fn upsert_user(conn: &Connection, user: &User, now: i64) -> RepoResult<EntityId> {
    let id = conn.query_row(
        USER_UPSERT_SQL,
        params![
            id_param(user.id),
            user.email.trim(),
            user.name.trim(),
            i64::from(user.avatar_color),
            derive_avatar_initial(&user.name),
            bool_to_int(user.is_current),
            user.last_used,
            user.created_at,
            now,
        ],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Clears every current flag, then flags `id` and stamps `last_used`.
fn mark_current(conn: &Connection, id: EntityId, now: i64) -> RepoResult<User> {
    let previous = load_current(conn)?;
    conn.execute("UPDATE users SET is_current = 0 WHERE is_current = 1;", [])?;
    if let Some(previous) = previous.as_ref() {
        conn.execute(
            "UPDATE users SET is_current = 0, updated_at = ?2 WHERE id = ?1;",
            params![previous.id, now],
        )?;
    }

    let changed = conn.execute(
        "UPDATE users
         SET is_current = 1, last_used = ?2, updated_at = ?2
         WHERE id = ?1;",
        params![id, now],
    )?;
    if changed == 0 {
        return Err(RepoError::NotFound { entity: "user", id });
    }

    load_user(conn, id)?.ok_or(RepoError::NotFound { entity: "user", id })
}

fn load_user(conn: &Connection, id: EntityId) -> RepoResult<Option<User>> {
    let sql = format!("{USER_SELECT_SQL} WHERE id = ?1;");
    let user = conn
        .query_row(&sql, params![id], parse_user_row)
        .optional()?;
    user.transpose()
}

fn load_current(conn: &Connection) -> RepoResult<Option<User>> {
    let sql = format!("{USER_SELECT_SQL} WHERE is_current = 1 ORDER BY id ASC LIMIT 1;");
    let user = conn.query_row(&sql, [], parse_user_row).optional()?;
    user.transpose()
}

fn list_users(conn: &Connection, limit: Option<u32>) -> RepoResult<Vec<User>> {
    let mut sql = format!("{USER_SELECT_SQL} ORDER BY last_used DESC, id DESC");
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    sql.push(';');

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    let mut users = Vec::new();
    while let Some(row) = rows.next()? {
        users.push(parse_user_row(row)??);
    }
    Ok(users)
}

fn parse_user_row(row: &Row<'_>) -> rusqlite::Result<RepoResult<User>> {
    let avatar_color: i64 = row.get("avatar_color")?;
    let is_current: i64 = row.get("is_current")?;

    let user = (|| -> RepoResult<User> {
        Ok(User {
            id: row.get("id")?,
            email: row.get("email")?,
            name: row.get("name")?,
            avatar_color: color_from_db(avatar_color, "users.avatar_color")?,
            avatar_initial: row.get("avatar_initial")?,
            is_current: int_to_bool(is_current, "users.is_current")?,
            last_used: row.get("last_used")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    })();
    Ok(user)
}
