//! Shared store handle over one migrated SQLite connection.
//!
//! # Responsibility
//! - Own the single connection used by every repository.
//! - Run each mutation inside one IMMEDIATE transaction.
//! - Publish exactly one change notice per committed mutation.
//!
//! # Invariants
//! - Readers and writers are serialized by the connection mutex, so
//!   conflicting writes to one record resolve as last-commit-wins. A write
//!   waits for any in-flight read, including live-query evaluations.
//! - Notices are published after the connection lock is released, so
//!   notice delivery never holds up the writer.

use super::open::{open_connection, open_connection_in_memory};
use super::DbResult;
use crate::config::{CoreConfig, DEFAULT_CHANGE_BUFFER};
use crate::live::bus::{Change, ChangeBus, Table};
use parking_lot::Mutex;
use rusqlite::{Connection, TransactionBehavior};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Cheaply cloneable handle to the task planner store.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

struct DatabaseInner {
    conn: Mutex<Connection>,
    changes: ChangeBus,
    change_buffer: usize,
}

impl Database {
    /// Opens (or creates) a database file with all migrations applied.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::from_connection(
            open_connection(path)?,
            DEFAULT_CHANGE_BUFFER,
        ))
    }

    /// Opens a private in-memory database with all migrations applied.
    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::from_connection(
            open_connection_in_memory()?,
            DEFAULT_CHANGE_BUFFER,
        ))
    }

    /// Opens the store described by `config`.
    ///
    /// `db_path = None` selects an in-memory database.
    pub fn open_with_config(config: &CoreConfig) -> DbResult<Self> {
        let conn = match config.db_path.as_ref() {
            Some(path) => open_connection(path)?,
            None => open_connection_in_memory()?,
        };
        Ok(Self::from_connection(conn, config.effective_change_buffer()))
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection, change_buffer: usize) -> Self {
        Self {
            inner: Arc::new(DatabaseInner {
                conn: Mutex::new(conn),
                changes: ChangeBus::new(change_buffer),
                change_buffer,
            }),
        }
    }

    /// Runs a read-only closure against the connection.
    ///
    /// Holds the connection lock for the duration of `f`.
    pub fn read<T, E>(&self, f: impl FnOnce(&Connection) -> Result<T, E>) -> Result<T, E> {
        let conn = self.inner.conn.lock();
        f(&*conn)
    }

    /// Runs `f` in one IMMEDIATE transaction and announces the commit.
    ///
    /// On error the transaction rolls back and nothing is published.
    pub fn write<T, E>(
        &self,
        tables: &'static [Table],
        f: impl FnOnce(&Connection) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<rusqlite::Error>,
    {
        let value = {
            let mut conn = self.inner.conn.lock();
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let value = f(&*tx)?;
            tx.commit()?;
            value
        };
        self.inner.changes.publish(Change::new(tables));
        Ok(value)
    }

    /// Capacity used for change notices and live-query snapshot channels.
    pub fn change_buffer(&self) -> usize {
        self.inner.change_buffer
    }

    /// Subscribes to committed-mutation notices.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<Change> {
        self.inner.changes.subscribe()
    }

    /// Number of open change subscriptions, including running live-query
    /// drivers.
    pub fn change_subscriber_count(&self) -> usize {
        self.inner.changes.receiver_count()
    }
}
