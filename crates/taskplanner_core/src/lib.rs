//! Core data layer for the task planner.
//! This crate is the single source of truth for profile, category and task
//! invariants.

pub mod config;
pub mod db;
pub mod live;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use db::{Database, DbError, DbResult};
pub use live::{combine_latest, LiveQuery, Snapshot, Subscription};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::category::Category;
pub use model::task::{Priority, Task, TaskStatus};
pub use model::user::User;
pub use model::{EntityId, ValidationError};
pub use repo::category_repo::{CategoryRepository, ParentFilter, SqliteCategoryRepository};
pub use repo::task_repo::{SqliteTaskRepository, TaskQuery, TaskRepository, TaskSort};
pub use repo::user_repo::{SqliteUserRepository, UserRepository};
pub use repo::{RepoError, RepoResult};
pub use service::category_service::CategoryService;
pub use service::profile_service::ProfileService;
pub use service::session::{ProfileState, Session};
pub use service::stats_service::{
    CategoryWithTaskCount, StatisticsState, StatisticsView, StatsService, TaskStatistics,
    TaskWithCategory, UNCATEGORIZED_LABEL,
};
pub use service::task_service::TaskService;
pub use service::{
    insert_id_or_sentinel, ErrorKind, ServiceError, ServiceResult, NO_ACTIVE_PROFILE_ID,
};

/// Minimal health-check API for smoke runs.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
