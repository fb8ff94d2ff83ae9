//! Derived read-only views over the current profile's tasks and categories.
//!
//! # Responsibility
//! - Join categories with task counts and tasks with their category.
//! - Compute completion statistics and the per-category distribution.
//!
//! # Invariants
//! - Every view recomputes whenever either upstream listing emits.
//! - An empty task set yields `Empty`, never NaN.
//! - Tasks without a resolvable category count as [`UNCATEGORIZED_LABEL`].

use super::category_service::CategoryService;
use super::session::Session;
use super::task_service::TaskService;
use super::ServiceResult;
use crate::live::{combine_latest, LiveQuery, Snapshot};
use crate::model::category::Category;
use crate::model::task::Task;
use crate::model::EntityId;
use crate::repo::category_repo::{CategoryRepository, ParentFilter, SqliteCategoryRepository};
use crate::repo::task_repo::{SqliteTaskRepository, TaskQuery, TaskRepository};
use std::collections::HashMap;

/// Distribution label for tasks without a known category.
pub const UNCATEGORIZED_LABEL: &str = "Uncategorized";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryWithTaskCount {
    pub category: Category,
    pub task_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskWithCategory {
    pub task: Task,
    /// `None` when the task has no category or it is not visible.
    pub category: Option<Category>,
}

/// Completion figures for a non-empty task set.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskStatistics {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    /// In `0.0..=1.0`.
    pub completion_rate: f64,
    /// `(label, count)` sorted by count descending, then label ascending.
    pub category_distribution: Vec<(String, usize)>,
}

/// Statistics computed from a task snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum StatisticsState {
    /// No tasks: there is nothing to report.
    Empty,
    Ready(TaskStatistics),
}

/// Caller-facing statistics state, including the pre-data and failure cases.
#[derive(Debug, Clone, PartialEq)]
pub enum StatisticsView {
    Loading,
    Empty,
    Ready(TaskStatistics),
    Error(String),
}

impl StatisticsView {
    /// Maps an optional live snapshot onto a view state.
    pub fn from_snapshot(snapshot: Option<&Snapshot<StatisticsState>>) -> Self {
        match snapshot {
            None => Self::Loading,
            Some(Err(message)) => Self::Error(message.clone()),
            Some(Ok(state)) => match state.as_ref() {
                StatisticsState::Empty => Self::Empty,
                StatisticsState::Ready(stats) => Self::Ready(stats.clone()),
            },
        }
    }
}

/// Counts tasks per category, keeping category order.
pub fn category_task_counts(categories: &[Category], tasks: &[Task]) -> Vec<CategoryWithTaskCount> {
    let mut counts: HashMap<EntityId, usize> = HashMap::new();
    for category_id in tasks.iter().filter_map(|task| task.category_id) {
        *counts.entry(category_id).or_default() += 1;
    }

    categories
        .iter()
        .map(|category| CategoryWithTaskCount {
            category: category.clone(),
            task_count: counts.get(&category.id).copied().unwrap_or(0),
        })
        .collect()
}

/// Pairs each task with its category, keeping task order.
pub fn join_tasks_with_categories(tasks: &[Task], categories: &[Category]) -> Vec<TaskWithCategory> {
    let by_id: HashMap<EntityId, &Category> = categories
        .iter()
        .map(|category| (category.id, category))
        .collect();

    tasks
        .iter()
        .map(|task| TaskWithCategory {
            task: task.clone(),
            category: task
                .category_id
                .and_then(|id| by_id.get(&id))
                .map(|category| (*category).clone()),
        })
        .collect()
}

/// Computes completion rate and category distribution.
pub fn compute_statistics(tasks: &[Task], categories: &[Category]) -> StatisticsState {
    if tasks.is_empty() {
        return StatisticsState::Empty;
    }

    let names: HashMap<EntityId, &str> = categories
        .iter()
        .map(|category| (category.id, category.name.as_str()))
        .collect();

    let mut distribution: HashMap<&str, usize> = HashMap::new();
    let mut completed_tasks = 0;
    for task in tasks {
        if task.is_completed() {
            completed_tasks += 1;
        }
        let label = task
            .category_id
            .and_then(|id| names.get(&id).copied())
            .unwrap_or(UNCATEGORIZED_LABEL);
        *distribution.entry(label).or_default() += 1;
    }

    let mut category_distribution: Vec<(String, usize)> = distribution
        .into_iter()
        .map(|(label, count)| (label.to_string(), count))
        .collect();
    category_distribution.sort_by(|(left_label, left), (right_label, right)| {
        right.cmp(left).then_with(|| left_label.cmp(right_label))
    });

    let total_tasks = tasks.len();
    StatisticsState::Ready(TaskStatistics {
        total_tasks,
        completed_tasks,
        completion_rate: completed_tasks as f64 / total_tasks as f64,
        category_distribution,
    })
}

/// Live aggregation views over the current profile.
#[derive(Clone)]
pub struct StatsService<T = SqliteTaskRepository, C = SqliteCategoryRepository>
where
    T: TaskRepository,
    C: CategoryRepository,
{
    tasks: TaskService<T>,
    categories: CategoryService<C>,
}

impl StatsService {
    /// Builds a service over the session's store.
    pub fn from_session(session: &Session) -> Self {
        Self::new(
            TaskService::from_session(session),
            CategoryService::from_session(session),
        )
    }
}

impl<T, C> StatsService<T, C>
where
    T: TaskRepository + Clone + Send + Sync + 'static,
    C: CategoryRepository + Clone + Send + Sync + 'static,
{
    pub fn new(tasks: TaskService<T>, categories: CategoryService<C>) -> Self {
        Self { tasks, categories }
    }

    /// One-shot statistics for the current profile.
    pub fn statistics(&self) -> ServiceResult<StatisticsState> {
        let tasks = self.tasks.list_tasks(&TaskQuery::all())?;
        let categories = self.categories.list_categories(ParentFilter::Any)?;
        Ok(compute_statistics(&tasks, &categories))
    }

    /// One-shot category listing with task counts.
    pub fn categories_with_task_count(&self) -> ServiceResult<Vec<CategoryWithTaskCount>> {
        let categories = self.categories.list_categories(ParentFilter::Any)?;
        let tasks = self.tasks.list_tasks(&TaskQuery::all())?;
        Ok(category_task_counts(&categories, &tasks))
    }

    pub fn observe_statistics(&self) -> LiveQuery<StatisticsState> {
        combine_latest(
            &self.tasks.observe_all_tasks(),
            &self.categories.observe_all_categories(),
            |tasks: &Vec<Task>, categories: &Vec<Category>| compute_statistics(tasks, categories),
        )
    }

    pub fn observe_categories_with_task_count(&self) -> LiveQuery<Vec<CategoryWithTaskCount>> {
        combine_latest(
            &self.categories.observe_all_categories(),
            &self.tasks.observe_all_tasks(),
            |categories: &Vec<Category>, tasks: &Vec<Task>| category_task_counts(categories, tasks),
        )
    }

    pub fn observe_tasks_with_category(&self, query: TaskQuery) -> LiveQuery<Vec<TaskWithCategory>> {
        combine_latest(
            &self.tasks.observe_tasks(query),
            &self.categories.observe_all_categories(),
            |tasks: &Vec<Task>, categories: &Vec<Category>| {
                join_tasks_with_categories(tasks, categories)
            },
        )
    }
}
