use taskplanner_core::{
    Category, CategoryRepository, Database, Priority, RepoError, SqliteCategoryRepository,
    SqliteTaskRepository, Task, TaskQuery, TaskRepository, TaskSort, TaskStatus, ValidationError,
};

const OWNER: i64 = 1;

fn setup() -> (Database, SqliteTaskRepository) {
    let db = Database::open_in_memory().unwrap();
    let repo = SqliteTaskRepository::new(&db);
    (db, repo)
}

fn task(title: &str, order: i64) -> Task {
    let mut task = Task::new(title);
    task.user_id = OWNER;
    task.order = order;
    task
}

fn titles(tasks: &[Task]) -> Vec<&str> {
    tasks.iter().map(|task| task.title.as_str()).collect()
}

#[test]
fn insert_and_read_back_round_trips_fields() {
    let (_db, repo) = setup();
    let mut original = task("Ship release", 4);
    original.description = "tag and publish".to_string();
    original.due_date = Some(1_700_000_000_000);
    original.priority = Priority::High;
    original.status = TaskStatus::InProgress;
    original.tags = vec!["work".to_string(), "urgent".to_string()];

    let id = repo.insert(&original).unwrap();
    let loaded = repo.get_by_id(id).unwrap().unwrap();

    assert_eq!(loaded.id, id);
    assert_eq!(loaded.title, original.title);
    assert_eq!(loaded.description, original.description);
    assert_eq!(loaded.due_date, original.due_date);
    assert_eq!(loaded.priority, Priority::High);
    assert_eq!(loaded.status, TaskStatus::InProgress);
    assert_eq!(loaded.category_id, None);
    assert_eq!(loaded.user_id, OWNER);
    assert_eq!(loaded.order, 4);
    assert_eq!(loaded.tags, original.tags);
    assert_eq!(loaded.created_at, original.created_at);
}

#[test]
fn blank_title_is_rejected() {
    let (_db, repo) = setup();
    let err = repo.insert(&task("   ", 0)).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ValidationError::BlankTitle)
    ));
}

#[test]
fn default_listing_orders_by_manual_order() {
    let (_db, repo) = setup();
    repo.insert(&task("three", 3)).unwrap();
    repo.insert(&task("one", 1)).unwrap();
    repo.insert(&task("two", 2)).unwrap();

    let tasks = repo.list(OWNER, &TaskQuery::all()).unwrap();
    assert_eq!(titles(&tasks), vec!["one", "two", "three"]);
}

#[test]
fn equal_order_falls_back_to_due_date_with_undated_last() {
    let (_db, repo) = setup();
    let undated = task("undated", 0);
    let mut late = task("late", 0);
    late.due_date = Some(2_000);
    let mut early = task("early", 0);
    early.due_date = Some(1_000);
    repo.insert(&undated).unwrap();
    repo.insert(&late).unwrap();
    repo.insert(&early).unwrap();

    let tasks = repo.list(OWNER, &TaskQuery::all()).unwrap();
    assert_eq!(titles(&tasks), vec!["early", "late", "undated"]);
}

#[test]
fn explicit_sorts_override_manual_order() {
    let (_db, repo) = setup();
    let mut low = task("bravo", 0);
    low.priority = Priority::Low;
    low.due_date = Some(3_000);
    let mut high = task("Alpha", 1);
    high.priority = Priority::High;
    high.due_date = Some(1_000);
    let mut medium = task("charlie", 2);
    medium.due_date = None;
    repo.insert(&low).unwrap();
    repo.insert(&high).unwrap();
    repo.insert(&medium).unwrap();

    let by = |sort: TaskSort| -> Vec<String> {
        repo.list(OWNER, &TaskQuery::all().sorted(sort))
            .unwrap()
            .into_iter()
            .map(|task| task.title)
            .collect()
    };

    assert_eq!(by(TaskSort::PriorityDesc), vec!["Alpha", "charlie", "bravo"]);
    assert_eq!(by(TaskSort::PriorityAsc), vec!["bravo", "charlie", "Alpha"]);
    assert_eq!(by(TaskSort::DueDateAsc), vec!["Alpha", "bravo", "charlie"]);
    assert_eq!(by(TaskSort::DueDateDesc), vec!["bravo", "Alpha", "charlie"]);
    assert_eq!(by(TaskSort::TitleAsc), vec!["Alpha", "bravo", "charlie"]);
    assert_eq!(by(TaskSort::TitleDesc), vec!["charlie", "bravo", "Alpha"]);
}

#[test]
fn filters_combine_and_stay_within_owner() {
    let (db, repo) = setup();
    let categories = SqliteCategoryRepository::new(&db);
    let mut work = Category::new("Work", 0xFF00_00FF, "briefcase");
    work.user_id = OWNER;
    let work_id = categories.insert(&work).unwrap();

    let mut done = task("done", 0);
    done.status = TaskStatus::Completed;
    done.category_id = Some(work_id);
    done.due_date = Some(500);
    let mut open = task("open", 1);
    open.category_id = Some(work_id);
    open.due_date = Some(1_500);
    let mut foreign = task("foreign", 2);
    foreign.user_id = OWNER + 1;
    foreign.status = TaskStatus::Completed;
    repo.insert(&done).unwrap();
    repo.insert(&open).unwrap();
    repo.insert(&foreign).unwrap();

    let completed = repo
        .list(OWNER, &TaskQuery::by_status(TaskStatus::Completed))
        .unwrap();
    assert_eq!(titles(&completed), vec!["done"]);

    let in_work = repo.list(OWNER, &TaskQuery::by_category(work_id)).unwrap();
    assert_eq!(titles(&in_work), vec!["done", "open"]);

    let in_range = repo.list(OWNER, &TaskQuery::by_due_range(1_000, 1_500)).unwrap();
    assert_eq!(titles(&in_range), vec!["open"]);

    let combined = TaskQuery {
        status: Some(TaskStatus::Todo),
        category_id: Some(work_id),
        ..TaskQuery::default()
    };
    assert_eq!(repo.count(OWNER, &combined).unwrap(), 1);
    assert_eq!(repo.count(OWNER, &TaskQuery::all()).unwrap(), 2);
    assert_eq!(repo.count(OWNER + 1, &TaskQuery::all()).unwrap(), 1);
}

#[test]
fn update_and_set_status_report_missing_rows() {
    let (_db, repo) = setup();
    let id = repo.insert(&task("draft", 0)).unwrap();

    let mut edited = repo.get_by_id(id).unwrap().unwrap();
    edited.title = "final".to_string();
    edited.priority = Priority::Low;
    repo.update(&edited).unwrap();
    repo.set_status(id, TaskStatus::Completed).unwrap();

    let loaded = repo.get_by_id(id).unwrap().unwrap();
    assert_eq!(loaded.title, "final");
    assert_eq!(loaded.priority, Priority::Low);
    assert!(loaded.is_completed());

    let mut missing = edited.clone();
    missing.id = 9_999;
    assert!(matches!(
        repo.update(&missing).unwrap_err(),
        RepoError::NotFound { entity: "task", .. }
    ));
    assert!(matches!(
        repo.set_status(9_999, TaskStatus::Todo).unwrap_err(),
        RepoError::NotFound { .. }
    ));
    assert!(matches!(
        repo.delete(9_999).unwrap_err(),
        RepoError::NotFound { .. }
    ));
}

#[test]
fn reorder_assigns_positions_for_owned_tasks_only() {
    let (_db, repo) = setup();
    let a = repo.insert(&task("a", 0)).unwrap();
    let b = repo.insert(&task("b", 1)).unwrap();
    let c = repo.insert(&task("c", 2)).unwrap();
    let mut other = task("other", 0);
    other.user_id = OWNER + 1;
    let foreign = repo.insert(&other).unwrap();

    let updated = repo.reorder(OWNER, &[c, foreign, a, b]).unwrap();
    assert_eq!(updated, 3);

    let tasks = repo.list(OWNER, &TaskQuery::all()).unwrap();
    assert_eq!(titles(&tasks), vec!["c", "a", "b"]);
    assert_eq!(repo.get_by_id(foreign).unwrap().unwrap().order, 0);
}

#[test]
fn next_order_appends_after_existing_tasks() {
    let (_db, repo) = setup();
    assert_eq!(repo.next_order(OWNER).unwrap(), 0);
    repo.insert(&task("a", 7)).unwrap();
    repo.insert(&task("b", 3)).unwrap();
    assert_eq!(repo.next_order(OWNER).unwrap(), 8);
    assert_eq!(repo.next_order(OWNER + 1).unwrap(), 0);
}

#[test]
fn unknown_enum_values_and_bad_tags_decode_to_defaults() {
    let (db, repo) = setup();
    let id = repo.insert(&task("legacy", 0)).unwrap();
    db.read(|conn| {
        conn.execute(
            "UPDATE tasks SET priority = 'URGENT', status = 'ARCHIVED', tags = '{oops' WHERE id = ?1;",
            [id],
        )
    })
    .unwrap();

    let loaded = repo.get_by_id(id).unwrap().unwrap();
    assert_eq!(loaded.priority, Priority::Medium);
    assert_eq!(loaded.status, TaskStatus::Todo);
    assert!(loaded.tags.is_empty());
}

#[test]
fn dangling_category_reference_is_rejected() {
    let (_db, repo) = setup();
    let mut orphan = task("orphan", 0);
    orphan.category_id = Some(4_242);

    let err = repo.insert(&orphan).unwrap_err();
    assert!(matches!(err, RepoError::InvalidReference(_)));
}

#[test]
fn delete_all_for_user_keeps_other_owners() {
    let (_db, repo) = setup();
    repo.insert(&task("mine", 0)).unwrap();
    repo.insert(&task("also mine", 1)).unwrap();
    let mut other = task("theirs", 0);
    other.user_id = OWNER + 1;
    repo.insert(&other).unwrap();

    assert_eq!(repo.delete_all_for_user(OWNER).unwrap(), 2);
    assert!(repo.list(OWNER, &TaskQuery::all()).unwrap().is_empty());
    assert_eq!(repo.list(OWNER + 1, &TaskQuery::all()).unwrap().len(), 1);
}

#[test]
fn upsert_with_id_of_another_owner_is_not_found() {
    let (_db, repo) = setup();
    let id = repo.insert(&task("mine", 0)).unwrap();

    let mut intruder = task("theirs", 0);
    intruder.id = id;
    intruder.user_id = OWNER + 1;
    assert!(matches!(
        repo.insert(&intruder).unwrap_err(),
        RepoError::NotFound { entity: "task", id: missing } if missing == id
    ));

    let stored = repo.get_by_id(id).unwrap().unwrap();
    assert_eq!(stored.user_id, OWNER);
    assert_eq!(stored.title, "mine");
    assert!(repo.list(OWNER + 1, &TaskQuery::all()).unwrap().is_empty());
}
