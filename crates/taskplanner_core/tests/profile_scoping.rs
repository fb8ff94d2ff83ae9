use taskplanner_core::{
    Category, CategoryService, Database, ErrorKind, ParentFilter, ProfileService, ServiceError,
    Session, Task, TaskQuery, TaskService, TaskStatus, NO_ACTIVE_PROFILE_ID,
};

fn setup() -> (Database, Session, ProfileService, TaskService) {
    let db = Database::open_in_memory().unwrap();
    let session = Session::open(&db).unwrap();
    let profiles = ProfileService::new(&session);
    let tasks = TaskService::from_session(&session);
    (db, session, profiles, tasks)
}

#[test]
fn no_profile_reads_are_empty_and_writes_fail() {
    let (_db, session, _profiles, tasks) = setup();
    let categories = CategoryService::from_session(&session);

    assert!(tasks.list_tasks(&TaskQuery::all()).unwrap().is_empty());
    assert_eq!(tasks.count_tasks(&TaskQuery::all()).unwrap(), 0);
    assert!(tasks.get_task(1).unwrap().is_none());
    assert!(categories.list_categories(ParentFilter::Any).unwrap().is_empty());

    assert_eq!(
        tasks.insert_task_or_sentinel(&Task::new("orphan")).unwrap(),
        NO_ACTIVE_PROFILE_ID
    );
    assert!(matches!(
        tasks.insert_task(&Task::new("orphan")).unwrap_err(),
        ServiceError::NoActiveProfile
    ));
    assert_eq!(
        categories
            .insert_category_or_sentinel(&Category::new("Work", 0, "folder"))
            .unwrap(),
        NO_ACTIVE_PROFILE_ID
    );
    assert_eq!(
        tasks.delete_all_tasks().unwrap_err().kind(),
        ErrorKind::NoActiveProfile
    );
    assert_eq!(tasks.reorder(&[1, 2]).unwrap_err().kind(), ErrorKind::NoActiveProfile);
}

#[test]
fn validation_runs_before_profile_resolution() {
    let (_db, _session, _profiles, tasks) = setup();
    let err = tasks.insert_task_or_sentinel(&Task::new("  ")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn inserts_are_stamped_with_current_profile() {
    let (_db, _session, profiles, tasks) = setup();
    let owner = profiles.create_profile("A", "a@x.com", true).unwrap();

    let mut task = Task::new("mine");
    task.user_id = 12_345;
    let id = tasks.insert_task(&task).unwrap();

    assert_eq!(tasks.get_task(id).unwrap().unwrap().user_id, owner.id);
}

#[test]
fn switching_profiles_changes_visible_tasks() {
    let (_db, _session, profiles, tasks) = setup();
    let a = profiles.create_profile("A", "a@x.com", true).unwrap();
    let a_task = tasks.insert_task(&Task::new("for a")).unwrap();
    let b = profiles.create_profile("B", "b@x.com", true).unwrap();
    let b_task = tasks.insert_task(&Task::new("for b")).unwrap();

    let visible = tasks.list_tasks(&TaskQuery::all()).unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, b_task);
    assert!(tasks.get_task(a_task).unwrap().is_none());
    assert_eq!(tasks.delete_task(a_task).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(
        tasks.set_status(a_task, TaskStatus::Completed).unwrap_err().kind(),
        ErrorKind::NotFound
    );

    profiles.switch_to(a.id).unwrap();
    let visible = tasks.list_tasks(&TaskQuery::all()).unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, a_task);
    assert_eq!(visible[0].status, TaskStatus::Todo);
    assert_ne!(a.id, b.id);
}

#[test]
fn update_cannot_move_task_to_another_profile() {
    let (_db, _session, profiles, tasks) = setup();
    let a = profiles.create_profile("A", "a@x.com", true).unwrap();
    let id = tasks.insert_task(&Task::new("keep")).unwrap();

    let mut edited = tasks.get_task(id).unwrap().unwrap();
    edited.user_id = a.id + 100;
    edited.title = "kept".to_string();
    tasks.update_task(&edited).unwrap();

    let stored = tasks.get_task(id).unwrap().unwrap();
    assert_eq!(stored.user_id, a.id);
    assert_eq!(stored.title, "kept");
}

#[test]
fn append_places_task_after_existing_ones() {
    let (_db, _session, profiles, tasks) = setup();
    profiles.create_profile("A", "a@x.com", true).unwrap();
    let mut pinned = Task::new("pinned");
    pinned.order = 5;
    tasks.insert_task(&pinned).unwrap();

    let appended = tasks.append_task(&Task::new("appended")).unwrap();

    assert_eq!(tasks.get_task(appended).unwrap().unwrap().order, 6);
    let titles: Vec<String> = tasks
        .list_tasks(&TaskQuery::all())
        .unwrap()
        .into_iter()
        .map(|task| task.title)
        .collect();
    assert_eq!(titles, vec!["pinned", "appended"]);
}

#[test]
fn toggle_and_reorder_apply_to_current_profile() {
    let (_db, _session, profiles, tasks) = setup();
    profiles.create_profile("A", "a@x.com", true).unwrap();
    let ids = tasks
        .insert_tasks(&[Task::new("x"), Task::new("y"), Task::new("z")])
        .unwrap();

    assert_eq!(tasks.toggle_completed(ids[1]).unwrap(), TaskStatus::Completed);
    assert_eq!(tasks.toggle_completed(ids[1]).unwrap(), TaskStatus::Todo);

    assert_eq!(tasks.reorder(&[ids[2], ids[0], ids[1]]).unwrap(), 3);
    let order: Vec<i64> = tasks
        .list_tasks(&TaskQuery::all())
        .unwrap()
        .into_iter()
        .map(|task| task.id)
        .collect();
    assert_eq!(order, vec![ids[2], ids[0], ids[1]]);
}

#[test]
fn deleted_profile_rows_are_retained_but_unreachable() {
    let (db, session, profiles, tasks) = setup();
    let a = profiles.create_profile("A", "a@x.com", true).unwrap();
    tasks.insert_task(&Task::new("left behind")).unwrap();

    profiles.delete_profile(a.id).unwrap();

    assert!(session.current_user().unwrap().is_none());
    assert!(tasks.list_tasks(&TaskQuery::all()).unwrap().is_empty());
    let stored: i64 = db
        .read(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM tasks WHERE user_id = ?1;",
                [a.id],
                |row| row.get(0),
            )
        })
        .unwrap();
    assert_eq!(stored, 1);
}

#[test]
fn delete_all_tasks_only_touches_current_profile() {
    let (_db, _session, profiles, tasks) = setup();
    let a = profiles.create_profile("A", "a@x.com", true).unwrap();
    tasks.insert_task(&Task::new("a1")).unwrap();
    profiles.create_profile("B", "b@x.com", true).unwrap();
    tasks.insert_task(&Task::new("b1")).unwrap();
    tasks.insert_task(&Task::new("b2")).unwrap();

    assert_eq!(tasks.delete_all_tasks().unwrap(), 2);

    profiles.switch_to(a.id).unwrap();
    assert_eq!(tasks.count_tasks(&TaskQuery::all()).unwrap(), 1);
}

#[test]
fn insert_with_another_profiles_task_id_is_rejected() {
    let (_db, _session, profiles, tasks) = setup();
    let a = profiles.create_profile("A", "a@x.com", true).unwrap();
    let secret = tasks.insert_task(&Task::new("secret of a")).unwrap();
    profiles.create_profile("B", "b@x.com", true).unwrap();

    let mut takeover = Task::new("taken by b");
    takeover.id = secret;
    assert_eq!(tasks.insert_task(&takeover).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(tasks.append_task(&takeover).unwrap_err().kind(), ErrorKind::NotFound);
    assert!(tasks.list_tasks(&TaskQuery::all()).unwrap().is_empty());

    profiles.switch_to(a.id).unwrap();
    let visible = tasks.list_tasks(&TaskQuery::all()).unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, secret);
    assert_eq!(visible[0].title, "secret of a");
}

#[test]
fn insert_with_another_profiles_category_id_is_rejected() {
    let (_db, session, profiles, _tasks) = setup();
    let categories = CategoryService::from_session(&session);
    let a = profiles.create_profile("A", "a@x.com", true).unwrap();
    let work = categories
        .insert_category(&Category::new("Work", 0, "folder"))
        .unwrap();
    profiles.create_profile("B", "b@x.com", true).unwrap();

    let mut takeover = Category::new("Mine now", 0, "folder");
    takeover.id = work;
    assert_eq!(
        categories.insert_category(&takeover).unwrap_err().kind(),
        ErrorKind::NotFound
    );

    profiles.switch_to(a.id).unwrap();
    assert_eq!(categories.count_categories().unwrap(), 1);
    assert_eq!(categories.get_category(work).unwrap().unwrap().name, "Work");
}

#[test]
fn insert_with_own_task_id_replaces_it() {
    let (_db, _session, profiles, tasks) = setup();
    profiles.create_profile("A", "a@x.com", true).unwrap();
    let id = tasks.insert_task(&Task::new("draft")).unwrap();

    let mut replacement = Task::new("final");
    replacement.id = id;
    assert_eq!(tasks.insert_task(&replacement).unwrap(), id);

    assert_eq!(tasks.count_tasks(&TaskQuery::all()).unwrap(), 1);
    assert_eq!(tasks.get_task(id).unwrap().unwrap().title, "final");
}
