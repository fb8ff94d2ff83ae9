use taskplanner_core::{
    Category, CategoryRepository, CategoryService, Database, ErrorKind, ParentFilter,
    ProfileService, RepoError, ServiceError, Session, SqliteCategoryRepository, Task, TaskService,
    ValidationError,
};

struct Fixture {
    db: Database,
    session: Session,
    categories: CategoryService,
    tasks: TaskService,
}

fn setup_with_profile() -> Fixture {
    let db = Database::open_in_memory().unwrap();
    let session = Session::open(&db).unwrap();
    ProfileService::new(&session)
        .create_profile("Owner", "owner@example.com", true)
        .unwrap();
    Fixture {
        categories: CategoryService::from_session(&session),
        tasks: TaskService::from_session(&session),
        db,
        session,
    }
}

fn category(name: &str) -> Category {
    Category::new(name, 0xFF4C_AF50, "folder")
}

fn category_count(db: &Database) -> i64 {
    db.read(|conn| conn.query_row("SELECT COUNT(*) FROM categories;", [], |row| row.get(0)))
        .unwrap()
}

#[test]
fn deleting_category_nulls_task_references() {
    let fx = setup_with_profile();
    let work = fx.categories.insert_category(&category("Work")).unwrap();
    let mut first = Task::new("first");
    first.category_id = Some(work);
    let mut second = Task::new("second");
    second.category_id = Some(work);
    let first = fx.tasks.insert_task(&first).unwrap();
    let second = fx.tasks.insert_task(&second).unwrap();

    fx.categories.delete_category(work).unwrap();

    assert!(fx.categories.get_category(work).unwrap().is_none());
    assert_eq!(category_count(&fx.db), 0);
    for id in [first, second] {
        let task = fx.tasks.get_task(id).unwrap().unwrap();
        assert_eq!(task.category_id, None);
    }
}

#[test]
fn deleting_parent_promotes_children_to_roots() {
    let fx = setup_with_profile();
    let parent = fx.categories.insert_category(&category("Home")).unwrap();
    let mut child = category("Garden");
    child.parent_category_id = Some(parent);
    let child = fx.categories.insert_category(&child).unwrap();

    assert_eq!(fx.categories.subcategories(parent).unwrap().len(), 1);
    assert_eq!(fx.categories.root_categories().unwrap().len(), 1);

    fx.categories.delete_category(parent).unwrap();

    let stored = fx.categories.get_category(child).unwrap().unwrap();
    assert_eq!(stored.parent_category_id, None);
    let roots = fx.categories.root_categories().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].id, child);
}

#[test]
fn listings_order_by_name_ignoring_case() {
    let fx = setup_with_profile();
    for name in ["beta", "Alpha", "gamma", "ALPHA"] {
        fx.categories.insert_category(&category(name)).unwrap();
    }

    let names: Vec<String> = fx
        .categories
        .list_categories(ParentFilter::Any)
        .unwrap()
        .into_iter()
        .map(|category| category.name)
        .collect();
    assert_eq!(names, vec!["Alpha", "ALPHA", "beta", "gamma"]);
    assert_eq!(fx.categories.count_categories().unwrap(), 4);
}

#[test]
fn parent_must_exist_for_current_profile() {
    let fx = setup_with_profile();
    let mut orphan = category("Orphan");
    orphan.parent_category_id = Some(777);

    let err = fx.categories.insert_category(&orphan).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ValidationError::UnknownCategory(777))
    ));
}

#[test]
fn reparenting_rejects_self_and_cycles() {
    let fx = setup_with_profile();
    let root = fx.categories.insert_category(&category("Root")).unwrap();
    let mut mid = category("Mid");
    mid.parent_category_id = Some(root);
    let mid = fx.categories.insert_category(&mid).unwrap();
    let mut leaf = category("Leaf");
    leaf.parent_category_id = Some(mid);
    let leaf = fx.categories.insert_category(&leaf).unwrap();

    let mut looped = fx.categories.get_category(root).unwrap().unwrap();
    looped.parent_category_id = Some(leaf);
    let err = fx.categories.update_category(&looped).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ValidationError::ParentCycle { .. })
    ));

    looped.parent_category_id = Some(root);
    let err = fx.categories.update_category(&looped).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ValidationError::SelfParent(_))
    ));

    let mut moved = fx.categories.get_category(leaf).unwrap().unwrap();
    moved.parent_category_id = Some(root);
    fx.categories.update_category(&moved).unwrap();
    assert_eq!(fx.categories.subcategories(root).unwrap().len(), 2);
}

#[test]
fn blank_fields_fail_validation() {
    let fx = setup_with_profile();
    let err = fx.categories.insert_category(&category("  ")).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ValidationError::BlankName)
    ));

    let no_icon = Category::new("Icons", 0, " ");
    let err = fx.categories.insert_category(&no_icon).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ValidationError::BlankIcon)
    ));
}

#[test]
fn other_profiles_categories_are_invisible() {
    let fx = setup_with_profile();
    let mine = fx.categories.insert_category(&category("Mine")).unwrap();
    let profiles = ProfileService::new(&fx.session);
    let other = profiles
        .create_profile("Other", "other@example.com", true)
        .unwrap();

    assert!(fx.categories.get_category(mine).unwrap().is_none());
    assert!(fx.categories.list_categories(ParentFilter::Any).unwrap().is_empty());
    assert_eq!(
        fx.categories.delete_category(mine).unwrap_err().kind(),
        ErrorKind::NotFound
    );

    let mut task = Task::new("cross");
    task.category_id = Some(mine);
    assert!(matches!(
        fx.tasks.insert_task(&task).unwrap_err(),
        ServiceError::Validation(ValidationError::UnknownCategory(id)) if id == mine
    ));

    let theirs = fx.categories.insert_category(&category("Theirs")).unwrap();
    let stored = fx.categories.get_category(theirs).unwrap().unwrap();
    assert_eq!(stored.user_id, other.id);
}

#[test]
fn repository_delete_all_for_user_scopes_by_owner() {
    let db = Database::open_in_memory().unwrap();
    let repo = SqliteCategoryRepository::new(&db);
    for owner in [1, 1, 2] {
        let mut record = category("Shared name");
        record.user_id = owner;
        repo.insert(&record).unwrap();
    }

    assert_eq!(repo.delete_all_for_user(1).unwrap(), 2);
    assert_eq!(repo.count(1).unwrap(), 0);
    assert_eq!(repo.count(2).unwrap(), 1);
    assert!(matches!(
        repo.delete(12_345).unwrap_err(),
        RepoError::NotFound {
            entity: "category",
            ..
        }
    ));
}

#[test]
fn insert_with_existing_id_rejects_cycles() {
    let fx = setup_with_profile();
    let parent = fx.categories.insert_category(&category("Parent")).unwrap();
    let mut child = category("Child");
    child.parent_category_id = Some(parent);
    let child = fx.categories.insert_category(&child).unwrap();

    let mut looped = fx.categories.get_category(parent).unwrap().unwrap();
    looped.parent_category_id = Some(child);
    let err = fx.categories.insert_category(&looped).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ValidationError::ParentCycle { .. })
    ));
    let stored = fx.categories.get_category(parent).unwrap().unwrap();
    assert_eq!(stored.parent_category_id, None);
}

#[test]
fn repository_upsert_never_crosses_owners() {
    let db = Database::open_in_memory().unwrap();
    let repo = SqliteCategoryRepository::new(&db);
    let mut original = category("Owned by one");
    original.user_id = 1;
    let id = repo.insert(&original).unwrap();

    let mut foreign = category("Owned by two");
    foreign.id = id;
    foreign.user_id = 2;
    assert!(matches!(
        repo.insert(&foreign).unwrap_err(),
        RepoError::NotFound {
            entity: "category",
            ..
        }
    ));
    let stored = repo.get_by_id(id).unwrap().unwrap();
    assert_eq!(stored.user_id, 1);
    assert_eq!(stored.name, "Owned by one");
}
