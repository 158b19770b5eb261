use crate::database::test_helpers::setup_test_db;
use crate::database::{Database, TaskInput};
use crate::search::builder::{build_sql, SqlDialect};
use crate::search::coerce::compile_filter;
use crate::search::sort::resolve_sort;
use crate::search::types::{SearchOptions, SearchScope};
use chrono_tz::Tz;

async fn seed_project(db: &Database) -> (i64, i64) {
    let user = db.create_user("alice", "").await.unwrap();
    let project = db.create_project("Inbox", user, None).await.unwrap();
    (user, project)
}

fn input(title: &str) -> TaskInput {
    TaskInput {
        title: title.to_string(),
        ..Default::default()
    }
}

fn options(project: i64, filter: &str) -> SearchOptions {
    SearchOptions {
        filter: compile_filter(filter, Tz::UTC).unwrap(),
        sort: resolve_sort(&[], &[], None).unwrap(),
        scope: SearchScope::projects(vec![project]),
        include_nulls: false,
        timezone: Tz::UTC,
        search: String::new(),
        page: 1,
        per_page: 50,
    }
}

#[tokio::test]
async fn test_insert_assigns_per_project_index() {
    let db = setup_test_db().await;
    let (user, project) = seed_project(&db).await;
    let other = db.create_project("Work", user, None).await.unwrap();

    let first = db.insert_task(project, user, &input("a")).await.unwrap();
    let second = db.insert_task(project, user, &input("b")).await.unwrap();
    let elsewhere = db.insert_task(other, user, &input("c")).await.unwrap();

    assert_eq!(first.index, 1);
    assert_eq!(second.index, 2);
    assert_eq!(elsewhere.index, 1);
    assert_eq!(first.created_by_id, user);
    assert!(first.created > 0);
    assert_eq!(first.done_at, None);
}

#[tokio::test]
async fn test_update_tracks_done_at() {
    let db = setup_test_db().await;
    let (user, project) = seed_project(&db).await;
    let task = db.insert_task(project, user, &input("a")).await.unwrap();

    let mut change = input("a");
    change.done = true;
    let done = db.update_task(task.id, &change).await.unwrap().unwrap();
    assert!(done.done);
    assert!(done.done_at.is_some());

    change.done = false;
    let reopened = db.update_task(task.id, &change).await.unwrap().unwrap();
    assert_eq!(reopened.done_at, None);

    assert!(db.update_task(9999, &change).await.unwrap().is_none());
}

#[tokio::test]
async fn test_get_tasks_by_ids_keeps_order() {
    let db = setup_test_db().await;
    let (user, project) = seed_project(&db).await;
    let a = db.insert_task(project, user, &input("a")).await.unwrap();
    let b = db.insert_task(project, user, &input("b")).await.unwrap();

    let tasks = db.get_tasks_by_ids(&[b.id, 4242, a.id]).await.unwrap();
    let ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![b.id, a.id]);
    assert!(db.get_tasks_by_ids(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_removes_relations() {
    let db = setup_test_db().await;
    let (user, project) = seed_project(&db).await;
    let task = db.insert_task(project, user, &input("a")).await.unwrap();
    db.add_assignee(task.id, user).await.unwrap();
    db.add_favorite(user, task.id).await.unwrap();

    assert!(db.delete_task(task.id).await.unwrap());
    assert!(!db.delete_task(task.id).await.unwrap());
    assert!(db.get_task(task.id).await.unwrap().is_none());
    assert!(db.favorite_task_ids(user).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_load_task_documents_with_relations() {
    let db = setup_test_db().await;
    let (user, parent) = seed_project(&db).await;
    let project = db.create_project("Child", user, Some(parent)).await.unwrap();
    let view = db.create_project_view(project, "List").await.unwrap();
    let bob = db.create_user("bob", "").await.unwrap();

    let mut due = input("Ship release");
    due.due_date = Some(1_700_000_000);
    let task = db.insert_task(project, user, &due).await.unwrap();
    db.add_assignee(task.id, bob).await.unwrap();
    let label = db.create_label("urgent", user).await.unwrap();
    db.add_label(task.id, label).await.unwrap();
    db.add_reminder(task.id, 1_699_990_000).await.unwrap();
    db.set_position(task.id, view, 2.5).await.unwrap();
    db.set_position(task.id, view, 1.5).await.unwrap();

    let docs = db.load_task_documents(&[task.id]).await.unwrap();
    assert_eq!(docs.len(), 1);
    let doc = &docs[0];
    assert_eq!(doc.id, task.id.to_string());
    assert_eq!(doc.parent_project_id, parent);
    assert_eq!(doc.due_date, 1_700_000_000);
    assert_eq!(doc.due_date_sort, Some(1_700_000_000));
    assert_eq!(doc.assignees.len(), 1);
    assert_eq!(doc.assignees[0].username, "bob");
    assert_eq!(doc.labels[0].title, "urgent");
    assert_eq!(doc.reminders, vec![1_699_990_000]);
    assert_eq!(doc.positions.len(), 1);
    assert_eq!(doc.positions[0].position, 1.5);
    assert_eq!(
        doc.view_positions.get(&format!("position_view_{}", view)),
        Some(&1.5)
    );
}

#[tokio::test]
async fn test_task_ids_updated_since() {
    let db = setup_test_db().await;
    let (user, project) = seed_project(&db).await;
    let a = db.insert_task(project, user, &input("a")).await.unwrap();
    let b = db.insert_task(project, user, &input("b")).await.unwrap();
    sqlx::query("UPDATE tasks SET updated = 100 WHERE id = ?")
        .bind(a.id)
        .execute(db.pool())
        .await
        .unwrap();

    assert_eq!(db.task_ids_updated_since(None).await.unwrap(), vec![a.id, b.id]);
    assert_eq!(db.task_ids_updated_since(Some(1000)).await.unwrap(), vec![b.id]);
}

#[tokio::test]
async fn test_relation_change_touches_task() {
    let db = setup_test_db().await;
    let (user, project) = seed_project(&db).await;
    let task = db.insert_task(project, user, &input("a")).await.unwrap();
    sqlx::query("UPDATE tasks SET updated = 100 WHERE id = ?")
        .bind(task.id)
        .execute(db.pool())
        .await
        .unwrap();

    db.add_reminder(task.id, 5).await.unwrap();
    let touched = db.get_task(task.id).await.unwrap().unwrap();
    assert!(touched.updated > 100);
}

#[tokio::test]
async fn test_search_tasks_counts_beyond_page() {
    let db = setup_test_db().await;
    let (user, project) = seed_project(&db).await;
    for title in ["alpha", "beta", "gamma"] {
        db.insert_task(project, user, &input(title)).await.unwrap();
    }

    let mut opts = options(project, "title != beta");
    opts.per_page = 1;
    opts.page = 2;
    let query = build_sql(&opts, SqlDialect::Sqlite).unwrap();
    let (tasks, total) = db.search_tasks(&query).await.unwrap();

    assert_eq!(total, 2);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "gamma");
}
