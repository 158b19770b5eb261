use super::test_helpers::setup_test_db;
use crate::auth::{AuthenticatedUser, LinkShareIdentity, Principal};
use crate::search::{SavedFilter, SavedFilterStore, ScopeAuthorizer};

fn principal(id: i64) -> Principal {
    Principal::User(AuthenticatedUser {
        id,
        username: String::new(),
        timezone: String::new(),
    })
}

#[tokio::test]
async fn test_users_and_link_shares() {
    let db = setup_test_db().await;
    let id = db.create_user("alice", "Europe/Berlin").await.unwrap();

    let user = db.get_user(id).await.unwrap().unwrap();
    assert_eq!(user.username, "alice");
    assert_eq!(user.timezone, "Europe/Berlin");
    assert!(db.get_user(id + 100).await.unwrap().is_none());

    let project = db.create_project("Shared", id, None).await.unwrap();
    let share = db.create_link_share(project, "abc123").await.unwrap();
    assert_eq!(
        db.get_link_share(share).await.unwrap(),
        Some(LinkShareIdentity {
            id: share,
            project_id: project
        })
    );
    assert!(db.get_link_share(share + 1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_owner_and_member_can_read() {
    let db = setup_test_db().await;
    let alice = db.create_user("alice", "").await.unwrap();
    let bob = db.create_user("bob", "").await.unwrap();
    let carol = db.create_user("carol", "").await.unwrap();
    let first = db.create_project("First", alice, None).await.unwrap();
    let second = db.create_project("Second", bob, None).await.unwrap();
    db.add_project_member(second, alice).await.unwrap();

    assert_eq!(
        db.list_readable_projects(&principal(alice)).await.unwrap(),
        vec![first, second]
    );
    assert_eq!(
        db.list_readable_projects(&principal(bob)).await.unwrap(),
        vec![second]
    );
    assert!(db
        .list_readable_projects(&principal(carol))
        .await
        .unwrap()
        .is_empty());

    assert!(db.can_read(&principal(alice), second).await.unwrap());
    assert!(!db.can_read(&principal(bob), first).await.unwrap());
    assert!(!db.can_read(&principal(alice), 9999).await.unwrap());
}

#[tokio::test]
async fn test_link_share_reads_only_its_project() {
    let db = setup_test_db().await;
    let alice = db.create_user("alice", "").await.unwrap();
    let first = db.create_project("First", alice, None).await.unwrap();
    let second = db.create_project("Second", alice, None).await.unwrap();
    let share = Principal::LinkShare(LinkShareIdentity {
        id: 1,
        project_id: first,
    });

    assert_eq!(db.list_readable_projects(&share).await.unwrap(), vec![first]);
    assert!(db.can_read(&share, first).await.unwrap());
    assert!(!db.can_read(&share, second).await.unwrap());
}

#[tokio::test]
async fn test_saved_filter_round_trip() {
    let db = setup_test_db().await;
    let alice = db.create_user("alice", "").await.unwrap();
    let saved = SavedFilter {
        owner_id: alice,
        title: "Urgent".to_string(),
        filter: "priority >= 4".to_string(),
        sort_by: vec!["due_date".to_string(), "id".to_string()],
        order_by: vec!["asc".to_string(), "desc".to_string()],
        include_nulls: true,
        timezone: "Europe/Paris".to_string(),
        ..Default::default()
    };

    let id = db.create_saved_filter(&saved).await.unwrap();
    let loaded = db.get_saved_filter(id).await.unwrap().unwrap();
    assert_eq!(loaded, SavedFilter { id, ..saved });
    assert!(db.get_saved_filter(id + 1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_saved_filter_without_sort() {
    let db = setup_test_db().await;
    let alice = db.create_user("alice", "").await.unwrap();
    let id = db
        .create_saved_filter(&SavedFilter {
            owner_id: alice,
            title: "All".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let loaded = db.get_saved_filter(id).await.unwrap().unwrap();
    assert!(loaded.sort_by.is_empty());
    assert!(loaded.order_by.is_empty());
}

#[tokio::test]
async fn test_favorites() {
    let db = setup_test_db().await;
    let alice = db.create_user("alice", "").await.unwrap();

    db.add_favorite(alice, 7).await.unwrap();
    db.add_favorite(alice, 3).await.unwrap();
    db.add_favorite(alice, 3).await.unwrap();
    assert_eq!(db.favorite_task_ids(alice).await.unwrap(), vec![3, 7]);

    db.remove_favorite(alice, 7).await.unwrap();
    assert_eq!(db.favorite_task_ids(alice).await.unwrap(), vec![3]);
}

#[tokio::test]
async fn test_sync_state_is_conditional() {
    let db = setup_test_db().await;
    assert!(db.get_sync_state("tasks").await.unwrap().is_none());

    assert!(db.insert_sync_state("tasks", 100).await.unwrap());
    assert!(!db.insert_sync_state("tasks", 200).await.unwrap());
    let state = db.get_sync_state("tasks").await.unwrap().unwrap();
    assert_eq!(state.sync_started_at, 100);
    assert_eq!(state.sync_finished_at, None);

    assert!(db.advance_sync_state("tasks", 100, 150, 160).await.unwrap());
    // A run that read the old watermark loses
    assert!(!db.advance_sync_state("tasks", 100, 170, 180).await.unwrap());
    let state = db.get_sync_state("tasks").await.unwrap().unwrap();
    assert_eq!(state.sync_started_at, 150);
    assert_eq!(state.sync_finished_at, Some(160));

    db.reset_sync_state("tasks").await.unwrap();
    assert!(db.get_sync_state("tasks").await.unwrap().is_none());
}
