use super::*;
use crate::auth::Principal;
use crate::database::test_helpers::setup_test_db;
use crate::database::TaskInput;
use crate::search::TaskSearchRequest;
use std::collections::HashMap;
use tokio::time::{sleep, timeout, Duration};

fn config(vars: &[(&str, &str)]) -> AppConfig {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    AppConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

#[tokio::test]
async fn test_database_backend_runs_without_index() {
    let db = Arc::new(setup_test_db().await);
    let ctx = AppContext::new(config(&[]), db);

    assert!(ctx.index.is_none());
    assert!(ctx.require_index().is_err());
    assert!(ctx.search_service().is_ok());
    assert!(ctx.spawn_background().is_empty());
}

#[tokio::test]
async fn test_task_writes_reach_memory_index() {
    let db = Arc::new(setup_test_db().await);
    let ctx = AppContext::new(config(&[("SEARCH_BACKEND", "memory")]), db.clone());
    let handles = ctx.spawn_background();
    assert_eq!(handles.len(), 2);

    // Initial resync of the empty store; the next one is minutes away
    timeout(Duration::from_secs(5), async {
        loop {
            let state = db.get_sync_state(&ctx.config.index_collection).await.unwrap();
            if state.is_some_and(|s| s.sync_finished_at.is_some()) {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("initial sync");

    let alice = db.create_user("alice", "").await.unwrap();
    let home = db.create_project("Home", alice, None).await.unwrap();
    let principal = Principal::User(db.get_user(alice).await.unwrap().unwrap());
    let service = ctx.search_service().unwrap();

    let task = ctx
        .tasks
        .create(
            home,
            alice,
            &TaskInput {
                title: "Buy milk".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let found = timeout(Duration::from_secs(5), async {
        loop {
            let result = service
                .search(&principal, TaskSearchRequest::default())
                .await
                .unwrap();
            if !result.items.is_empty() {
                break result;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("listener indexed the new task");
    assert_eq!(found.items[0].id, task.id);

    for handle in handles {
        handle.abort();
    }
}
