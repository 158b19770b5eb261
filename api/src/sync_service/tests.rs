use super::*;
use crate::database::test_helpers::setup_test_db;
use crate::database::TaskInput;
use crate::index::{IndexSearchRequest, IndexSearchResponse, MemoryIndex, TaskDocument};
use async_trait::async_trait;

const COLLECTION: &str = "tasks";

async fn seeded(count: usize) -> (Arc<Database>, Vec<i64>) {
    let db = setup_test_db().await;
    let user = db.create_user("alice", "").await.unwrap();
    let project = db.create_project("Inbox", user, None).await.unwrap();
    let mut ids = Vec::new();
    for i in 0..count {
        let input = TaskInput {
            title: format!("Task {}", i),
            ..Default::default()
        };
        ids.push(db.insert_task(project, user, &input).await.unwrap().id);
    }
    // Pretend every task was last touched long ago
    sqlx::query("UPDATE tasks SET updated = 100")
        .execute(db.pool())
        .await
        .unwrap();
    (Arc::new(db), ids)
}

/// Index that rejects every upsert
struct FailingIndex;

#[async_trait]
impl IndexClient for FailingIndex {
    async fn ensure_collection(&self, _collection: &str) -> Result<()> {
        Ok(())
    }

    async fn recreate_collection(&self, _collection: &str) -> Result<()> {
        Ok(())
    }

    async fn upsert_documents(&self, _collection: &str, _documents: &[TaskDocument]) -> Result<()> {
        anyhow::bail!("index unavailable")
    }

    async fn delete_documents(&self, _collection: &str, _task_ids: &[i64]) -> Result<()> {
        Ok(())
    }

    async fn search(
        &self,
        _collection: &str,
        _request: &IndexSearchRequest,
    ) -> Result<IndexSearchResponse> {
        Ok(IndexSearchResponse::default())
    }
}

/// Index whose upserts race with another run that advances the watermark
struct RacingIndex {
    inner: MemoryIndex,
    database: Arc<Database>,
}

#[async_trait]
impl IndexClient for RacingIndex {
    async fn ensure_collection(&self, collection: &str) -> Result<()> {
        self.inner.ensure_collection(collection).await
    }

    async fn recreate_collection(&self, collection: &str) -> Result<()> {
        self.inner.recreate_collection(collection).await
    }

    async fn upsert_documents(&self, collection: &str, documents: &[TaskDocument]) -> Result<()> {
        if let Some(state) = self.database.get_sync_state(collection).await? {
            self.database
                .advance_sync_state(collection, state.sync_started_at, 5_000, 5_001)
                .await?;
        }
        self.inner.upsert_documents(collection, documents).await
    }

    async fn delete_documents(&self, collection: &str, task_ids: &[i64]) -> Result<()> {
        self.inner.delete_documents(collection, task_ids).await
    }

    async fn search(
        &self,
        collection: &str,
        request: &IndexSearchRequest,
    ) -> Result<IndexSearchResponse> {
        self.inner.search(collection, request).await
    }
}

#[tokio::test]
async fn test_first_run_indexes_everything() {
    let (db, ids) = seeded(3).await;
    let index = Arc::new(MemoryIndex::new());
    let service = IndexSyncService::new(db.clone(), index.clone(), COLLECTION, 60);

    assert_eq!(service.sync_once().await.unwrap(), 3);
    assert_eq!(index.document_count(COLLECTION), Some(3));
    assert!(index.document(COLLECTION, ids[0]).is_some());

    let state = db.get_sync_state(COLLECTION).await.unwrap().unwrap();
    assert!(state.sync_finished_at.is_some());
    assert!(state.sync_started_at > 100);
}

#[tokio::test]
async fn test_later_runs_only_pick_up_changes() {
    let (db, ids) = seeded(3).await;
    let index = Arc::new(MemoryIndex::new());
    let service = IndexSyncService::new(db.clone(), index.clone(), COLLECTION, 60);
    service.sync_once().await.unwrap();

    assert_eq!(service.sync_once().await.unwrap(), 0);

    let future = chrono::Utc::now().timestamp() + 60;
    sqlx::query("UPDATE tasks SET title = 'Renamed', updated = ? WHERE id = ?")
        .bind(future)
        .bind(ids[1])
        .execute(db.pool())
        .await
        .unwrap();

    assert_eq!(service.sync_once().await.unwrap(), 1);
    let doc = index.document(COLLECTION, ids[1]).unwrap();
    assert_eq!(doc["title"], "Renamed");
}

#[tokio::test]
async fn test_late_commit_before_watermark_is_picked_up() {
    let (db, ids) = seeded(2).await;
    let index = Arc::new(MemoryIndex::new());
    let service = IndexSyncService::new(db.clone(), index.clone(), COLLECTION, 60);
    service.sync_once().await.unwrap();
    let state = db.get_sync_state(COLLECTION).await.unwrap().unwrap();

    // Stamped a second before the last run started, committed after it
    sqlx::query("UPDATE tasks SET title = 'Late', updated = ? WHERE id = ?")
        .bind(state.sync_started_at - 1)
        .bind(ids[0])
        .execute(db.pool())
        .await
        .unwrap();

    assert_eq!(service.sync_once().await.unwrap(), 1);
    let doc = index.document(COLLECTION, ids[0]).unwrap();
    assert_eq!(doc["title"], "Late");
}

#[tokio::test]
async fn test_failed_run_leaves_watermark() {
    let (db, _) = seeded(2).await;
    let service = IndexSyncService::new(db.clone(), Arc::new(FailingIndex), COLLECTION, 60);

    let err = service.sync_once().await.unwrap_err();
    assert!(format!("{:#}", err).contains("index unavailable"));

    // The row exists but the first run never completed
    let state = db.get_sync_state(COLLECTION).await.unwrap().unwrap();
    assert_eq!(state.sync_finished_at, None);
}

#[tokio::test]
async fn test_losing_run_does_not_move_watermark() {
    let (db, _) = seeded(2).await;
    let index = Arc::new(RacingIndex {
        inner: MemoryIndex::new(),
        database: db.clone(),
    });
    let service = IndexSyncService::new(db.clone(), index.clone(), COLLECTION, 60);

    assert_eq!(service.sync_once().await.unwrap(), 2);

    let state = db.get_sync_state(COLLECTION).await.unwrap().unwrap();
    assert_eq!(state.sync_started_at, 5_000);
    assert_eq!(state.sync_finished_at, Some(5_001));
}

#[tokio::test]
async fn test_reindex_drops_stale_documents() {
    let (db, ids) = seeded(2).await;
    let index = Arc::new(MemoryIndex::new());
    let service = IndexSyncService::new(db.clone(), index.clone(), COLLECTION, 60);
    service.sync_once().await.unwrap();

    // A deletion the listener never saw
    db.delete_task(ids[0]).await.unwrap();
    service.sync_once().await.unwrap();
    assert_eq!(index.document_count(COLLECTION), Some(2));

    assert_eq!(service.reindex().await.unwrap(), 1);
    assert_eq!(index.document_count(COLLECTION), Some(1));
    assert!(index.document(COLLECTION, ids[0]).is_none());
}
