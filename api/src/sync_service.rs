use crate::database::Database;
use crate::index::IndexClient;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

/// Tasks loaded and upserted per round trip
const BATCH_SIZE: usize = 200;

/// Writes stamp `updated` before they commit, so a change stamped just before
/// a run started may only become visible after that run queried
const WINDOW_OVERLAP_SECS: i64 = 60;

/// Periodically re-derives the tasks changed since the last completed run
/// and re-upserts them into the search index
pub struct IndexSyncService {
    database: Arc<Database>,
    client: Arc<dyn IndexClient>,
    collection: String,
    interval: Duration,
}

impl IndexSyncService {
    pub fn new(
        database: Arc<Database>,
        client: Arc<dyn IndexClient>,
        collection: &str,
        interval_secs: u64,
    ) -> Self {
        Self {
            database,
            client,
            collection: collection.to_string(),
            interval: Duration::from_secs(interval_secs.max(1)),
        }
    }

    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.interval);

        loop {
            // The first tick completes immediately
            interval.tick().await;
            if let Err(e) = self.sync_once().await {
                tracing::error!("Index sync of {} failed: {:#}", self.collection, e);
            }
        }
    }

    /// One resync run. Returns the number of tasks upserted.
    ///
    /// The watermark only moves after every upsert succeeded, and only if no
    /// concurrent run moved it in the meantime.
    pub async fn sync_once(&self) -> Result<usize> {
        let started_at = chrono::Utc::now().timestamp();

        if self.database.get_sync_state(&self.collection).await?.is_none() {
            self.database
                .insert_sync_state(&self.collection, started_at)
                .await?;
        }
        let previous = self
            .database
            .get_sync_state(&self.collection)
            .await?
            .with_context(|| format!("Sync state of {} missing after insert", self.collection))?;

        let since = previous
            .sync_finished_at
            .map(|_| previous.sync_started_at - WINDOW_OVERLAP_SECS);
        tracing::debug!("Syncing {} from {:?}", self.collection, since);

        self.client.ensure_collection(&self.collection).await?;

        let ids = self.database.task_ids_updated_since(since).await?;
        let mut upserted = 0;
        for batch in ids.chunks(BATCH_SIZE) {
            let documents = self.database.load_task_documents(batch).await?;
            self.client
                .upsert_documents(&self.collection, &documents)
                .await
                .with_context(|| format!("Failed to upsert {} tasks", documents.len()))?;
            upserted += documents.len();
        }

        let finished_at = chrono::Utc::now().timestamp();
        let advanced = self
            .database
            .advance_sync_state(
                &self.collection,
                previous.sync_started_at,
                started_at,
                finished_at,
            )
            .await?;
        if advanced {
            tracing::info!(
                "Index sync of {} completed, {} tasks upserted",
                self.collection,
                upserted
            );
        } else {
            tracing::info!(
                "Index sync of {} lost to a concurrent run, watermark left as is",
                self.collection
            );
        }

        Ok(upserted)
    }

    /// Drop the collection and index every task again
    pub async fn reindex(&self) -> Result<usize> {
        tracing::info!("Reindexing {}", self.collection);
        self.client.recreate_collection(&self.collection).await?;
        self.database.reset_sync_state(&self.collection).await?;
        self.sync_once().await
    }
}

#[cfg(test)]
mod tests;
