use super::IndexClient;
use crate::database::Database;
use crate::events::{EventBus, TaskEvent};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast::{error::RecvError, Receiver};
use tokio::task::JoinHandle;

/// Applies task events to the search index as they are published. Failures
/// are logged and left to the periodic resync.
pub struct IndexListener {
    database: Arc<Database>,
    client: Arc<dyn IndexClient>,
    collection: String,
}

impl IndexListener {
    pub fn new(database: Arc<Database>, client: Arc<dyn IndexClient>, collection: &str) -> Self {
        Self {
            database,
            client,
            collection: collection.to_string(),
        }
    }

    /// Subscribe to `bus` and process events in the background until the bus
    /// is dropped
    pub fn spawn(self, bus: &EventBus) -> JoinHandle<()> {
        let receiver = bus.subscribe();
        tokio::spawn(self.run(receiver))
    }

    async fn run(self, mut receiver: Receiver<TaskEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = self.handle(event).await {
                        tracing::warn!("Failed to index {:?}: {:#}", event, e);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        "Index listener lagged, {} events skipped until the next resync",
                        skipped
                    );
                }
                Err(RecvError::Closed) => {
                    tracing::debug!("Event bus closed, index listener stopping");
                    return;
                }
            }
        }
    }

    pub async fn handle(&self, event: TaskEvent) -> Result<()> {
        match event {
            TaskEvent::Created { task_id } | TaskEvent::Updated { task_id } => {
                let documents = self.database.load_task_documents(&[task_id]).await?;
                if documents.is_empty() {
                    // Deleted before we got to it
                    return self
                        .client
                        .delete_documents(&self.collection, &[task_id])
                        .await;
                }
                self.client
                    .upsert_documents(&self.collection, &documents)
                    .await
            }
            TaskEvent::Deleted { task_id } => {
                self.client
                    .delete_documents(&self.collection, &[task_id])
                    .await
            }
        }
    }
}
