//! Write path for tasks. Every committed change is published on the event
//! bus so the search index can follow.

use crate::database::{Database, Task, TaskInput};
use crate::events::{EventBus, TaskEvent};
use anyhow::Result;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct TaskService {
    database: Arc<Database>,
    bus: EventBus,
}

impl TaskService {
    pub fn new(database: Arc<Database>, bus: EventBus) -> Self {
        Self { database, bus }
    }

    fn updated(&self, task_id: i64) {
        self.bus.publish(TaskEvent::Updated { task_id });
    }

    pub async fn create(&self, project_id: i64, created_by_id: i64, input: &TaskInput) -> Result<Task> {
        let task = self
            .database
            .insert_task(project_id, created_by_id, input)
            .await?;
        tracing::debug!("Created task {} in project {}", task.id, project_id);
        self.bus.publish(TaskEvent::Created { task_id: task.id });
        Ok(task)
    }

    pub async fn update(&self, task_id: i64, input: &TaskInput) -> Result<Option<Task>> {
        let task = self.database.update_task(task_id, input).await?;
        if task.is_some() {
            self.updated(task_id);
        }
        Ok(task)
    }

    pub async fn delete(&self, task_id: i64) -> Result<bool> {
        let deleted = self.database.delete_task(task_id).await?;
        if deleted {
            self.bus.publish(TaskEvent::Deleted { task_id });
        }
        Ok(deleted)
    }

    pub async fn assign(&self, task_id: i64, user_id: i64) -> Result<()> {
        self.database.add_assignee(task_id, user_id).await?;
        self.updated(task_id);
        Ok(())
    }

    pub async fn unassign(&self, task_id: i64, user_id: i64) -> Result<()> {
        self.database.remove_assignee(task_id, user_id).await?;
        self.updated(task_id);
        Ok(())
    }

    pub async fn add_label(&self, task_id: i64, label_id: i64) -> Result<()> {
        self.database.add_label(task_id, label_id).await?;
        self.updated(task_id);
        Ok(())
    }

    pub async fn remove_label(&self, task_id: i64, label_id: i64) -> Result<()> {
        self.database.remove_label(task_id, label_id).await?;
        self.updated(task_id);
        Ok(())
    }

    pub async fn add_reminder(&self, task_id: i64, reminder: i64) -> Result<()> {
        self.database.add_reminder(task_id, reminder).await?;
        self.updated(task_id);
        Ok(())
    }

    pub async fn set_position(&self, task_id: i64, project_view_id: i64, position: f64) -> Result<()> {
        self.database
            .set_position(task_id, project_view_id, position)
            .await?;
        self.updated(task_id);
        Ok(())
    }

    /// Favorites are resolved from the primary store at search time; the
    /// event only keeps listeners informed
    pub async fn favorite(&self, user_id: i64, task_id: i64) -> Result<()> {
        self.database.add_favorite(user_id, task_id).await?;
        self.updated(task_id);
        Ok(())
    }

    pub async fn unfavorite(&self, user_id: i64, task_id: i64) -> Result<()> {
        self.database.remove_favorite(user_id, task_id).await?;
        self.updated(task_id);
        Ok(())
    }
}
