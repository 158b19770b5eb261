use super::favorites::FAVORITE_KIND_TASK;
use super::types::Database;
use crate::index::{AssigneeDocument, LabelDocument, PositionDocument, TaskDocument};
use crate::search::{SqlQuery, SqlValue};
use anyhow::{Context, Result};
use poem_openapi::Object;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Columns selected into [`Task`], qualified for queries that join
pub const TASK_COLUMNS: &str = "tasks.id, tasks.title, tasks.description, tasks.done, tasks.done_at, tasks.due_date, tasks.created_by_id, tasks.project_id, tasks.repeat_after, tasks.priority, tasks.start_date, tasks.end_date, tasks.hex_color, tasks.percent_done, tasks.uid, tasks.task_index, tasks.created, tasks.updated";

/// Task row. Timestamps are unix seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow, Object)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub done: bool,
    pub done_at: Option<i64>,
    pub due_date: Option<i64>,
    pub created_by_id: i64,
    pub project_id: i64,
    pub repeat_after: i64,
    pub priority: i64,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
    pub hex_color: String,
    pub percent_done: f64,
    pub uid: String,
    /// Per-project sequence number shown to users as `#index`
    #[sqlx(rename = "task_index")]
    pub index: i64,
    pub created: i64,
    pub updated: i64,
}

/// Mutable task attributes, used for both inserts and full updates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskInput {
    pub title: String,
    pub description: String,
    pub done: bool,
    pub due_date: Option<i64>,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
    pub repeat_after: i64,
    pub priority: i64,
    pub hex_color: String,
    pub percent_done: f64,
    pub uid: String,
}

pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

impl Database {
    /// Run a compiled search; returns one page of tasks and the total count
    pub async fn search_tasks(&self, query: &SqlQuery) -> Result<(Vec<Task>, i64)> {
        let select = query.select_sql(TASK_COLUMNS);
        let mut rows = sqlx::query_as::<_, Task>(&select);
        for value in &query.values {
            rows = match value {
                SqlValue::String(s) => rows.bind(s.as_str()),
                SqlValue::Integer(i) => rows.bind(*i),
                SqlValue::Float(f) => rows.bind(*f),
                SqlValue::Bool(b) => rows.bind(*b),
            };
        }
        let tasks = rows
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Task search failed: {}", select))?;

        let count_sql = query.count_sql();
        let mut count = sqlx::query_scalar::<_, i64>(&count_sql);
        for value in &query.values {
            count = match value {
                SqlValue::String(s) => count.bind(s.as_str()),
                SqlValue::Integer(i) => count.bind(*i),
                SqlValue::Float(f) => count.bind(*f),
                SqlValue::Bool(b) => count.bind(*b),
            };
        }
        let total = count
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Task count failed: {}", count_sql))?;

        Ok((tasks, total))
    }

    pub async fn get_task(&self, id: i64) -> Result<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "SELECT {} FROM tasks WHERE tasks.id = ?",
            TASK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(task)
    }

    /// Fetch tasks by id, in the order of `ids`. Unknown ids are skipped.
    pub async fn get_tasks_by_ids(&self, ids: &[i64]) -> Result<Vec<Task>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM tasks WHERE tasks.id IN ({})",
            TASK_COLUMNS,
            placeholders(ids.len())
        );
        let mut query = sqlx::query_as::<_, Task>(&sql);
        for id in ids {
            query = query.bind(*id);
        }
        let mut by_id: HashMap<i64, Task> = query
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();

        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    /// Ids of tasks updated at or after `since`, or of all tasks
    pub async fn task_ids_updated_since(&self, since: Option<i64>) -> Result<Vec<i64>> {
        let ids = match since {
            Some(since) => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT id FROM tasks WHERE updated >= ? ORDER BY id",
                )
                .bind(since)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar::<_, i64>("SELECT id FROM tasks ORDER BY id")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(ids)
    }

    /// Build index documents with all relations for the given tasks
    pub async fn load_task_documents(&self, ids: &[i64]) -> Result<Vec<TaskDocument>> {
        let tasks = self.get_tasks_by_ids(ids).await?;
        if tasks.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();
        let in_list = placeholders(ids.len());

        let mut project_ids: Vec<i64> = tasks.iter().map(|t| t.project_id).collect();
        project_ids.sort_unstable();
        project_ids.dedup();
        let sql = format!(
            "SELECT id, parent_project_id FROM projects WHERE id IN ({})",
            placeholders(project_ids.len())
        );
        let mut query = sqlx::query_as::<_, (i64, i64)>(&sql);
        for id in &project_ids {
            query = query.bind(*id);
        }
        let parents: HashMap<i64, i64> = query.fetch_all(&self.pool).await?.into_iter().collect();

        let sql = format!(
            "SELECT task_assignees.task_id, users.id, users.username FROM task_assignees INNER JOIN users ON users.id = task_assignees.user_id WHERE task_assignees.task_id IN ({}) ORDER BY users.id",
            in_list
        );
        let mut query = sqlx::query_as::<_, (i64, i64, String)>(&sql);
        for id in &ids {
            query = query.bind(*id);
        }
        let mut assignees: HashMap<i64, Vec<AssigneeDocument>> = HashMap::new();
        for (task_id, id, username) in query.fetch_all(&self.pool).await? {
            assignees
                .entry(task_id)
                .or_default()
                .push(AssigneeDocument { id, username });
        }

        let sql = format!(
            "SELECT label_tasks.task_id, labels.id, labels.title FROM label_tasks INNER JOIN labels ON labels.id = label_tasks.label_id WHERE label_tasks.task_id IN ({}) ORDER BY labels.id",
            in_list
        );
        let mut query = sqlx::query_as::<_, (i64, i64, String)>(&sql);
        for id in &ids {
            query = query.bind(*id);
        }
        let mut labels: HashMap<i64, Vec<LabelDocument>> = HashMap::new();
        for (task_id, id, title) in query.fetch_all(&self.pool).await? {
            labels
                .entry(task_id)
                .or_default()
                .push(LabelDocument { id, title });
        }

        let sql = format!(
            "SELECT task_id, reminder FROM task_reminders WHERE task_id IN ({}) ORDER BY reminder",
            in_list
        );
        let mut query = sqlx::query_as::<_, (i64, i64)>(&sql);
        for id in &ids {
            query = query.bind(*id);
        }
        let mut reminders: HashMap<i64, Vec<i64>> = HashMap::new();
        for (task_id, reminder) in query.fetch_all(&self.pool).await? {
            reminders.entry(task_id).or_default().push(reminder);
        }

        let sql = format!(
            "SELECT task_id, project_view_id, position FROM task_positions WHERE task_id IN ({}) ORDER BY project_view_id",
            in_list
        );
        let mut query = sqlx::query_as::<_, (i64, i64, f64)>(&sql);
        for id in &ids {
            query = query.bind(*id);
        }
        let mut positions: HashMap<i64, Vec<PositionDocument>> = HashMap::new();
        for (task_id, project_view_id, position) in query.fetch_all(&self.pool).await? {
            positions.entry(task_id).or_default().push(PositionDocument {
                project_view_id,
                position,
            });
        }

        Ok(tasks
            .iter()
            .map(|task| {
                let parent = parents.get(&task.project_id).copied().unwrap_or_default();
                let mut doc = TaskDocument::from_task(task, parent);
                doc.assignees = assignees.remove(&task.id).unwrap_or_default();
                doc.labels = labels.remove(&task.id).unwrap_or_default();
                doc.reminders = reminders.remove(&task.id).unwrap_or_default();
                doc.set_positions(positions.remove(&task.id).unwrap_or_default());
                doc
            })
            .collect())
    }

    pub async fn insert_task(
        &self,
        project_id: i64,
        created_by_id: i64,
        input: &TaskInput,
    ) -> Result<Task> {
        let now = now();
        let done_at = input.done.then_some(now);
        let mut tx = self.pool.begin().await?;

        let index: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(task_index), 0) + 1 FROM tasks WHERE project_id = ?",
        )
        .bind(project_id)
        .fetch_one(&mut *tx)
        .await?;

        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO tasks (title, description, done, done_at, due_date, created_by_id, project_id,
               repeat_after, priority, start_date, end_date, hex_color, percent_done, uid, task_index, created, updated)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id"#,
        )
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.done)
        .bind(done_at)
        .bind(input.due_date)
        .bind(created_by_id)
        .bind(project_id)
        .bind(input.repeat_after)
        .bind(input.priority)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(&input.hex_color)
        .bind(input.percent_done)
        .bind(&input.uid)
        .bind(index)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        self.get_task(id)
            .await?
            .with_context(|| format!("Task {} vanished after insert", id))
    }

    /// Replace the mutable attributes of a task. `done_at` follows `done`.
    pub async fn update_task(&self, id: i64, input: &TaskInput) -> Result<Option<Task>> {
        let Some(existing) = self.get_task(id).await? else {
            return Ok(None);
        };
        let now = now();
        let done_at = match (existing.done, input.done) {
            (false, true) => Some(now),
            (true, true) => existing.done_at,
            (_, false) => None,
        };

        sqlx::query(
            r#"UPDATE tasks SET title = ?, description = ?, done = ?, done_at = ?, due_date = ?,
               repeat_after = ?, priority = ?, start_date = ?, end_date = ?, hex_color = ?,
               percent_done = ?, uid = ?, updated = ? WHERE id = ?"#,
        )
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.done)
        .bind(done_at)
        .bind(input.due_date)
        .bind(input.repeat_after)
        .bind(input.priority)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(&input.hex_color)
        .bind(input.percent_done)
        .bind(&input.uid)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get_task(id).await
    }

    pub async fn delete_task(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        for table in ["task_assignees", "label_tasks", "task_reminders", "task_positions"] {
            sqlx::query(&format!("DELETE FROM {} WHERE task_id = ?", table))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("DELETE FROM favorites WHERE entity_id = ? AND kind = ?")
            .bind(id)
            .bind(FAVORITE_KIND_TASK)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() == 1)
    }

    /// Bump `updated` after a relation change so the resync window sees it
    async fn touch_task(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE tasks SET updated = ? WHERE id = ?")
            .bind(now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn add_assignee(&self, task_id: i64, user_id: i64) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO task_assignees (task_id, user_id) VALUES (?, ?)")
            .bind(task_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        self.touch_task(task_id).await
    }

    pub async fn remove_assignee(&self, task_id: i64, user_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM task_assignees WHERE task_id = ? AND user_id = ?")
            .bind(task_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        self.touch_task(task_id).await
    }

    pub async fn create_label(&self, title: &str, created_by_id: i64) -> Result<i64> {
        let id = sqlx::query_scalar(
            "INSERT INTO labels (title, created_by_id) VALUES (?, ?) RETURNING id",
        )
        .bind(title)
        .bind(created_by_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn add_label(&self, task_id: i64, label_id: i64) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO label_tasks (task_id, label_id) VALUES (?, ?)")
            .bind(task_id)
            .bind(label_id)
            .execute(&self.pool)
            .await?;
        self.touch_task(task_id).await
    }

    pub async fn remove_label(&self, task_id: i64, label_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM label_tasks WHERE task_id = ? AND label_id = ?")
            .bind(task_id)
            .bind(label_id)
            .execute(&self.pool)
            .await?;
        self.touch_task(task_id).await
    }

    pub async fn add_reminder(&self, task_id: i64, reminder: i64) -> Result<()> {
        sqlx::query("INSERT INTO task_reminders (task_id, reminder) VALUES (?, ?)")
            .bind(task_id)
            .bind(reminder)
            .execute(&self.pool)
            .await?;
        self.touch_task(task_id).await
    }

    pub async fn set_position(&self, task_id: i64, project_view_id: i64, position: f64) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO task_positions (task_id, project_view_id, position) VALUES (?, ?, ?)
               ON CONFLICT (task_id, project_view_id) DO UPDATE SET position = excluded.position"#,
        )
        .bind(task_id)
        .bind(project_view_id)
        .bind(position)
        .execute(&self.pool)
        .await?;
        self.touch_task(task_id).await
    }
}

#[cfg(test)]
mod tests;
