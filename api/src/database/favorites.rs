use super::types::Database;
use anyhow::Result;

/// `favorites.kind` of a favorited task
pub const FAVORITE_KIND_TASK: i64 = 1;

impl Database {
    pub async fn add_favorite(&self, user_id: i64, task_id: i64) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO favorites (entity_id, user_id, kind) VALUES (?, ?, ?)")
            .bind(task_id)
            .bind(user_id)
            .bind(FAVORITE_KIND_TASK)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn remove_favorite(&self, user_id: i64, task_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM favorites WHERE entity_id = ? AND user_id = ? AND kind = ?")
            .bind(task_id)
            .bind(user_id)
            .bind(FAVORITE_KIND_TASK)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn favorite_task_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT entity_id FROM favorites WHERE user_id = ? AND kind = ? ORDER BY entity_id",
        )
        .bind(user_id)
        .bind(FAVORITE_KIND_TASK)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}
