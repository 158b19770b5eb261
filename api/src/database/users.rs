use super::types::Database;
use crate::auth::AuthenticatedUser;
use anyhow::Result;

impl Database {
    pub async fn create_user(&self, username: &str, timezone: &str) -> Result<i64> {
        let id = sqlx::query_scalar("INSERT INTO users (username, timezone) VALUES (?, ?) RETURNING id")
            .bind(username)
            .bind(timezone)
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<AuthenticatedUser>> {
        let row = sqlx::query_as::<_, (i64, String, String)>(
            "SELECT id, username, timezone FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, username, timezone)| AuthenticatedUser {
            id,
            username,
            timezone,
        }))
    }
}
