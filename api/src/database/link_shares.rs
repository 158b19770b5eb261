use super::types::Database;
use crate::auth::LinkShareIdentity;
use anyhow::Result;

impl Database {
    pub async fn create_link_share(&self, project_id: i64, hash: &str) -> Result<i64> {
        let id = sqlx::query_scalar(
            "INSERT INTO link_shares (hash, project_id) VALUES (?, ?) RETURNING id",
        )
        .bind(hash)
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn get_link_share(&self, id: i64) -> Result<Option<LinkShareIdentity>> {
        let row = sqlx::query_as::<_, (i64, i64)>("SELECT id, project_id FROM link_shares WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(id, project_id)| LinkShareIdentity { id, project_id }))
    }
}
