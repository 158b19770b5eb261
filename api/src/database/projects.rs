use super::types::Database;
use crate::auth::Principal;
use crate::search::ScopeAuthorizer;
use anyhow::Result;
use async_trait::async_trait;

impl Database {
    pub async fn create_project(
        &self,
        title: &str,
        owner_id: i64,
        parent_project_id: Option<i64>,
    ) -> Result<i64> {
        let id = sqlx::query_scalar(
            "INSERT INTO projects (title, owner_id, parent_project_id, created) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(title)
        .bind(owner_id)
        .bind(parent_project_id.unwrap_or(0))
        .bind(chrono::Utc::now().timestamp())
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn add_project_member(&self, project_id: i64, user_id: i64) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO project_members (project_id, user_id) VALUES (?, ?)")
            .bind(project_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn create_project_view(&self, project_id: i64, title: &str) -> Result<i64> {
        let id = sqlx::query_scalar(
            "INSERT INTO project_views (project_id, title) VALUES (?, ?) RETURNING id",
        )
        .bind(project_id)
        .bind(title)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }
}

/// Owners and members read a project; a link share reads only its own
#[async_trait]
impl ScopeAuthorizer for Database {
    async fn list_readable_projects(&self, principal: &Principal) -> Result<Vec<i64>> {
        match principal {
            Principal::LinkShare(share) => Ok(vec![share.project_id]),
            Principal::User(user) => {
                let ids = sqlx::query_scalar::<_, i64>(
                    r#"SELECT id FROM projects WHERE owner_id = ?
                       UNION
                       SELECT project_id FROM project_members WHERE user_id = ?
                       ORDER BY 1"#,
                )
                .bind(user.id)
                .bind(user.id)
                .fetch_all(&self.pool)
                .await?;
                Ok(ids)
            }
        }
    }

    async fn can_read(&self, principal: &Principal, project_id: i64) -> Result<bool> {
        match principal {
            Principal::LinkShare(share) => Ok(share.project_id == project_id),
            Principal::User(user) => {
                let count: i64 = sqlx::query_scalar(
                    r#"SELECT COUNT(*) FROM projects WHERE id = ? AND (owner_id = ?
                       OR EXISTS (SELECT 1 FROM project_members WHERE project_id = projects.id AND user_id = ?))"#,
                )
                .bind(project_id)
                .bind(user.id)
                .bind(user.id)
                .fetch_one(&self.pool)
                .await?;
                Ok(count > 0)
            }
        }
    }
}
