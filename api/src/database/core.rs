use super::types::{Database, SyncState};
use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL {}", database_url))?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, applying pending migrations
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!()
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(Self { pool })
    }

    pub async fn get_sync_state(&self, collection: &str) -> Result<Option<SyncState>> {
        let state = sqlx::query_as::<_, SyncState>(
            "SELECT collection, sync_started_at, sync_finished_at FROM index_sync_state WHERE collection = ?",
        )
        .bind(collection)
        .fetch_optional(&self.pool)
        .await?;
        Ok(state)
    }

    /// Create the watermark row of a collection that has never been synced.
    /// Returns false if another run created it first.
    pub async fn insert_sync_state(&self, collection: &str, started_at: i64) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO index_sync_state (collection, sync_started_at, sync_finished_at) VALUES (?, ?, NULL)",
        )
        .bind(collection)
        .bind(started_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Move the watermark forward, but only if nobody else moved it since
    /// `expected_started_at` was read. Returns whether the row was updated.
    pub async fn advance_sync_state(
        &self,
        collection: &str,
        expected_started_at: i64,
        started_at: i64,
        finished_at: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE index_sync_state SET sync_started_at = ?, sync_finished_at = ? WHERE collection = ? AND sync_started_at = ?",
        )
        .bind(started_at)
        .bind(finished_at)
        .bind(collection)
        .bind(expected_started_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Forget the watermark so the next run re-indexes everything
    pub async fn reset_sync_state(&self, collection: &str) -> Result<()> {
        sqlx::query("DELETE FROM index_sync_state WHERE collection = ?")
            .bind(collection)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Test helper method to access the underlying pool
    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
