use super::types::Database;
use crate::search::{SavedFilter, SavedFilterStore};
use anyhow::Result;
use async_trait::async_trait;

#[derive(sqlx::FromRow)]
struct SavedFilterRow {
    id: i64,
    owner_id: i64,
    title: String,
    filter: String,
    sort_by: String,
    order_by: String,
    include_nulls: bool,
    timezone: String,
}

// Sort lists are stored comma-separated
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl From<SavedFilterRow> for SavedFilter {
    fn from(row: SavedFilterRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            title: row.title,
            filter: row.filter,
            sort_by: split_list(&row.sort_by),
            order_by: split_list(&row.order_by),
            include_nulls: row.include_nulls,
            timezone: row.timezone,
        }
    }
}

impl Database {
    /// Persist a saved filter; `filter.id` is ignored and the new id returned
    pub async fn create_saved_filter(&self, filter: &SavedFilter) -> Result<i64> {
        let id = sqlx::query_scalar(
            r#"INSERT INTO saved_filters (owner_id, title, filter, sort_by, order_by, include_nulls, timezone)
               VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id"#,
        )
        .bind(filter.owner_id)
        .bind(&filter.title)
        .bind(&filter.filter)
        .bind(filter.sort_by.join(","))
        .bind(filter.order_by.join(","))
        .bind(filter.include_nulls)
        .bind(&filter.timezone)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }
}

#[async_trait]
impl SavedFilterStore for Database {
    async fn get_saved_filter(&self, id: i64) -> Result<Option<SavedFilter>> {
        let row = sqlx::query_as::<_, SavedFilterRow>(
            "SELECT id, owner_id, title, filter, sort_by, order_by, include_nulls, timezone FROM saved_filters WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(SavedFilter::from))
    }
}
