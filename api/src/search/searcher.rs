//! The two interchangeable search backends.

use super::builder::{build_sql, SqlDialect};
use super::error::SearchError;
use super::index_query::build_index_query;
use super::types::SearchOptions;
use crate::database::{Database, Task};
use crate::index::IndexClient;
use async_trait::async_trait;
use std::sync::Arc;

/// One page of tasks and the number of tasks matching overall
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResult {
    pub items: Vec<Task>,
    pub total: i64,
}

#[async_trait]
pub trait Searcher: Send + Sync {
    async fn search(&self, options: &SearchOptions) -> Result<SearchResult, SearchError>;
}

/// Runs searches directly against the primary store
#[derive(Debug, Clone)]
pub struct DatabaseSearcher {
    db: Arc<Database>,
    dialect: SqlDialect,
}

impl DatabaseSearcher {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            dialect: SqlDialect::Sqlite,
        }
    }
}

#[async_trait]
impl Searcher for DatabaseSearcher {
    async fn search(&self, options: &SearchOptions) -> Result<SearchResult, SearchError> {
        if options.scope.is_empty() {
            return Ok(SearchResult::default());
        }

        let query = build_sql(options, self.dialect)?;
        tracing::debug!("Task search: {}", query.where_clause);

        let (items, total) = self
            .db
            .search_tasks(&query)
            .await
            .map_err(SearchError::Database)?;
        Ok(SearchResult { items, total })
    }
}

/// Runs searches against the secondary index and loads the hits from the
/// primary store
pub struct IndexSearcher {
    db: Arc<Database>,
    client: Arc<dyn IndexClient>,
    collection: String,
}

impl IndexSearcher {
    pub fn new(db: Arc<Database>, client: Arc<dyn IndexClient>, collection: &str) -> Self {
        Self {
            db,
            client,
            collection: collection.to_string(),
        }
    }

    async fn ensure_synced(&self) -> Result<(), SearchError> {
        let state = self
            .db
            .get_sync_state(&self.collection)
            .await
            .map_err(SearchError::Database)?;
        match state {
            Some(state) if state.sync_finished_at.is_some() => Ok(()),
            _ => Err(SearchError::IndexNotYetSynced {
                collection: self.collection.clone(),
            }),
        }
    }
}

#[async_trait]
impl Searcher for IndexSearcher {
    async fn search(&self, options: &SearchOptions) -> Result<SearchResult, SearchError> {
        self.ensure_synced().await?;

        if options.scope.is_empty() {
            return Ok(SearchResult::default());
        }

        let favorite_ids = match options.scope.favorites_of {
            Some(user_id) => self
                .db
                .favorite_task_ids(user_id)
                .await
                .map_err(SearchError::Database)?,
            None => Vec::new(),
        };

        let request = build_index_query(options, &favorite_ids)?;
        tracing::debug!(
            "Index search q={} filter_by={} sort_by={}",
            request.q,
            request.filter_by,
            request.sort_by
        );

        let response = self
            .client
            .search(&self.collection, &request)
            .await
            .map_err(SearchError::Index)?;

        // Hits may reference tasks deleted after the last sync; those are
        // skipped while keeping the index order
        let items = self
            .db
            .get_tasks_by_ids(&response.ids)
            .await
            .map_err(SearchError::Database)?;
        Ok(SearchResult {
            items,
            total: response.found,
        })
    }
}
