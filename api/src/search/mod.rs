//! Task search: filter parsing, typing, scope resolution and the SQL and
//! index compilers behind the two searchers.

pub mod builder;
pub mod coerce;
pub mod datemath;
pub mod error;
pub mod fields;
pub mod fold;
pub mod index_query;
pub mod parser;
pub mod scope;
pub mod searcher;
pub mod sort;
pub mod types;

pub use builder::{build_sql, SqlDialect, SqlQuery, SqlValue};
pub use error::SearchError;
pub use index_query::build_index_query;
pub use parser::parse_filter;
pub use scope::{SavedFilter, SavedFilterStore, ScopeAuthorizer, ScopeResolver};
pub use searcher::{DatabaseSearcher, IndexSearcher, SearchResult, Searcher};
pub use types::{SearchOptions, TaskSearchRequest};

use crate::auth::Principal;
use std::sync::Arc;

/// Entry point of the read path: resolves a request for a principal and
/// runs it on the configured searcher
pub struct TaskSearchService {
    resolver: ScopeResolver,
    searcher: Arc<dyn Searcher>,
}

impl TaskSearchService {
    pub fn new(resolver: ScopeResolver, searcher: Arc<dyn Searcher>) -> Self {
        Self { resolver, searcher }
    }

    pub async fn search(
        &self,
        principal: &Principal,
        request: TaskSearchRequest,
    ) -> Result<SearchResult, SearchError> {
        let options = self.resolver.resolve(principal, request).await?;
        self.searcher.search(&options).await
    }
}
