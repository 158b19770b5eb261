use poem::{error::ResponseError, http::StatusCode};
use thiserror::Error;

/// Errors raised while resolving, compiling or executing a task search
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid filter expression '{expression}': {reason}")]
    InvalidFilterExpression { expression: String, reason: String },

    #[error("task field '{field}' does not exist")]
    InvalidTaskField { field: String },

    #[error("comparator '{comparator}' is not supported for task field '{field}'")]
    InvalidTaskFilterComparator { field: String, comparator: String },

    #[error("value '{value}' is not valid for task field '{field}'")]
    InvalidTaskFilterValue { field: String, value: String },

    #[error("unknown timezone '{timezone}'")]
    InvalidTimezone { timezone: String },

    #[error("invalid sort order '{order}', expected 'asc' or 'desc'")]
    InvalidSortOrder { order: String },

    #[error("sorting by position requires a project view")]
    MustHaveContextToSortByPosition,

    #[error("search index collection '{collection}' has not completed its first sync")]
    IndexNotYetSynced { collection: String },

    #[error("project {scope} is not readable by the current identity")]
    ScopeNotReadable { scope: i64 },

    #[error("saved filter {id} does not exist")]
    SavedFilterNotFound { id: i64 },

    #[error("database error: {0:#}")]
    Database(#[source] anyhow::Error),

    #[error("search index error: {0:#}")]
    Index(#[source] anyhow::Error),
}

impl SearchError {
    pub(crate) fn expression(expression: &str, reason: impl Into<String>) -> Self {
        SearchError::InvalidFilterExpression {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn field(field: &str) -> Self {
        SearchError::InvalidTaskField {
            field: field.to_string(),
        }
    }

    pub(crate) fn value(field: &str, value: &str) -> Self {
        SearchError::InvalidTaskFilterValue {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    /// Validation errors are caused by the request and must not be retried
    pub fn is_validation(&self) -> bool {
        !matches!(
            self,
            SearchError::IndexNotYetSynced { .. }
                | SearchError::Database(_)
                | SearchError::Index(_)
        )
    }
}

impl ResponseError for SearchError {
    fn status(&self) -> StatusCode {
        match self {
            SearchError::ScopeNotReadable { .. } => StatusCode::FORBIDDEN,
            SearchError::SavedFilterNotFound { .. } => StatusCode::NOT_FOUND,
            SearchError::IndexNotYetSynced { .. } => StatusCode::SERVICE_UNAVAILABLE,
            SearchError::Database(_) | SearchError::Index(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}
