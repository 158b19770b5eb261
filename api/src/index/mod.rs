//! Secondary search index: document layout, clients and the event listener
//! that keeps it current.

pub mod document;
pub mod listener;
pub mod memory;
pub mod typesense;

pub use document::{
    AssigneeDocument, LabelDocument, PositionDocument, TaskDocument, NULL_DATE_SENTINEL,
};
pub use listener::IndexListener;
pub use memory::MemoryIndex;
pub use typesense::TypesenseClient;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

/// Index engines cap the number of sort fields per query
pub const MAX_SORT_FIELDS: usize = 3;

/// Attributes free-text search runs against
pub const QUERY_BY: &[&str] = &["title", "description"];

#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexSearchRequest {
    /// Free-text query; `*` matches everything
    pub q: String,
    pub query_by: Vec<String>,
    pub filter_by: String,
    pub sort_by: String,
    /// 1-based
    pub page: i64,
    pub per_page: i64,
}

/// Matching task ids in index order, plus the total hit count
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexSearchResponse {
    pub ids: Vec<i64>,
    pub found: i64,
}

#[async_trait]
pub trait IndexClient: Send + Sync {
    /// Create the collection if it does not exist yet
    async fn ensure_collection(&self, collection: &str) -> Result<()>;

    /// Drop and create the collection, discarding every document
    async fn recreate_collection(&self, collection: &str) -> Result<()>;

    async fn upsert_documents(&self, collection: &str, documents: &[TaskDocument]) -> Result<()>;

    async fn delete_documents(&self, collection: &str, task_ids: &[i64]) -> Result<()>;

    async fn search(
        &self,
        collection: &str,
        request: &IndexSearchRequest,
    ) -> Result<IndexSearchResponse>;
}

/// Collection schema for task documents
pub fn collection_schema(collection: &str) -> serde_json::Value {
    json!({
        "name": collection,
        "enable_nested_fields": true,
        "fields": [
            {"name": "task_id", "type": "int64"},
            {"name": "title", "type": "string", "sort": true},
            {"name": "description", "type": "string", "sort": true},
            {"name": "done", "type": "bool"},
            {"name": "done_at", "type": "int64"},
            {"name": "due_date", "type": "int64"},
            {"name": "start_date", "type": "int64"},
            {"name": "end_date", "type": "int64"},
            {"name": ".*_sort", "type": "int64", "optional": true},
            {"name": "created_by_id", "type": "int64"},
            {"name": "project_id", "type": "int64"},
            {"name": "parent_project_id", "type": "int64"},
            {"name": "repeat_after", "type": "int64"},
            {"name": "priority", "type": "int64"},
            {"name": "hex_color", "type": "string", "sort": true},
            {"name": "percent_done", "type": "float"},
            {"name": "uid", "type": "string", "sort": true},
            {"name": "created", "type": "int64"},
            {"name": "updated", "type": "int64"},
            {"name": "index", "type": "int64"},
            {"name": "assignees", "type": "object[]", "optional": true},
            {"name": "labels", "type": "object[]", "optional": true},
            {"name": "reminders", "type": "int64[]", "optional": true},
            {"name": "positions", "type": "object[]", "optional": true},
            {"name": "position_view_.*", "type": "float", "optional": true},
        ],
        "default_sorting_field": "task_id",
    })
}
