use crate::database::Task;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stand-in for an absent date: 0001-01-01T00:00:00Z, below any real task date
pub const NULL_DATE_SENTINEL: i64 = -62135596800;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssigneeDocument {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelDocument {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionDocument {
    pub project_view_id: i64,
    pub position: f64,
}

/// A task as stored in the search index.
///
/// Nullable dates are written twice: the plain attribute carries
/// [`NULL_DATE_SENTINEL`] when absent so it stays filterable, while the
/// `_sort` twin is left out so the engine can sort missing values last.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskDocument {
    pub id: String,
    pub task_id: i64,
    pub title: String,
    pub description: String,
    pub done: bool,
    /// 0 or 1; the engine cannot sort on booleans
    pub done_sort: i64,
    pub done_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done_at_sort: Option<i64>,
    pub due_date: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date_sort: Option<i64>,
    pub start_date: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date_sort: Option<i64>,
    pub end_date: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date_sort: Option<i64>,
    pub created_by_id: i64,
    pub project_id: i64,
    pub parent_project_id: i64,
    pub repeat_after: i64,
    pub priority: i64,
    pub hex_color: String,
    pub percent_done: f64,
    pub uid: String,
    pub created: i64,
    pub updated: i64,
    pub index: i64,
    pub assignees: Vec<AssigneeDocument>,
    pub labels: Vec<LabelDocument>,
    pub reminders: Vec<i64>,
    pub positions: Vec<PositionDocument>,
    /// `position_view_<id>` per project view, for sorting by position
    #[serde(flatten)]
    pub view_positions: BTreeMap<String, f64>,
}

pub fn position_attribute(project_view_id: i64) -> String {
    format!("position_view_{}", project_view_id)
}

impl TaskDocument {
    /// Document without relations; the caller attaches those it loaded
    pub fn from_task(task: &Task, parent_project_id: i64) -> Self {
        Self {
            id: task.id.to_string(),
            task_id: task.id,
            title: task.title.clone(),
            description: task.description.clone(),
            done: task.done,
            done_sort: i64::from(task.done),
            done_at: task.done_at.unwrap_or(NULL_DATE_SENTINEL),
            done_at_sort: task.done_at,
            due_date: task.due_date.unwrap_or(NULL_DATE_SENTINEL),
            due_date_sort: task.due_date,
            start_date: task.start_date.unwrap_or(NULL_DATE_SENTINEL),
            start_date_sort: task.start_date,
            end_date: task.end_date.unwrap_or(NULL_DATE_SENTINEL),
            end_date_sort: task.end_date,
            created_by_id: task.created_by_id,
            project_id: task.project_id,
            parent_project_id,
            repeat_after: task.repeat_after,
            priority: task.priority,
            hex_color: task.hex_color.clone(),
            percent_done: task.percent_done,
            uid: task.uid.clone(),
            created: task.created,
            updated: task.updated,
            index: task.index,
            assignees: Vec::new(),
            labels: Vec::new(),
            reminders: Vec::new(),
            positions: Vec::new(),
            view_positions: BTreeMap::new(),
        }
    }

    pub fn set_positions(&mut self, positions: Vec<PositionDocument>) {
        self.view_positions = positions
            .iter()
            .map(|p| (position_attribute(p.project_view_id), p.position))
            .collect();
        self.positions = positions;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task {
            id: 7,
            title: "Water plants".to_string(),
            project_id: 2,
            due_date: Some(1_700_000_000),
            index: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_null_dates_use_sentinel_and_omit_sort_twin() {
        let doc = TaskDocument::from_task(&task(), 0);
        let json = serde_json::to_value(&doc).unwrap();

        assert_eq!(json["id"], "7");
        assert_eq!(json["due_date"], 1_700_000_000);
        assert_eq!(json["due_date_sort"], 1_700_000_000);
        assert_eq!(json["start_date"], NULL_DATE_SENTINEL);
        assert!(json.get("start_date_sort").is_none());
        assert!(json.get("done_at_sort").is_none());
        assert_eq!(json["done"], false);
        assert_eq!(json["done_sort"], 0);
    }

    #[test]
    fn test_positions_flatten_per_view() {
        let mut doc = TaskDocument::from_task(&task(), 0);
        doc.set_positions(vec![
            PositionDocument {
                project_view_id: 4,
                position: 1.5,
            },
            PositionDocument {
                project_view_id: 9,
                position: 300.0,
            },
        ]);
        let json = serde_json::to_value(&doc).unwrap();

        assert_eq!(json["position_view_4"], 1.5);
        assert_eq!(json["position_view_9"], 300.0);
        assert_eq!(json["positions"][1]["project_view_id"], 9);
    }
}
