use super::*;
use crate::database::Task;
use crate::index::{AssigneeDocument, PositionDocument, NULL_DATE_SENTINEL};

const COLLECTION: &str = "tasks";

fn document(id: i64, title: &str, due_date: Option<i64>, assignees: &[&str]) -> TaskDocument {
    let task = Task {
        id,
        title: title.to_string(),
        project_id: 1,
        due_date,
        priority: id,
        index: id,
        ..Default::default()
    };
    let mut doc = TaskDocument::from_task(&task, 0);
    doc.assignees = assignees
        .iter()
        .enumerate()
        .map(|(i, name)| AssigneeDocument {
            id: i as i64 + 1,
            username: name.to_string(),
        })
        .collect();
    doc
}

async fn seeded() -> MemoryIndex {
    let index = MemoryIndex::new();
    index.ensure_collection(COLLECTION).await.unwrap();
    index
        .upsert_documents(
            COLLECTION,
            &[
                document(1, "Buy milk", Some(100), &["alice"]),
                document(2, "Walk dog", None, &["bob", "alice"]),
                document(3, "File taxes", Some(300), &[]),
            ],
        )
        .await
        .unwrap();
    index
}

async fn search(index: &MemoryIndex, filter: &str, sort: &str) -> Vec<i64> {
    index
        .search(
            COLLECTION,
            &IndexSearchRequest {
                q: "*".to_string(),
                query_by: vec!["title".to_string()],
                filter_by: filter.to_string(),
                sort_by: sort.to_string(),
                page: 1,
                per_page: 50,
            },
        )
        .await
        .unwrap()
        .ids
}

#[tokio::test]
async fn test_scalar_comparisons() {
    let index = seeded().await;
    assert_eq!(search(&index, "priority:>=2", "task_id:asc").await, vec![2, 3]);
    assert_eq!(search(&index, "priority:!=2", "task_id:asc").await, vec![1, 3]);
    assert_eq!(search(&index, "task_id:=[3,1]", "task_id:asc").await, vec![1, 3]);
    assert_eq!(search(&index, "task_id:!=[3,1]", "task_id:asc").await, vec![2]);
    assert_eq!(search(&index, "done:=false", "task_id:asc").await, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_sentinel_dates() {
    let index = seeded().await;
    let filter = format!("(due_date:<200 && due_date:!={})", NULL_DATE_SENTINEL);
    assert_eq!(search(&index, &filter, "task_id:asc").await, vec![1]);

    let filter = format!("(due_date:={} || due_date:<200)", NULL_DATE_SENTINEL);
    assert_eq!(search(&index, &filter, "task_id:asc").await, vec![1, 2]);
}

#[tokio::test]
async fn test_nested_arrays() {
    let index = seeded().await;
    assert_eq!(
        search(&index, "assignees.username:=`alice`", "task_id:asc").await,
        vec![1, 2]
    );
    assert_eq!(
        search(&index, "assignees.username:!=`alice`", "task_id:asc").await,
        vec![3]
    );
}

#[tokio::test]
async fn test_precedence_and_groups() {
    let index = seeded().await;
    assert_eq!(
        search(&index, "task_id:=1 || task_id:=2 && priority:=3", "task_id:asc").await,
        vec![1]
    );
    assert_eq!(
        search(&index, "(task_id:=1 || task_id:=2) && priority:=2", "task_id:asc").await,
        vec![2]
    );
}

#[tokio::test]
async fn test_substring_match_is_case_insensitive() {
    let index = seeded().await;
    assert_eq!(search(&index, "title:`MILK`", "task_id:asc").await, vec![1]);
}

#[tokio::test]
async fn test_missing_values_sort_last() {
    let index = seeded().await;
    assert_eq!(
        search(&index, "", "due_date_sort(missing_values: last):asc,task_id:asc").await,
        vec![1, 3, 2]
    );
    assert_eq!(
        search(&index, "", "due_date_sort(missing_values: last):desc,task_id:asc").await,
        vec![3, 1, 2]
    );
}

#[tokio::test]
async fn test_position_per_view() {
    let index = seeded().await;
    let mut doc = document(4, "Plan trip", None, &[]);
    doc.set_positions(vec![PositionDocument {
        project_view_id: 5,
        position: 0.5,
    }]);
    index.upsert_documents(COLLECTION, &[doc]).await.unwrap();

    let ids = search(&index, "", "position_view_5(missing_values: last):asc,task_id:asc").await;
    assert_eq!(ids, vec![4, 1, 2, 3]);
    assert_eq!(
        search(&index, "positions.position:<1", "task_id:asc").await,
        vec![4]
    );
}

#[tokio::test]
async fn test_query_pagination_and_delete() {
    let index = seeded().await;
    let response = index
        .search(
            COLLECTION,
            &IndexSearchRequest {
                q: "i".to_string(),
                query_by: vec!["title".to_string()],
                filter_by: String::new(),
                sort_by: "task_id:desc".to_string(),
                page: 2,
                per_page: 1,
            },
        )
        .await
        .unwrap();
    // "Buy milk" and "File taxes" contain an i
    assert_eq!(response.found, 2);
    assert_eq!(response.ids, vec![1]);

    index.delete_documents(COLLECTION, &[1, 2]).await.unwrap();
    assert_eq!(index.document_count(COLLECTION), Some(1));

    index.recreate_collection(COLLECTION).await.unwrap();
    assert_eq!(index.document_count(COLLECTION), Some(0));
}

#[tokio::test]
async fn test_invalid_filter_and_missing_collection() {
    let index = seeded().await;
    let request = IndexSearchRequest {
        filter_by: "priority:>".to_string(),
        per_page: 10,
        ..Default::default()
    };
    assert!(index.search(COLLECTION, &request).await.is_err());
    assert!(index
        .search("other", &IndexSearchRequest::default())
        .await
        .is_err());
}
