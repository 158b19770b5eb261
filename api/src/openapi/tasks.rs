use super::common::{default_false, ApiResponse, ApiTags};
use crate::auth::Principal;
use crate::database::Task;
use crate::search::{SearchError, TaskSearchRequest, TaskSearchService};
use poem::error::ResponseError;
use poem::http::StatusCode;
use poem::web::Data;
use poem_openapi::{param::Query, payload::Json, Object, OpenApi};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize, Object)]
pub struct TaskPage {
    pub items: Vec<Task>,
    /// Number of tasks matching, across all pages
    pub total: i64,
    pub page: i64,
}

#[derive(poem_openapi::ApiResponse)]
pub enum SearchTasksResponse {
    #[oai(status = 200)]
    Ok(Json<ApiResponse<TaskPage>>),
    #[oai(status = 400)]
    BadRequest(Json<ApiResponse<TaskPage>>),
    #[oai(status = 403)]
    Forbidden(Json<ApiResponse<TaskPage>>),
    #[oai(status = 404)]
    NotFound(Json<ApiResponse<TaskPage>>),
    #[oai(status = 503)]
    Unavailable(Json<ApiResponse<TaskPage>>),
    #[oai(status = 500)]
    InternalError(Json<ApiResponse<TaskPage>>),
}

impl From<SearchError> for SearchTasksResponse {
    fn from(e: SearchError) -> Self {
        let body = Json(ApiResponse::err(&e));
        match e.status() {
            StatusCode::BAD_REQUEST => SearchTasksResponse::BadRequest(body),
            StatusCode::FORBIDDEN => SearchTasksResponse::Forbidden(body),
            StatusCode::NOT_FOUND => SearchTasksResponse::NotFound(body),
            StatusCode::SERVICE_UNAVAILABLE => SearchTasksResponse::Unavailable(body),
            _ => {
                tracing::error!("Task search failed: {}", e);
                SearchTasksResponse::InternalError(body)
            }
        }
    }
}

pub struct TasksApi;

#[OpenApi]
impl TasksApi {
    /// Search tasks
    ///
    /// Filters, sorts and pages the tasks visible to the caller. `scope` is a
    /// project id, `-1` for favorites or `-(n + 1)` for saved filter `n`.
    #[oai(path = "/tasks", method = "get", tag = "ApiTags::Tasks")]
    #[allow(clippy::too_many_arguments)]
    async fn search_tasks(
        &self,
        service: Data<&Arc<TaskSearchService>>,
        principal: Principal,
        scope: Query<Option<i64>>,
        #[oai(default)] s: Query<String>,
        #[oai(default)] filter: Query<String>,
        #[oai(default)] filter_timezone: Query<String>,
        #[oai(default)] sort_by: Query<Vec<String>>,
        #[oai(default)] order_by: Query<Vec<String>>,
        project_view_id: Query<Option<i64>>,
        #[oai(default = "default_false")] filter_include_nulls: Query<bool>,
        #[oai(default)] page: Query<i64>,
        #[oai(default)] per_page: Query<i64>,
    ) -> SearchTasksResponse {
        let request = TaskSearchRequest {
            scope: scope.0,
            search: s.0,
            filter: filter.0,
            filter_timezone: filter_timezone.0,
            sort_by: sort_by.0,
            order_by: order_by.0,
            project_view_id: project_view_id.0,
            include_nulls: filter_include_nulls.0,
            page: page.0,
            per_page: per_page.0,
        };
        let requested_page = request.page.max(1);

        match service.search(&principal, request).await {
            Ok(result) => SearchTasksResponse::Ok(Json(ApiResponse::ok(TaskPage {
                items: result.items,
                total: result.total,
                page: requested_page,
            }))),
            Err(e) => e.into(),
        }
    }
}
