use super::*;
use crate::auth::{LINK_SHARE_ID_HEADER, USER_ID_HEADER};
use crate::database::test_helpers::setup_test_db;
use crate::database::{Database, TaskInput};
use crate::search::{DatabaseSearcher, ScopeResolver, TaskSearchService};
use chrono_tz::Tz;
use poem::http::StatusCode;
use poem::test::TestClient;
use poem::{EndpointExt, Route};
use poem_openapi::OpenApiService;
use std::sync::Arc;

struct Setup {
    alice: i64,
    shared: i64,
    private: i64,
}

async fn seed(db: &Database) -> Setup {
    let alice = db.create_user("alice", "").await.unwrap();
    let shared_project = db.create_project("Shared", alice, None).await.unwrap();
    let private_project = db.create_project("Private", alice, None).await.unwrap();
    let input = |title: &str| TaskInput {
        title: title.to_string(),
        ..Default::default()
    };
    db.insert_task(shared_project, alice, &input("Shared task"))
        .await
        .unwrap();
    db.insert_task(private_project, alice, &input("Private task"))
        .await
        .unwrap();
    let shared = db.create_link_share(shared_project, "hash").await.unwrap();
    Setup {
        alice,
        shared,
        private: private_project,
    }
}

async fn client() -> (TestClient<impl poem::Endpoint>, Setup) {
    let db = Arc::new(setup_test_db().await);
    let setup = seed(&db).await;
    let resolver = ScopeResolver::new(db.clone(), db.clone(), Tz::UTC, 50);
    let service = Arc::new(TaskSearchService::new(
        resolver,
        Arc::new(DatabaseSearcher::new(db.clone())),
    ));

    let api = OpenApiService::new(create_combined_api(), "Tasks API", "test").server("/api/v1");
    let app = Route::new().nest("/api/v1", api).data(db).data(service);
    (TestClient::new(app), setup)
}

async fn body(resp: poem::test::TestResponse) -> serde_json::Value {
    let text = resp.0.into_body().into_string().await.unwrap();
    serde_json::from_str(&text).unwrap()
}

fn titles(body: &serde_json::Value) -> Vec<String> {
    body["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_health() {
    let (cli, _) = client().await;
    let resp = cli.get("/api/v1/health").send().await;
    resp.assert_status_is_ok();
    assert_eq!(body(resp).await["success"], true);
}

#[tokio::test]
async fn test_search_as_user() {
    let (cli, setup) = client().await;
    let resp = cli
        .get("/api/v1/tasks")
        .header(USER_ID_HEADER, setup.alice.to_string())
        .query("filter", &"title like private")
        .send()
        .await;
    resp.assert_status_is_ok();

    let json = body(resp).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["total"], 1);
    assert_eq!(titles(&json), vec!["Private task"]);
}

#[tokio::test]
async fn test_link_share_is_pinned_to_its_project() {
    let (cli, setup) = client().await;
    let resp = cli
        .get("/api/v1/tasks")
        .header(LINK_SHARE_ID_HEADER, setup.shared.to_string())
        .query("scope", &setup.private)
        .send()
        .await;
    resp.assert_status_is_ok();
    assert_eq!(titles(&body(resp).await), vec!["Shared task"]);
}

#[tokio::test]
async fn test_identity_required() {
    let (cli, _) = client().await;
    let resp = cli.get("/api/v1/tasks").send().await;
    resp.assert_status(StatusCode::UNAUTHORIZED);

    let resp = cli
        .get("/api/v1/tasks")
        .header(USER_ID_HEADER, "9999")
        .send()
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_errors_use_envelope() {
    let (cli, setup) = client().await;
    let resp = cli
        .get("/api/v1/tasks")
        .header(USER_ID_HEADER, setup.alice.to_string())
        .query("filter", &"colour = red")
        .send()
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let json = body(resp).await;
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("colour"));

    let resp = cli
        .get("/api/v1/tasks")
        .header(USER_ID_HEADER, setup.alice.to_string())
        .query("scope", &424242)
        .send()
        .await;
    resp.assert_status(StatusCode::FORBIDDEN);
}
