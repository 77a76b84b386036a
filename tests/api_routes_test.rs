use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};
use tower::ServiceExt;

use lsranks_sync::config::{Config, DatabaseConfig};
use lsranks_sync::database::Database;
use lsranks_sync::ingestor::{SyncOrchestrator, SyncStateManager};
use lsranks_sync::models::SyncTrigger;
use lsranks_sync::sources::StaticFetcher;
use lsranks_sync::web::{create_router, AppState};

const SECRET: &str = "route-secret";
const SOURCE: &str = "https://a.example/records/world";

const PAGE: &str = r#"
<h2>Open – Women</h2>
<table>
  <tr><th>Event</th><th>Athlete</th><th>Date</th><th>Time</th><th>Course</th></tr>
  <tr><td>100m Rescue Medley</td><td>Jane Doe (AUS)</td><td>01-01-2020</td><td>1:05.32</td><td>LCM 50m</td></tr>
  <tr><td>200m Obstacle Swim</td><td>Ann Smith (GER)</td><td>2019-08-10</td><td>1:59.21</td><td>Short course</td></tr>
</table>
"#;

struct TestApp {
    router: Router,
    state: AppState,
}

async fn test_app(secret: Option<&str>) -> TestApp {
    let database = Database::new(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: Some(1),
    })
    .await
    .unwrap();
    database.migrate().await.unwrap();

    let mut config = Config::default();
    config.sync.sources = SOURCE.to_string();
    config.auth.sync_secret = secret.map(str::to_string);

    let orchestrator = SyncOrchestrator::new(
        config,
        Arc::new(StaticFetcher::new().with_page(SOURCE, PAGE)),
        Arc::new(database.clone()),
        SyncStateManager::new(),
    )
    .with_run_log(Arc::new(database.clone()));

    let state = AppState {
        database,
        orchestrator,
    };
    TestApp {
        router: create_router(state.clone()),
        state,
    }
}

// Helper function to send requests to the app
async fn send_request(
    app: &Router,
    method: Method,
    uri: &str,
    bearer: Option<&str>,
) -> (StatusCode, Value) {
    let mut request_builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        request_builder = request_builder.header("authorization", format!("Bearer {}", token));
    }
    let request = request_builder.body(Body::empty()).unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let json: Value = if body_bytes.is_empty() {
        json!({})
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(json!({}))
    };

    (status, json)
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app(Some(SECRET)).await;
    let (status, body) = send_request(&app.router, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_sync_rejects_missing_and_wrong_credentials() {
    let app = test_app(Some(SECRET)).await;

    let (status, body) = send_request(&app.router, Method::POST, "/api/v1/sync", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"ok": false, "error": "unauthorized"}));

    let (status, _) =
        send_request(&app.router, Method::POST, "/api/v1/sync", Some("nope")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) =
        send_request(&app.router, Method::GET, "/api/v1/sync?secret=nope", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(app.state.database.count_records().await.unwrap(), 0);
}

#[tokio::test]
async fn test_sync_with_bearer_token_returns_summary() {
    let app = test_app(Some(SECRET)).await;

    let (status, body) =
        send_request(&app.router, Method::POST, "/api/v1/sync", Some(SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["tablesFound"], 1);
    assert_eq!(body["parsedRows"], 2);
    assert_eq!(body["upserts"], 2);
    assert!(body.get("errors").is_none());
    assert!(body.get("samples").is_none());
}

#[tokio::test]
async fn test_sync_with_query_secret_and_debug_samples() {
    let app = test_app(Some(SECRET)).await;

    let uri = format!("/api/v1/sync?secret={}&debug=true", SECRET);
    let (status, body) = send_request(&app.router, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["samples"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_sync_without_configured_secret_is_server_error() {
    let app = test_app(None).await;

    let (status, body) =
        send_request(&app.router, Method::POST, "/api/v1/sync", Some("anything")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"], "sync secret is not configured");
}

#[tokio::test]
async fn test_overlapping_sync_is_conflict() {
    let app = test_app(Some(SECRET)).await;

    let guard = app
        .state
        .orchestrator
        .state()
        .begin_run(SyncTrigger::Cli, 1)
        .await;
    let _guard = assert_ok!(guard);
    assert_err!(
        app.state
            .orchestrator
            .state()
            .begin_run(SyncTrigger::Cli, 1)
            .await
    );

    let (status, body) =
        send_request(&app.router, Method::POST, "/api/v1/sync", Some(SECRET)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["ok"], false);
}

#[tokio::test]
async fn test_unsupported_method_on_sync() {
    let app = test_app(Some(SECRET)).await;
    let (status, _) = send_request(&app.router, Method::DELETE, "/api/v1/sync", Some(SECRET)).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_records_listing_after_sync() {
    let app = test_app(Some(SECRET)).await;
    send_request(&app.router, Method::POST, "/api/v1/sync", Some(SECRET)).await;

    let (status, body) = send_request(&app.router, Method::GET, "/api/v1/records", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["count"], 2);

    let first = &body["data"]["records"][0];
    assert_eq!(first["disciplineCode"], "100_MEDLEY");
    assert_eq!(first["timeDisplay"], "1:05.32");
    assert_eq!(first["nation"], "AUS");
    assert_eq!(first["poolLength"], 50);

    let (status, body) =
        send_request(&app.router, Method::GET, "/api/v1/records?pool=25", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["records"][0]["disciplineCode"], "200_OBS");

    let (status, body) =
        send_request(&app.router, Method::GET, "/api/v1/records?pool=33", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_sync_status_and_runs() {
    let app = test_app(Some(SECRET)).await;

    let (status, body) = send_request(&app.router, Method::GET, "/api/v1/sync/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["running"], false);
    assert!(body["data"]["progress"].is_null());

    send_request(&app.router, Method::POST, "/api/v1/sync", Some(SECRET)).await;

    let (_, body) = send_request(&app.router, Method::GET, "/api/v1/sync/status", None).await;
    assert_eq!(body["data"]["progress"]["phase"], "reported");
    assert_eq!(body["data"]["progress"]["sourcesDone"], 1);

    let (status, body) = send_request(&app.router, Method::GET, "/api/v1/sync/runs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["data"][0]["trigger"], "http");
}

#[tokio::test]
async fn test_env_check_reports_booleans() {
    let app = test_app(Some(SECRET)).await;

    let (status, body) = send_request(&app.router, Method::GET, "/api/v1/env-check", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({
            "syncSecret": true,
            "sources": true,
            "databaseUrl": true,
            "schedule": false
        })
    );
}
