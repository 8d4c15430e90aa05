use axum::http::StatusCode;
use dealdesk::api::{self, AppState};
use dealdesk::db::init_db;
use dealdesk::{Decimal, DeskService, Repository};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

async fn setup_test_app() -> (axum::Router, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();

    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    let service = Arc::new(DeskService::new(
        repo,
        Decimal::from_str_canonical("0.07").unwrap(),
    ));

    (api::create_router(AppState::new(service)), temp_dir)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = axum::http::Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null))
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _temp) = setup_test_app().await;
    let (status, body) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_ready_endpoint_checks_database() {
    let (app, _temp) = setup_test_app().await;
    let (status, body) = get(app, "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_unknown_deal_is_404_with_error_body() {
    let (app, _temp) = setup_test_app().await;
    let (status, body) = get(app, "/v1/deals/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nope"));
}
