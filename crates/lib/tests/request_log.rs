//! Integration tests: the request log layer every service is served with.

mod common;

use axum::{http::StatusCode, routing::get, Router};
use lib::http;
use std::time::Duration;

fn app() -> Router {
    Router::new()
        .route("/health", get(http::health))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        )
}

#[tokio::test]
async fn responses_pass_through_unchanged() {
    let base = common::spawn(http::with_request_log(app(), Duration::from_secs(5))).await;
    let resp = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "OK");

    let resp = reqwest::get(format!("{}/missing", base)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn handler_past_deadline_is_504() {
    let base = common::spawn(http::with_request_log(app(), Duration::from_millis(100))).await;
    let resp = tokio::time::timeout(
        Duration::from_secs(2),
        reqwest::get(format!("{}/slow", base)),
    )
    .await
    .expect("deadline not enforced")
    .unwrap();
    assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
}
