use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use stockledger_api::config::AppConfig;
use stockledger_api::events::{Event, EventSender};
use stockledger_api::migrator::Migrator;
use stockledger_api::{app_routes, AppState};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        host: "127.0.0.1".into(),
        port: 8080,
        environment: "development".into(),
        log_level: "info".into(),
        log_json: false,
        auto_migrate: false,
        strict_locations: false,
        db_max_connections: 1,
        db_min_connections: 1,
        db_connect_timeout_secs: 5,
        db_idle_timeout_secs: 600,
        db_acquire_timeout_secs: 8,
        event_channel_capacity: 256,
    }
}

async fn spawn_router() -> (Router, mpsc::Receiver<Event>) {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(5))
        .sqlx_logging(false);

    let db = Database::connect(opts)
        .await
        .expect("failed to connect to in-memory sqlite");
    Migrator::up(&db, None)
        .await
        .expect("failed to run migrations");

    let (tx, rx) = mpsc::channel(256);
    let state = AppState::new(Arc::new(db), test_config(), Arc::new(EventSender::new(tx)));
    (app_routes(state), rx)
}

async fn body_json(body: Body) -> Value {
    let bytes = to_bytes(body, usize::MAX).await.expect("body read");
    serde_json::from_slice(&bytes).expect("body is json")
}

#[tokio::test]
async fn health_reports_database_status() {
    let (app, _rx) = spawn_router().await;

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response.into_body()).await;
    assert_eq!(payload["status"], "ok");
    assert_eq!(payload["database"], "up");
    assert_eq!(payload["service"], "stockledger-api");
}

#[tokio::test]
async fn requests_without_caller_headers_are_rejected() {
    let (app, _rx) = spawn_router().await;

    let response = app
        .oneshot(
            Request::get("/api/v1/stock/movements")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn movement_log_is_paginated() {
    let (app, _rx) = spawn_router().await;
    let tenant = Uuid::new_v4();
    let actor = Uuid::new_v4();
    let product = Uuid::new_v4();

    for _ in 0..3 {
        let request = Request::post("/api/v1/stock/movements")
            .header("X-Tenant-Id", tenant.to_string())
            .header("X-Actor-Id", actor.to_string())
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({
                    "product_id": product,
                    "kind": "PURCHASE",
                    "quantity": 5,
                    "location_to": "Main Warehouse"
                })
                .to_string(),
            ))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .oneshot(
            Request::get("/api/v1/stock/movements?page=1&limit=2")
                .header("X-Tenant-Id", tenant.to_string())
                .header("X-Actor-Id", actor.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response.into_body()).await;
    assert_eq!(payload["total"], 3);
    assert_eq!(payload["page"], 1);
    assert_eq!(payload["limit"], 2);
    assert_eq!(payload["items"].as_array().map(Vec::len), Some(2));
}
