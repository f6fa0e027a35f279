//! Router tests driven through `tower::ServiceExt::oneshot`

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use broker::{BrokerHandle, BrokerService};
use contracts::{Record, ServerConfig};
use http_body_util::BodyExt;
use ingestion::CounterRegistry;
use serde_json::Value;
use tower::ServiceExt;

use http_api::{build_router, AppState};

fn app(broker: BrokerHandle, registry: CounterRegistry) -> Router {
    build_router(AppState::new(broker, registry), &ServerConfig::default())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn wait_for_subscribers(broker: &BrokerHandle, expected: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while broker.stats().await.unwrap().subscribers != expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_status_lists_sources() {
    let (broker, _task) = BrokerService::spawn(8);
    let registry = CounterRegistry::new();
    let counters = registry.register("app");
    counters.record_line();
    counters.record_line();
    counters.record_error();

    let response = app(broker, registry).oneshot(get("/v0/logs")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["sources"]["app"]["linesRead"], 2);
    assert_eq!(json["sources"]["app"]["errorsCount"], 1);
    assert_eq!(json["realtime"]["subscribers"], 0);
}

#[tokio::test]
async fn test_realtime_streams_events() {
    let (broker, _task) = BrokerService::spawn(8);
    let app = app(broker.clone(), CounterRegistry::new());

    let response = app.oneshot(get("/v0/logs/all/realtime")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
    assert_eq!(headers[header::CONNECTION], "keep-alive");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    broker.publish(Record::new("app", "h", "one")).unwrap();
    broker.publish(Record::new("app", "h", "two")).unwrap();

    let mut body = response.into_body();
    let first = body.frame().await.unwrap().unwrap().into_data().unwrap();
    let second = body.frame().await.unwrap().unwrap().into_data().unwrap();
    assert_eq!(&first[..], b"data: one\n\n");
    assert_eq!(&second[..], b"data: two\n\n");
}

#[tokio::test]
async fn test_client_disconnect_unsubscribes() {
    let (broker, _task) = BrokerService::spawn(8);
    let app = app(broker.clone(), CounterRegistry::new());

    let response = app.oneshot(get("/v0/logs/all/realtime")).await.unwrap();
    assert_eq!(broker.stats().await.unwrap().subscribers, 1);

    drop(response);
    wait_for_subscribers(&broker, 0).await;
}

#[tokio::test]
async fn test_broker_shutdown_ends_stream() {
    let (broker, task) = BrokerService::spawn(8);
    let app = app(broker.clone(), CounterRegistry::new());

    let response = app.oneshot(get("/v0/logs/all/realtime")).await.unwrap();
    broker.publish(Record::new("app", "h", "last")).unwrap();
    broker.shutdown().unwrap();
    task.await.unwrap();

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"data: last\n\n");
}

#[tokio::test]
async fn test_status_after_broker_stopped_keeps_sources() {
    let (broker, task) = BrokerService::spawn(8);
    broker.shutdown().unwrap();
    task.await.unwrap();

    let registry = CounterRegistry::new();
    let counters = registry.register("app");
    counters.record_line();
    counters.record_error();

    let response = app(broker, registry).oneshot(get("/v0/logs")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["sources"]["app"]["linesRead"], 1);
    assert_eq!(json["sources"]["app"]["errorsCount"], 1);
    assert!(json.get("realtime").is_none());
}

#[tokio::test]
async fn test_realtime_after_broker_stopped() {
    let (broker, task) = BrokerService::spawn(8);
    broker.shutdown().unwrap();
    task.await.unwrap();

    let response = app(broker, CounterRegistry::new())
        .oneshot(get("/v0/logs/all/realtime"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "realtime feed unavailable");
}

#[tokio::test]
async fn test_unknown_path() {
    let (broker, _task) = BrokerService::spawn(8);
    let response = app(broker, CounterRegistry::new())
        .oneshot(get("/v1/other"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
