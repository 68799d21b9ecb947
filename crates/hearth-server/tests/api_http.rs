//! HTTP API tests via `tower::ServiceExt::oneshot`.

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use common::test_context;
use serde_json::{json, Value};
use tower::ServiceExt;

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request should build")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should read");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

#[tokio::test]
async fn health_check_returns_ok() {
    let ctx = test_context();
    let app = hearth_server::app(ctx.state.clone());

    let response = app
        .oneshot(get_request("/health"))
        .await
        .expect("request should succeed");

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn ingest_endpoint_accepts_and_enqueues() {
    let mut ctx = test_context();
    let app = hearth_server::app(ctx.state.clone());

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/ingest",
            json!({"topic": "devices/kitchen-therm", "payload": "{\"temperature\": 21}"}),
        ))
        .await
        .expect("request should succeed");
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let message = ctx
        .ingest_rx
        .try_recv()
        .expect("message should be enqueued");
    assert_eq!(message.topic, "devices/kitchen-therm");
}

#[tokio::test]
async fn ingest_endpoint_accepts_non_json_payload_text() {
    let ctx = test_context();
    let app = hearth_server::app(ctx.state.clone());

    // The payload text is not JSON; intake still accepts it — the worker is
    // responsible for dropping it.
    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/ingest",
            json!({"topic": "devices/kitchen-therm", "payload": "not json"}),
        ))
        .await
        .expect("request should succeed");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn query_endpoints_return_empty_lists_on_fresh_db() {
    let ctx = test_context();

    for uri in [
        "/api/signals/recent",
        "/api/readings/recent",
        "/api/triggers/recent",
        "/api/readings/kitchen-therm/temperature",
        "/api/rules",
    ] {
        let app = hearth_server::app(ctx.state.clone());
        let response = app
            .oneshot(get_request(uri))
            .await
            .expect("request should succeed");
        assert_eq!(response.status(), StatusCode::OK, "uri: {uri}");
        let json = body_json(response).await;
        assert_eq!(json, json!([]), "uri: {uri}");
    }
}

#[tokio::test]
async fn rule_crud_and_cache_invalidation() {
    let ctx = test_context();

    // Create.
    let app = hearth_server::app(ctx.state.clone());
    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/rules",
            json!({
                "name": "Kitchen heat alert",
                "triggerType": "heat-alert",
                "deviceId": "kitchen-therm",
                "metric": "temperature",
                "operator": "GreaterThan",
                "threshold": 30.0,
                "cooldownSeconds": 300
            }),
        ))
        .await
        .expect("request should succeed");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let rule_id = created["id"].as_str().expect("rule id").to_string();
    assert_eq!(created["enabled"], true, "enabled defaults to true");

    // The engine cache was refreshed by the mutation.
    assert_eq!(ctx.state.rules.len(), 1);

    // Get.
    let app = hearth_server::app(ctx.state.clone());
    let response = app
        .oneshot(get_request(&format!("/api/rules/{rule_id}")))
        .await
        .expect("request should succeed");
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = body_json(response).await;
    assert_eq!(fetched["name"], "Kitchen heat alert");
    assert_eq!(fetched["operator"], "GreaterThan");

    // Update: disabling removes it from the cache.
    let app = hearth_server::app(ctx.state.clone());
    let response = app
        .oneshot(json_request(
            Method::PUT,
            &format!("/api/rules/{rule_id}"),
            json!({"enabled": false, "threshold": 35.0}),
        ))
        .await
        .expect("request should succeed");
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["enabled"], false);
    assert_eq!(updated["threshold"], 35.0);
    assert_eq!(updated["name"], "Kitchen heat alert", "untouched field kept");
    assert_eq!(ctx.state.rules.len(), 0, "disabled rule left the cache");

    // Logs for an existing rule: empty list, not 404.
    let app = hearth_server::app(ctx.state.clone());
    let response = app
        .oneshot(get_request(&format!("/api/rules/{rule_id}/logs")))
        .await
        .expect("request should succeed");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([]));

    // Delete.
    let app = hearth_server::app(ctx.state.clone());
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::DELETE)
                .uri(format!("/api/rules/{rule_id}"))
                .body(Body::empty())
                .expect("request should build"),
        )
        .await
        .expect("request should succeed");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Gone.
    let app = hearth_server::app(ctx.state.clone());
    let response = app
        .oneshot(get_request(&format!("/api/rules/{rule_id}")))
        .await
        .expect("request should succeed");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rule_logs_for_unknown_rule_is_not_found() {
    let ctx = test_context();
    let app = hearth_server::app(ctx.state.clone());

    let response = app
        .oneshot(get_request(
            "/api/rules/00000000-0000-0000-0000-000000000000/logs",
        ))
        .await
        .expect("request should succeed");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn event_stream_responds_with_sse() {
    let ctx = test_context();
    let app = hearth_server::app(ctx.state.clone());

    let response = app
        .oneshot(get_request("/events/stream"))
        .await
        .expect("request should succeed");
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(
        content_type.starts_with("text/event-stream"),
        "unexpected content type: {content_type}"
    );
}

#[tokio::test]
async fn device_stream_responds_with_sse() {
    let ctx = test_context();
    let app = hearth_server::app(ctx.state.clone());

    let response = app
        .oneshot(get_request("/events/device/kitchen-therm"))
        .await
        .expect("request should succeed");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(ctx.state.broadcaster.group_count(), 1);
}
