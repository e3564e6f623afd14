//! Integration tests for the Flowise relay.
//!
//! Tests the webhook endpoint end to end: a wiremock server doubles as both
//! the Flowise prediction API and the Bot Framework connector, so a single
//! POST to `/api/messages` exercises the whole relay path.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use relay_channels::{
    build_router, create_state, EMPTY_ANSWER_FALLBACK, PROCESSING_ERROR_REPLY, RESET_CONFIRMATION,
    TURN_ERROR_REPLY,
};
use relay_common::config::Config;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PREDICTION_PATH: &str = "/api/v1/prediction/test-flow";
const REPLY_PATH: &str = "/v3/conversations/conv-1/activities/act-1";

/// Test helper to create a router wired to a mock backend.
fn create_test_app(server: &MockServer) -> axum::Router {
    let mut config = Config::default();
    config.flowise.base_url = server.uri();
    config.flowise.chatflow_id = "test-flow".into();
    config.flowise.timeout_secs = 5;

    build_router(create_state(&config))
}

/// Inbound message activity whose serviceUrl points at the mock connector.
fn message_activity(text: &str, server: &MockServer) -> Value {
    json!({
        "type": "message",
        "id": "act-1",
        "text": text,
        "from": { "id": "user-1", "name": "User" },
        "recipient": { "id": "bot-1", "name": "Bot" },
        "conversation": { "id": "conv-1" },
        "serviceUrl": server.uri(),
        "channelId": "emulator"
    })
}

/// Helper to make a JSON request.
async fn request_json(
    app: &axum::Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = if let Some(b) = body {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_string(&b).unwrap()))
            .unwrap()
    } else {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    (status, json)
}

/// Mount a prediction mock answering every call with the given template.
async fn mount_prediction(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(PREDICTION_PATH))
        .respond_with(template)
        .mount(server)
        .await;
}

/// Mount a connector mock accepting reply activities.
async fn mount_reply_sink(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(REPLY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "r-1" })))
        .mount(server)
        .await;
}

// ─────────────────────────────────────────────────────────────────────────────
// Health Check Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_check() {
    let server = MockServer::start().await;
    let app = create_test_app(&server);

    let (status, json) = request_json(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "relay-channels");
}

#[tokio::test]
async fn test_ready_check() {
    let server = MockServer::start().await;
    let app = create_test_app(&server);

    let (status, json) = request_json(&app, Method::GET, "/ready", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ready");
}

#[tokio::test]
async fn test_ready_check_without_chatflow() {
    let server = MockServer::start().await;
    let mut config = Config::default();
    config.flowise.base_url = server.uri();
    let app = build_router(create_state(&config));

    let (status, json) = request_json(&app, Method::GET, "/ready", None).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["status"], "not_ready");
}

// ─────────────────────────────────────────────────────────────────────────────
// CORS Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_preflight_returns_204_with_cors_headers() {
    let server = MockServer::start().await;
    let app = create_test_app(&server);

    // Preflight handling applies to any path, not just registered routes
    for uri in ["/api/messages", "/anywhere/else"] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_METHODS],
            "POST, GET, OPTIONS"
        );
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
            "Content-Type, Authorization"
        );

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert!(body.is_empty());
    }
}

#[tokio::test]
async fn test_allow_origin_on_regular_responses() {
    let server = MockServer::start().await;
    let app = create_test_app(&server);

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Message Relay Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_message_is_relayed() {
    let server = MockServer::start().await;
    let app = create_test_app(&server);

    Mock::given(method("POST"))
        .and(path(PREDICTION_PATH))
        .and(body_partial_json(json!({ "question": "What is Rust?" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "A language" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(REPLY_PATH))
        .and(body_partial_json(json!({
            "type": "message",
            "text": "A language",
            "replyToId": "act-1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "r-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let (status, _) = request_json(
        &app,
        Method::POST,
        "/api/messages",
        Some(message_activity("What is Rust?", &server)),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_prediction_carries_resolved_session() {
    let server = MockServer::start().await;
    let app = create_test_app(&server);

    mount_prediction(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({ "text": "ok" })),
    )
    .await;
    mount_reply_sink(&server).await;

    request_json(
        &app,
        Method::POST,
        "/api/messages",
        Some(message_activity("first", &server)),
    )
    .await;
    request_json(
        &app,
        Method::POST,
        "/api/messages",
        Some(message_activity("second", &server)),
    )
    .await;

    let sessions: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == PREDICTION_PATH)
        .map(|r| {
            let body: Value = serde_json::from_slice(&r.body).unwrap();
            body["overrideConfig"]["sessionId"].as_str().unwrap().to_string()
        })
        .collect();

    assert_eq!(sessions.len(), 2);
    assert!(sessions[0].starts_with("conv-1-"));
    // Same user, no reset: the session is reused
    assert_eq!(sessions[0], sessions[1]);
}

#[tokio::test]
async fn test_reset_command_skips_prediction() {
    let server = MockServer::start().await;
    let app = create_test_app(&server);

    Mock::given(method("POST"))
        .and(path(PREDICTION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "never" })))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(REPLY_PATH))
        .and(body_partial_json(json!({ "text": RESET_CONFIRMATION })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "r-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let (status, _) = request_json(
        &app,
        Method::POST,
        "/api/messages",
        Some(message_activity("Reset History", &server)),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_empty_answer_falls_back() {
    let server = MockServer::start().await;
    let app = create_test_app(&server);

    mount_prediction(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({ "text": "" })),
    )
    .await;

    Mock::given(method("POST"))
        .and(path(REPLY_PATH))
        .and(body_partial_json(json!({ "text": EMPTY_ANSWER_FALLBACK })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "r-1" })))
        .expect(1)
        .mount(&server)
        .await;

    request_json(
        &app,
        Method::POST,
        "/api/messages",
        Some(message_activity("hi", &server)),
    )
    .await;
}

#[tokio::test]
async fn test_prediction_failure_yields_generic_reply() {
    let server = MockServer::start().await;
    let app = create_test_app(&server);

    mount_prediction(&server, ResponseTemplate::new(500).set_body_string("boom")).await;

    Mock::given(method("POST"))
        .and(path(REPLY_PATH))
        .and(body_partial_json(json!({ "text": PROCESSING_ERROR_REPLY })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "r-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let (status, _) = request_json(
        &app,
        Method::POST,
        "/api/messages",
        Some(message_activity("hi", &server)),
    )
    .await;

    // Failure is absorbed; the channel still gets a success status
    assert_eq!(status, StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_non_message_activity_is_ignored() {
    let server = MockServer::start().await;
    let app = create_test_app(&server);

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let mut activity = message_activity("ignored", &server);
    activity["type"] = json!("typingIndicator");

    let (status, _) = request_json(&app, Method::POST, "/api/messages", Some(activity)).await;

    // No reply, no downstream call
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unaddressable_message_gets_turn_error_reply() {
    let server = MockServer::start().await;
    let app = create_test_app(&server);

    Mock::given(method("POST"))
        .and(path(REPLY_PATH))
        .and(body_partial_json(json!({ "text": TURN_ERROR_REPLY })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "r-1" })))
        .expect(1)
        .mount(&server)
        .await;

    // A message with no sender cannot be processed, but it still names a
    // conversation, so the error reply is deliverable.
    let mut activity = message_activity("hi", &server);
    activity.as_object_mut().unwrap().remove("from");

    let (status, _) = request_json(&app, Method::POST, "/api/messages", Some(activity)).await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let server = MockServer::start().await;
    let app = create_test_app(&server);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/messages")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("not json"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
