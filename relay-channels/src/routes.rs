//! HTTP routes for the relay.
//!
//! The channel POSTs activity payloads to `/api/messages`; replies go back
//! out-of-band through the connector, so the inbound request only gets a
//! status code. CORS preflight handling is reproduced for channels that call
//! the endpoint from a browser (Web Chat).

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use relay_common::config::Config;
use relay_common::logging::generate_trace_id;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::limit::RequestBodyLimitLayer;

use crate::activity::Activity;
use crate::connector::BotConnector;
use crate::flowise::FlowiseClient;
use crate::relay::{Relay, TURN_ERROR_REPLY};
use crate::session::InMemorySessionStore;

// ============================================================================
// Constants
// ============================================================================

const CORS_ALLOW_METHODS: &str = "POST, GET, OPTIONS";
const CORS_ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// Activity payloads are small; anything larger is not a chat message.
const MAX_BODY_BYTES: usize = 1024 * 1024;

// ============================================================================
// State
// ============================================================================

/// Shared state for the relay HTTP server.
pub struct RelayState {
    /// Message handler
    pub relay: Relay,
    /// Outbound reply client
    pub connector: BotConnector,
    /// Whether a chatflow is configured (readiness signal)
    pub flowise_configured: bool,
}

/// Build the shared state from configuration.
pub fn create_state(config: &Config) -> Arc<RelayState> {
    let store = Arc::new(InMemorySessionStore::new());
    let flowise = Arc::new(FlowiseClient::new(&config.flowise));
    let connector = BotConnector::new(config.bot.app_id.clone(), config.bot.app_password.clone());

    Arc::new(RelayState {
        relay: Relay::new(store, flowise),
        connector,
        flowise_configured: !config.flowise.chatflow_id.is_empty(),
    })
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

// ============================================================================
// Health Routes
// ============================================================================

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        service: "relay-channels",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn ready(State(state): State<Arc<RelayState>>) -> impl IntoResponse {
    if !state.flowise_configured {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "not_ready",
                service: "relay-channels",
                version: env!("CARGO_PKG_VERSION"),
            }),
        );
    }

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ready",
            service: "relay-channels",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

// ============================================================================
// Messages Webhook
// ============================================================================

async fn messages(
    State(state): State<Arc<RelayState>>,
    Json(activity): Json<Activity>,
) -> StatusCode {
    match state.relay.handle(&activity).await {
        Ok(Some(reply)) => {
            if let Err(e) = state.connector.send_reply(&activity, &reply).await {
                tracing::error!(error = %e, "Failed to deliver reply");
            }
            StatusCode::ACCEPTED
        }
        Ok(None) => StatusCode::OK,
        Err(e) => {
            tracing::error!(error = %e, "Message handler failed");
            // Tell the user something went wrong, if the activity is
            // addressable at all. The channel itself still gets a 2xx so it
            // does not retry the same broken payload.
            if let Err(send_err) = state.connector.send_reply(&activity, TURN_ERROR_REPLY).await {
                tracing::error!(error = %send_err, "Failed to deliver error reply");
            }
            StatusCode::OK
        }
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// CORS handling: answer preflights with 204 and the fixed allow headers,
/// and stamp the allow-origin header on every other response.
async fn cors(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        return (
            StatusCode::NO_CONTENT,
            [
                (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
                (header::ACCESS_CONTROL_ALLOW_METHODS, CORS_ALLOW_METHODS),
                (header::ACCESS_CONTROL_ALLOW_HEADERS, CORS_ALLOW_HEADERS),
            ],
        )
            .into_response();
    }

    let mut response = next.run(req).await;
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response
}

/// Log every request with method, path, client IP, and latency.
async fn request_log(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let client_ip = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let trace_id = generate_trace_id();
    let start = Instant::now();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        client_ip = %client_ip,
        trace_id = %trace_id,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Request handled"
    );
    response
}

// ============================================================================
// Router
// ============================================================================

/// Build the relay router with middleware.
pub fn build_router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/api/messages", post(messages))
        .layer(middleware::from_fn(cors))
        .layer(middleware::from_fn(request_log))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}
