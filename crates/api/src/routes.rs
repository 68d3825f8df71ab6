//! HTTP route handlers for the API.

use crate::emitter::SessionStream;
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{KeepAlive, KeepAliveStream, Sse},
        IntoResponse, Response,
    },
    Json,
};
use conduit_common::{CapabilityName, GraphState, Request, SessionState};
use conduit_coordinator::{RouterStatsSnapshot, RoutingMode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Interval between SSE keep-alive comments.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub decision_service_enabled: bool,
    pub capabilities: Vec<CapabilityName>,
    pub meetings: usize,
    pub router: RouterStatsSnapshot,
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let router = state.engine.router();

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_seconds(),
        decision_service_enabled: router.has_decision_service(),
        capabilities: state.engine.registry().names(),
        meetings: state.store.len(),
        router: router.stats(),
    })
}

/// Short description of the service.
pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "conduit is running. Use /stream?message=... for streaming \
                    or POST /api/v1/messages for a single JSON reply.",
    }))
}

/// Query string of the streaming endpoint.
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

fn new_request(session_id: Option<String>, message: String) -> Request {
    match session_id {
        Some(id) => Request::with_id(id, message),
        None => Request::new(message),
    }
}

/// Stream one session's updates as Server-Sent Events.
pub async fn stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StreamQuery>,
) -> Sse<KeepAliveStream<SessionStream>> {
    let request = new_request(query.session_id, query.message);
    info!(
        session_id = %request.id(),
        content_preview = %request.preview(),
        "Opening stream"
    );

    let handle = state.engine.spawn(request, CancellationToken::new());
    Sse::new(SessionStream::new(handle)).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}

/// Message request body.
#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub content: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Message response body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: String,
    pub capability: Option<CapabilityName>,
    pub mode: Option<RoutingMode>,
    pub state: SessionState,
    pub graph: GraphState,
}

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip)]
    pub status: StatusCode,
}

impl ErrorResponse {
    pub fn bad_request(error: impl Into<String>, code: &'static str) -> Self {
        Self {
            error: error.into(),
            code,
            status: StatusCode::BAD_REQUEST,
        }
    }

    pub fn internal(error: impl Into<String>, code: &'static str) -> Self {
        Self {
            error: error.into(),
            code,
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Run one session to completion and return its final state.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, ErrorResponse> {
    if request.content.trim().is_empty() {
        return Err(ErrorResponse::bad_request(
            "Message content must not be empty",
            "EMPTY_MESSAGE",
        ));
    }

    let request = new_request(request.session_id, request.content);
    info!(
        session_id = %request.id(),
        content_preview = %request.preview(),
        "Received message"
    );

    let report = state.engine.run(request).await.map_err(|e| {
        error!(error = %e, "Session failed to run");
        ErrorResponse::internal("Session failed to run", "SESSION_ERROR")
    })?;

    Ok(Json(MessageResponse {
        id: report.session_id,
        capability: report.decision.as_ref().map(|d| d.capability),
        mode: report.decision.as_ref().map(|d| d.mode),
        state: report.state,
        graph: report.graph,
    }))
}
