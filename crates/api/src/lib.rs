//! HTTP/SSE gateway for conduit.
//!
//! # Endpoints
//!
//! - `GET /` - Short description
//! - `GET /health` - Health check with router counters and meeting count
//! - `GET /stream?message=...[&session_id=...]` - One session as Server-Sent Events
//! - `POST /api/v1/messages` - Run one session and return its final state
//!
//! Request bodies are capped at 1 MiB.
//!
//! # Architecture
//!
//! ```text
//! Client (EventSource / curl)
//!    │
//!    ▼
//! ┌─────────────────┐
//! │   API Gateway   │ ◄── This crate
//! │     (Axum)      │
//! └────────┬────────┘
//!          │ spawn(request)
//!          ▼
//! ┌─────────────────┐      events       ┌─────────────────┐
//! │ ExecutionEngine │ ────────────────► │  SessionStream  │ ──► SSE frames
//! └─────────────────┘   (capacity 1)    └─────────────────┘
//! ```

pub mod emitter;
pub mod routes;
pub mod state;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use emitter::SessionStream;
pub use state::AppState;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

fn cors_layer(origins: Option<Vec<String>>) -> CorsLayer {
    let allow_origin = match origins {
        Some(origins) if !origins.iter().any(|o| o == "*") => {
            let parsed: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!(origin = %origin, "Ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(parsed)
        }
        _ => AllowOrigin::from(Any),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Create the API router with all routes configured.
///
/// `cors_origins` of `None` (or containing `*`) allows any origin.
pub fn create_router(state: Arc<AppState>, cors_origins: Option<Vec<String>>) -> Router {
    Router::new()
        .route("/", get(routes::root))
        .route("/health", get(routes::health))
        .route("/stream", get(routes::stream))
        .route("/api/v1/messages", post(routes::send_message))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// Start the API server on the given address.
pub async fn serve(
    state: Arc<AppState>,
    addr: SocketAddr,
    cors_origins: Option<Vec<String>>,
) -> anyhow::Result<()> {
    let router = create_router(state, cors_origins);

    info!(%addr, "Starting conduit API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
