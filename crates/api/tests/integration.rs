//! Integration tests for the API layer.
//!
//! These tests spin up a real HTTP server on a random port. The web search
//! backend is scripted so nothing leaves the machine.

use async_trait::async_trait;
use conduit_agents::{MeetingsAgent, Phraser, RagAgent, SearchBackend, SearchHit, WebAgent};
use conduit_api::{create_router, AppState, SessionStream};
use conduit_common::{
    Capability, CapabilityName, ConduitError, NodeUpdate, Request, RequestSession, Result,
};
use conduit_coordinator::{CapabilityRegistry, ExecutionEngine, KeywordTable, Router};
use conduit_memory::{Corpus, MeetingStore};
use futures_util::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct FixedSearch;

#[async_trait]
impl SearchBackend for FixedSearch {
    async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<SearchHit>> {
        Ok(vec![SearchHit {
            title: "Tokio".into(),
            snippet: "An asynchronous runtime for Rust".into(),
            link: "https://tokio.rs".into(),
        }])
    }
}

/// Reports progress, then waits until the session is cancelled.
struct Waiting {
    cancelled: Arc<AtomicBool>,
}

#[async_trait]
impl Capability for Waiting {
    fn name(&self) -> CapabilityName {
        CapabilityName::WeatherAgent
    }

    fn description(&self) -> &str {
        "waits forever"
    }

    async fn run(&self, session: &RequestSession) -> Result<NodeUpdate> {
        session.progress(NodeUpdate::text("Looking up Oslo…")).await?;
        let waited = session
            .bounded(tokio::time::sleep(Duration::from_secs(60)))
            .await;
        if matches!(waited, Err(ConduitError::SessionCancelled)) {
            self.cancelled.store(true, Ordering::SeqCst);
        }
        waited?;
        Ok(NodeUpdate::text("too late"))
    }
}

fn test_engine(store: Arc<MeetingStore>, cancelled: Arc<AtomicBool>) -> ExecutionEngine {
    let mut registry = CapabilityRegistry::new();
    registry.register(Arc::new(Waiting { cancelled }));
    registry.register(Arc::new(MeetingsAgent::new(store, Phraser::disabled())));
    registry.register(Arc::new(RagAgent::new(Corpus::default_corpus(), Phraser::disabled())));
    registry.register(Arc::new(WebAgent::new(Arc::new(FixedSearch), 3, Phraser::disabled())));

    let router = Router::new(KeywordTable::standard(), Some(CapabilityName::WebAgent))
        .with_catalog(registry.catalog());
    ExecutionEngine::new(router, registry)
}

/// Spin up a test server on a random port and return the base URL.
async fn start_test_server() -> String {
    let store = Arc::new(MeetingStore::new());
    let engine = test_engine(store.clone(), Arc::new(AtomicBool::new(false)));
    let state = Arc::new(AppState::with_engine(engine, store));
    let router = create_router(state, None);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://{}", addr)
}

/// Helper to GET a URL and return (status, body_string).
async fn get(base: &str, path: &str) -> (u16, String) {
    let resp = reqwest::Client::new()
        .get(format!("{}{}", base, path))
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap();
    (status, body)
}

/// Helper to POST JSON and return (status, body_string).
async fn post_json(base: &str, path: &str, json: &str) -> (u16, String) {
    let resp = reqwest::Client::new()
        .post(format!("{}{}", base, path))
        .header("content-type", "application/json")
        .body(json.to_string())
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap();
    (status, body)
}

/// Open a stream and collect `(id, data)` for every frame until it ends.
async fn stream_frames(base: &str, message: &str) -> Vec<(String, serde_json::Value)> {
    let resp = reqwest::Client::new()
        .get(format!("{}/stream", base))
        .query(&[("message", message)])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/event-stream"));

    let body = resp.text().await.unwrap();
    body.split("\n\n")
        .filter(|frame| frame.contains("data:"))
        .map(|frame| {
            let mut id = String::new();
            let mut data = String::new();
            for line in frame.lines() {
                if let Some(value) = line.strip_prefix("id:") {
                    id = value.trim().to_string();
                } else if let Some(value) = line.strip_prefix("data:") {
                    data.push_str(value.trim_start());
                }
            }
            (id, serde_json::from_str(&data).unwrap())
        })
        .collect()
}

// ============================================================================
// Health and root
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let base = start_test_server().await;
    let (status, body) = get(&base, "/health").await;
    assert_eq!(status, 200);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["decision_service_enabled"], false);
    assert_eq!(json["capabilities"].as_array().unwrap().len(), 4);
    assert_eq!(json["meetings"], 0);
    assert_eq!(json["router"]["keyword"], 0);
}

#[tokio::test]
async fn test_root_describes_service() {
    let base = start_test_server().await;
    let (status, body) = get(&base, "/").await;
    assert_eq!(status, 200);
    assert!(body.contains("/stream?message="));
}

// ============================================================================
// Streaming endpoint
// ============================================================================

#[tokio::test]
async fn test_stream_emits_single_key_events_in_order() {
    let base = start_test_server().await;
    let frames = stream_frames(&base, "search for tokio").await;

    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].0, "0");
    assert_eq!(frames[1].0, "1");

    let progress = frames[0].1.as_object().unwrap();
    assert_eq!(progress.len(), 1);
    assert_eq!(progress["web_agent"]["output"], "Searching the web…");

    let terminal = &frames[1].1["web_agent"];
    assert!(terminal["output"].as_str().unwrap().contains("Tokio"));
    assert_eq!(terminal["a2ui"]["schema"], "a2ui");
}

#[tokio::test]
async fn test_stream_meetings_scenario() {
    let base = start_test_server().await;

    let frames = stream_frames(&base, "list meetings").await;
    assert_eq!(frames.len(), 1);
    assert_eq!(
        frames[0].1["meetings_agent"]["output"],
        "There are no meetings scheduled."
    );

    let frames = stream_frames(
        &base,
        "create meeting Kickoff on 2026-02-01 agenda Plan milestones",
    )
    .await;
    assert_eq!(
        frames[0].1["meetings_agent"]["output"],
        "Created meeting 1: Kickoff on 2026-02-01."
    );

    let frames = stream_frames(&base, "list meetings").await;
    let output = frames[0].1["meetings_agent"]["output"].as_str().unwrap();
    assert!(output.contains("Kickoff on 2026-02-01"));

    let (_, body) = get(&base, "/health").await;
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["router"]["keyword"], 3);
    assert_eq!(json["meetings"], 1);
}

#[tokio::test]
async fn test_stream_requires_message() {
    let base = start_test_server().await;
    let (status, _) = get(&base, "/stream").await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_dropping_stream_cancels_session() {
    let cancelled = Arc::new(AtomicBool::new(false));
    let engine = test_engine(Arc::new(MeetingStore::new()), cancelled.clone());

    let handle = engine.spawn(Request::new("weather in Oslo"), CancellationToken::new());
    let mut stream = SessionStream::new(handle);
    assert!(stream.next().await.is_some());
    drop(stream);

    tokio::time::timeout(Duration::from_secs(5), async {
        while !cancelled.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("capability was not cancelled");
}

// ============================================================================
// Messages endpoint
// ============================================================================

#[tokio::test]
async fn test_messages_endpoint() {
    let base = start_test_server().await;
    let (status, body) = post_json(
        &base,
        "/api/v1/messages",
        r#"{"content": "Which document explains agendas?", "session_id": "caller-9"}"#,
    )
    .await;
    assert_eq!(status, 200);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["id"], "caller-9");
    assert_eq!(json["capability"], "rag_agent");
    assert_eq!(json["mode"], "keyword");
    assert_eq!(json["state"], "completed");
    assert!(json["graph"]["rag_agent"]["output"].is_string());
}

#[tokio::test]
async fn test_messages_default_route() {
    let base = start_test_server().await;
    let (status, body) = post_json(&base, "/api/v1/messages", r#"{"content": "hello"}"#).await;
    assert_eq!(status, 200);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["capability"], "web_agent");
    assert_eq!(json["mode"], "default");
}

#[tokio::test]
async fn test_messages_rejects_empty_content() {
    let base = start_test_server().await;
    let (status, body) = post_json(&base, "/api/v1/messages", r#"{"content": "   "}"#).await;
    assert_eq!(status, 400);
    assert!(body.contains("EMPTY_MESSAGE"));
}

// ============================================================================
// Payload size limits
// ============================================================================

#[tokio::test]
async fn test_messages_payload_too_large() {
    let base = start_test_server().await;
    let large_content = "x".repeat(1_100_000);
    let (status, _body) = post_json(
        &base,
        "/api/v1/messages",
        &format!(r#"{{"content": "{}"}}"#, large_content),
    )
    .await;
    assert_eq!(status, 413, "Expected 413 Payload Too Large, got {}", status);
}
