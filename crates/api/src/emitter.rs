//! Stream emitter: one SSE connection per session.
//!
//! Events are forwarded as they arrive from the engine. Each SSE frame carries
//! the event's sequence number as its `id` and the `{node: update}` object as
//! its `data`. Rich content is passed through untouched.
//!
//! Dropping the stream (the client went away) cancels the session.

use axum::response::sse::Event;
use conduit_common::StreamEvent;
use conduit_coordinator::SessionHandle;
use futures_util::Stream;
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::DropGuard;
use tracing::{debug, error};

/// Render one engine event as an SSE frame.
pub fn to_sse_event(event: &StreamEvent) -> Event {
    let frame = Event::default().id(event.seq.to_string());
    match event.to_json() {
        Ok(data) => frame.data(data),
        Err(e) => {
            error!(seq = event.seq, node = %event.node, error = %e, "Failed to serialize event");
            frame.comment("serialization error")
        }
    }
}

/// The SSE body for one session.
pub struct SessionStream {
    session_id: String,
    events: ReceiverStream<StreamEvent>,
    _cancel_on_drop: DropGuard,
}

impl SessionStream {
    pub fn new(handle: SessionHandle) -> Self {
        let session_id = handle.session_id().to_string();
        let (events, cancel, _task) = handle.into_parts();
        Self {
            session_id,
            events: ReceiverStream::new(events),
            _cancel_on_drop: cancel.drop_guard(),
        }
    }
}

impl Stream for SessionStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events)
            .poll_next(cx)
            .map(|event| event.map(|event| Ok(to_sse_event(&event))))
    }
}

impl Drop for SessionStream {
    fn drop(&mut self) {
        debug!(session_id = %self.session_id, "Stream closed");
    }
}

