//! Per-request execution context.

use crate::error::{ConduitError, Result};
use crate::request::Request;
use crate::update::NodeUpdate;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Lifecycle of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    Routing,
    Executing,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Routing => "routing",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// The context handed to a capability for one request.
///
/// Owned by exactly one execution. Capabilities read the request through it,
/// report intermediate updates with [`RequestSession::progress`] and bound
/// every external call with [`RequestSession::bounded`].
pub struct RequestSession {
    request: Request,
    cancel: CancellationToken,
    progress: mpsc::Sender<NodeUpdate>,
}

impl RequestSession {
    /// Create a session and the receiving end of its progress channel.
    ///
    /// The channel holds a single update so a capability never runs ahead of
    /// the consumer.
    pub fn new(request: Request, cancel: CancellationToken) -> (Self, mpsc::Receiver<NodeUpdate>) {
        let (progress, rx) = mpsc::channel(1);
        (
            Self {
                request,
                cancel,
                progress,
            },
            rx,
        )
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn id(&self) -> &str {
        self.request.id()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Emit an intermediate update.
    ///
    /// Waits until the consumer has room. Fails with
    /// [`ConduitError::SessionCancelled`] once the session is cancelled or the
    /// consumer is gone.
    pub async fn progress(&self, update: NodeUpdate) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ConduitError::SessionCancelled),
            sent = self.progress.send(update) => sent.map_err(|_| ConduitError::SessionCancelled),
        }
    }

    /// Run `fut` until it completes or the session is cancelled, whichever
    /// comes first. An abandoned future is dropped, not driven further.
    pub async fn bounded<F>(&self, fut: F) -> Result<F::Output>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ConduitError::SessionCancelled),
            output = fut => Ok(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_progress_is_received_in_order() {
        let (session, mut rx) = RequestSession::new(Request::new("hi"), CancellationToken::new());

        let producer = tokio::spawn(async move {
            session.progress(NodeUpdate::text("one")).await.unwrap();
            session.progress(NodeUpdate::text("two")).await.unwrap();
        });

        assert_eq!(rx.recv().await.unwrap().output, "one");
        assert_eq!(rx.recv().await.unwrap().output, "two");
        producer.await.unwrap();
    }

    #[tokio::test]
    async fn test_progress_fails_after_cancel() {
        let cancel = CancellationToken::new();
        let (session, _rx) = RequestSession::new(Request::new("hi"), cancel.clone());
        cancel.cancel();

        let err = session.progress(NodeUpdate::text("late")).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_progress_fails_when_consumer_is_gone() {
        let (session, rx) = RequestSession::new(Request::new("hi"), CancellationToken::new());
        drop(rx);

        assert!(session.progress(NodeUpdate::text("x")).await.is_err());
    }

    #[tokio::test]
    async fn test_bounded_abandons_slow_call_on_cancel() {
        let cancel = CancellationToken::new();
        let (session, _rx) = RequestSession::new(Request::new("hi"), cancel.clone());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = session
            .bounded(tokio::time::sleep(Duration::from_secs(30)))
            .await;
        assert!(matches!(result, Err(ConduitError::SessionCancelled)));
    }

    #[tokio::test]
    async fn test_bounded_passes_output_through() {
        let (session, _rx) = RequestSession::new(Request::new("hi"), CancellationToken::new());
        assert_eq!(session.bounded(async { 42 }).await.unwrap(), 42);
    }

    #[test]
    fn test_terminal_states() {
        assert!(SessionState::Completed.is_terminal());
        assert!(SessionState::Failed.is_terminal());
        assert!(SessionState::Cancelled.is_terminal());
        assert!(!SessionState::Executing.is_terminal());
        assert_eq!(SessionState::Routing.to_string(), "routing");
    }
}
