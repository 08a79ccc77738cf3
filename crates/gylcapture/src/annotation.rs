//! Annotation collection at the end of a session.
//!
//! Finalization suspends until the prompt answers. `None` means the user
//! cancelled and no annotation file is written.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::session::SessionId;

#[async_trait]
pub trait AnnotationPrompt: Send + Sync {
    async fn request_annotation(&self, session_id: &SessionId) -> Option<String>;
}

/// A pending prompt, answered by whatever owns the dialog.
#[derive(Debug)]
pub struct AnnotationRequest {
    pub session_id: SessionId,
    responder: oneshot::Sender<Option<String>>,
}

impl AnnotationRequest {
    pub fn submit(self, text: impl Into<String>) {
        let _ = self.responder.send(Some(text.into()));
    }

    pub fn cancel(self) {
        let _ = self.responder.send(None);
    }
}

/// Forwards prompts over a channel. Dropping a request unanswered cancels it.
#[derive(Debug, Clone)]
pub struct ChannelAnnotationPrompt {
    tx: mpsc::Sender<AnnotationRequest>,
}

impl ChannelAnnotationPrompt {
    pub fn new(depth: usize) -> (Self, mpsc::Receiver<AnnotationRequest>) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl AnnotationPrompt for ChannelAnnotationPrompt {
    async fn request_annotation(&self, session_id: &SessionId) -> Option<String> {
        let (responder, response) = oneshot::channel();
        let request = AnnotationRequest {
            session_id: session_id.clone(),
            responder,
        };
        if self.tx.send(request).await.is_err() {
            debug!("no annotation listener, treating as cancelled");
            return None;
        }
        response.await.ok().flatten()
    }
}

/// Answers every prompt with the same response.
#[derive(Debug, Clone, Default)]
pub struct FixedAnnotation(pub Option<String>);

impl FixedAnnotation {
    pub fn text(text: impl Into<String>) -> Self {
        Self(Some(text.into()))
    }

    pub fn cancelled() -> Self {
        Self(None)
    }
}

#[async_trait]
impl AnnotationPrompt for FixedAnnotation {
    async fn request_annotation(&self, _session_id: &SessionId) -> Option<String> {
        self.0.clone()
    }
}
