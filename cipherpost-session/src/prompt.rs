//! Password prompt port.
//!
//! The session never talks to a UI directly. It asks a [`PasswordPrompt`]
//! for a password and gets back either the password or a cancellation.
//! [`ChannelPrompt`] adapts the port to a UI event loop over channels.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use zeroize::Zeroizing;

/// Result of asking the operator for a password.
pub enum PromptOutcome {
    Password(Zeroizing<String>),
    Cancelled,
}

impl PromptOutcome {
    pub fn password(password: impl Into<String>) -> Self {
        Self::Password(Zeroizing::new(password.into()))
    }
}

impl std::fmt::Debug for PromptOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password(_) => f.write_str("Password([REDACTED])"),
            Self::Cancelled => f.write_str("Cancelled"),
        }
    }
}

/// Asks the human operator for their account password.
#[async_trait]
pub trait PasswordPrompt: Send + Sync {
    async fn request_password(&self) -> PromptOutcome;
}

/// One outstanding prompt, delivered to the UI.
///
/// Dropping it without responding counts as a cancellation.
pub struct PromptRequest {
    responder: oneshot::Sender<PromptOutcome>,
}

impl PromptRequest {
    pub fn submit(self, password: impl Into<String>) {
        let _ = self.responder.send(PromptOutcome::password(password));
    }

    pub fn cancel(self) {
        let _ = self.responder.send(PromptOutcome::Cancelled);
    }
}

/// Prompt that forwards each request to a UI task over a channel.
pub struct ChannelPrompt {
    requests: mpsc::Sender<PromptRequest>,
}

impl ChannelPrompt {
    /// Returns the prompt and the receiving end the UI listens on.
    pub fn new() -> (Self, mpsc::Receiver<PromptRequest>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { requests: tx }, rx)
    }
}

#[async_trait]
impl PasswordPrompt for ChannelPrompt {
    async fn request_password(&self) -> PromptOutcome {
        let (responder, response) = oneshot::channel();
        if self.requests.send(PromptRequest { responder }).await.is_err() {
            // No UI listening.
            return PromptOutcome::Cancelled;
        }
        response.await.unwrap_or(PromptOutcome::Cancelled)
    }
}
