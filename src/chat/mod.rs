pub mod action;
pub mod recording;

use async_trait::async_trait;
use tracing::warn;

use crate::error::AppError;

pub use action::Action;
pub use recording::{NoopTransport, Outgoing, RecordingTransport};

/// Chat-level identity of any participant, tutor included.
pub type UserId = i64;

/// One selectable option under a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    pub action: Action,
}

impl Choice {
    pub fn new(label: impl Into<String>, action: Action) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// What the workflows need from a chat service.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_text(&self, to: UserId, text: &str) -> Result<(), AppError>;

    async fn send_choices(
        &self,
        to: UserId,
        text: &str,
        choices: Vec<Choice>,
    ) -> Result<(), AppError>;
}

/// Sends a notification. Delivery failures never undo a committed transition.
pub async fn deliver(chat: &dyn ChatTransport, to: UserId, text: &str) {
    if let Err(e) = chat.send_text(to, text).await {
        warn!("failed to notify {}: {}", to, e);
    }
}

pub async fn deliver_choices(chat: &dyn ChatTransport, to: UserId, text: &str, choices: Vec<Choice>) {
    if let Err(e) = chat.send_choices(to, text, choices).await {
        warn!("failed to send choices to {}: {}", to, e);
    }
}
