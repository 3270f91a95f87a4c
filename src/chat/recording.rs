use std::sync::Mutex;

use async_trait::async_trait;

use crate::chat::{ChatTransport, Choice, UserId};
use crate::error::AppError;

/// A message as handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub to: UserId,
    pub text: String,
    pub choices: Vec<Choice>,
}

/// Keeps every outgoing message in memory. Can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Outgoing>>,
    failing: Mutex<bool>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap_or_else(|e| e.into_inner()) = failing;
    }

    pub fn sent(&self) -> Vec<Outgoing> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn sent_to(&self, user: UserId) -> Vec<Outgoing> {
        self.sent().into_iter().filter(|m| m.to == user).collect()
    }

    pub fn last_to(&self, user: UserId) -> Option<Outgoing> {
        self.sent_to(user).pop()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn record(&self, to: UserId, text: &str, choices: Vec<Choice>) -> Result<(), AppError> {
        if *self.failing.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(AppError::Transport("recording transport set to fail".to_string()));
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Outgoing {
                to,
                text: text.to_string(),
                choices,
            });
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_text(&self, to: UserId, text: &str) -> Result<(), AppError> {
        self.record(to, text, Vec::new())
    }

    async fn send_choices(
        &self,
        to: UserId,
        text: &str,
        choices: Vec<Choice>,
    ) -> Result<(), AppError> {
        self.record(to, text, choices)
    }
}

pub struct NoopTransport;

#[async_trait]
impl ChatTransport for NoopTransport {
    async fn send_text(&self, _to: UserId, _text: &str) -> Result<(), AppError> {
        Ok(())
    }

    async fn send_choices(
        &self,
        _to: UserId,
        _text: &str,
        _choices: Vec<Choice>,
    ) -> Result<(), AppError> {
        Ok(())
    }
}
