pub mod dto;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, error, info, warn};

use crate::bot::{Bot, Inbound};
use crate::chat::{Action, ChatTransport, Choice, UserId};
use crate::error::AppError;

const POLL_TIMEOUT_SECS: u32 = 30;
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Bot API client over long polling.
pub struct TelegramClient {
    client: Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self, AppError> {
        Self::with_base_url(token, "https://api.telegram.org")
    }

    pub fn with_base_url(token: &str, base: &str) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(u64::from(POLL_TIMEOUT_SECS) + 10))
            .build()
            .map_err(|e| AppError::Transport(format!("Failed to build http client: {}", e)))?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{}", base.trim_end_matches('/'), token),
        })
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, method);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("{} failed: {}", method, e)))?;

        if response.status() == StatusCode::CONFLICT {
            return Err(AppError::SessionConflict);
        }

        let parsed: dto::ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| AppError::Transport(format!("Failed to parse {} response: {}", method, e)))?;

        if parsed.error_code == Some(409) {
            return Err(AppError::SessionConflict);
        }
        match (parsed.ok, parsed.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(AppError::Transport(format!(
                "{} rejected: {}",
                method,
                parsed.description.unwrap_or_default()
            ))),
        }
    }

    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<dto::Update>, AppError> {
        let request = dto::GetUpdatesRequest {
            offset,
            timeout: POLL_TIMEOUT_SECS,
            allowed_updates: vec!["message", "callback_query"],
        };
        self.call("getUpdates", &request).await
    }

    pub async fn answer_callback(&self, callback_query_id: &str) -> Result<(), AppError> {
        let _: bool = self
            .call("answerCallbackQuery", &dto::AnswerCallbackRequest { callback_query_id })
            .await?;
        Ok(())
    }

    async fn send(&self, to: UserId, text: &str, markup: Option<dto::InlineKeyboardMarkup>) -> Result<(), AppError> {
        let request = dto::SendMessageRequest {
            chat_id: to,
            text,
            reply_markup: markup,
        };
        let _: serde_json::Value = self.call("sendMessage", &request).await?;
        Ok(())
    }

    /// Long-polls until the session is lost for good. A 409 means another
    /// instance holds the session; it is retried with growing pauses and
    /// reported once `retry_limit` consecutive attempts have failed.
    pub async fn run(&self, bot: &Bot, retry_limit: u32) -> Result<(), AppError> {
        info!("Starting Telegram long polling");
        let mut offset: Option<i64> = None;
        let mut conflicts = 0u32;
        let mut backoff = Duration::from_secs(1);

        loop {
            let updates = match self.get_updates(offset).await {
                Ok(updates) => {
                    conflicts = 0;
                    backoff = Duration::from_secs(1);
                    updates
                }
                Err(AppError::SessionConflict) => {
                    conflicts += 1;
                    if conflicts >= retry_limit {
                        error!("session conflict persisted after {} attempts", conflicts);
                        return Err(AppError::SessionConflict);
                    }
                    warn!(
                        "session held by another instance, retrying in {:?} ({}/{})",
                        backoff, conflicts, retry_limit
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue;
                }
                Err(e) => {
                    warn!("getUpdates failed: {}", e);
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue;
                }
            };

            for update in updates {
                offset = Some(update.update_id + 1);

                if let Some(callback) = &update.callback_query {
                    if let Err(e) = self.answer_callback(&callback.id).await {
                        debug!("answerCallbackQuery failed: {}", e);
                    }
                }
                let Some(inbound) = to_inbound(update) else {
                    continue;
                };
                if let Err(e) = bot.handle(inbound).await {
                    error!("update handling failed: {}", e);
                }
            }
        }
    }
}

/// Maps an update to a dialog event. Unknown callback payloads and
/// non-text messages are dropped.
pub fn to_inbound(update: dto::Update) -> Option<Inbound> {
    if let Some(callback) = update.callback_query {
        let data = callback.data?;
        return match data.parse::<Action>() {
            Ok(action) => Some(Inbound::selected(callback.from.id, action)),
            Err(_) => {
                debug!("ignoring unknown callback payload {:?}", data);
                None
            }
        };
    }

    let message = update.message?;
    let text = message.text?;
    let from = message.from.map(|u| u.id).unwrap_or(message.chat.id);
    Some(Inbound::text(from, &text))
}

fn keyboard(choices: Vec<Choice>) -> dto::InlineKeyboardMarkup {
    dto::InlineKeyboardMarkup {
        inline_keyboard: choices
            .into_iter()
            .map(|choice| {
                vec![dto::InlineKeyboardButton {
                    text: choice.label,
                    callback_data: choice.action.encode(),
                }]
            })
            .collect(),
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn send_text(&self, to: UserId, text: &str) -> Result<(), AppError> {
        self.send(to, text, None).await
    }

    async fn send_choices(&self, to: UserId, text: &str, choices: Vec<Choice>) -> Result<(), AppError> {
        self.send(to, text, Some(keyboard(choices))).await
    }
}
