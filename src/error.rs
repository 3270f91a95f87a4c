use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Slot is no longer available")]
    SlotTaken,

    #[error("Not found")]
    NotFound,

    #[error("Student profile is missing")]
    ProfileMissing,

    #[error("Forbidden")]
    Forbidden,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Chat session is held by another instance")]
    SessionConflict,

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl AppError {
    /// Text shown to a chat participant when a workflow step fails.
    pub fn user_notice(&self) -> String {
        match self {
            AppError::Validation(msg) => format!("❌ {}", msg),
            AppError::SlotTaken => {
                "❌ This time has just been taken. Please pick another slot.".to_string()
            }
            AppError::NotFound => "ℹ️ This request has already been handled.".to_string(),
            AppError::ProfileMissing => "❌ You have not booked a first lesson yet.\n\n\
                 Please register through the first lesson flow."
                .to_string(),
            AppError::Forbidden => "🔒 This action is only available to the tutor.".to_string(),
            _ => "⚠️ Something went wrong. Please try again later.".to_string(),
        }
    }

    /// Domain errors are expected outcomes of a workflow; everything else is operational.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            AppError::Validation(_)
                | AppError::SlotTaken
                | AppError::NotFound
                | AppError::ProfileMissing
                | AppError::Forbidden
        )
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not Found".to_string()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::SlotTaken => (StatusCode::CONFLICT, "Slot is no longer available".to_string()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            AppError::Database(e) => {
                error!("database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred".to_string(),
                )
            }
            other => {
                error!("internal error: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: status.to_string(),
            message: error_message,
        });

        (status, body).into_response()
    }
}
