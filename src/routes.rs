use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .with_state(state)
}

async fn index() -> &'static str {
    "lesson booking bot is running"
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    state.repo.ping().await?;
    Ok(Json(HealthResponse {
        status: "ok",
        timestamp: state.clock.now().to_rfc3339(),
    }))
}
