use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lesson_booking::bot::Bot;
use lesson_booking::clock::SystemClock;
use lesson_booking::config::Config;
use lesson_booking::db;
use lesson_booking::error::AppError;
use lesson_booking::routes::router;
use lesson_booking::services::{Janitor, ReminderScheduler};
use lesson_booking::state::AppState;
use lesson_booking::telegram::TelegramClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "lesson_booking=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::new_from_env()?;
    let token = config
        .telegram_token
        .clone()
        .ok_or_else(|| AppError::Validation("TELEGRAM_TOKEN is not set".to_string()))?;

    let repo = db::open(&config.store).await?;
    let telegram = Arc::new(TelegramClient::new(&token)?);
    let clock = Arc::new(SystemClock::new(config.utc_offset));

    let health_addr = config.health_addr;
    let retry_limit = config.session_retry_limit;
    let reminder_interval = config.reminder_interval_secs;
    let janitor_interval = config.janitor_interval_secs;

    let state = AppState::new(repo, clock, telegram.clone(), config);

    tokio::spawn(ReminderScheduler::new(state.clone(), reminder_interval).start());
    tokio::spawn(Janitor::new(state.clone(), janitor_interval).start());

    let listener = tokio::net::TcpListener::bind(health_addr).await?;
    info!("health endpoint listening on http://{}", health_addr);
    let app = router(state.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("health server stopped: {}", e);
        }
    });

    let bot = Bot::new(state);
    if let Err(e) = telegram.run(&bot, retry_limit).await {
        error!("polling stopped: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
