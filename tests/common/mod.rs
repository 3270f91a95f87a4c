#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};

use lesson_booking::chat::RecordingTransport;
use lesson_booking::clock::ManualClock;
use lesson_booking::config::Config;
use lesson_booking::db::{DocumentStore, Repository, SqliteDocuments};
use lesson_booking::models::StudentProfile;
use lesson_booking::state::AppState;

pub const TUTOR: i64 = 1000;
pub const ANNA: i64 = 1;
pub const BORIS: i64 = 2;

/// Monday of the active week, before any slot of the day.
pub const MONDAY_MORNING: &str = "2026-03-02T09:00:00+03:00";

pub fn at(rfc3339: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(rfc3339).unwrap()
}

pub struct Harness {
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    pub chat: Arc<RecordingTransport>,
}

pub async fn harness() -> Harness {
    harness_with(Config::new(TUTOR)).await
}

pub async fn memory_store() -> SqliteDocuments {
    SqliteDocuments::connect("sqlite::memory:")
        .await
        .expect("Failed to create database")
}

pub async fn harness_with(config: Config) -> Harness {
    harness_on(Arc::new(memory_store().await), config)
}

pub fn harness_on(docs: Arc<dyn DocumentStore>, config: Config) -> Harness {
    let repo = Repository::new(docs);
    let clock = Arc::new(ManualClock::new(at(MONDAY_MORNING)));
    let chat = Arc::new(RecordingTransport::new());
    let state = AppState::new(repo, clock.clone(), chat.clone(), config);
    Harness { state, clock, chat }
}

pub fn profile(name: &str) -> StudentProfile {
    StudentProfile {
        name: name.to_string(),
        grade: "9".to_string(),
    }
}
