use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{Duration, FixedOffset, Offset, Utc};

use crate::error::AppError;
use crate::models::StudentId;

/// Where the six collections live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreLocation {
    Sqlite(String),
    JsonDir(PathBuf),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_token: Option<String>,
    pub tutor_id: StudentId,
    pub store: StoreLocation,
    pub subjects: Vec<String>,
    pub utc_offset: FixedOffset,
    pub reminder_window_min: Duration,
    pub reminder_window_max: Duration,
    pub reminder_interval_secs: u64,
    pub janitor_interval_secs: u64,
    pub retention: Duration,
    pub health_addr: SocketAddr,
    pub session_retry_limit: u32,
}

impl Config {
    /// Defaults for everything but the tutor identity.
    pub fn new(tutor_id: StudentId) -> Self {
        Self {
            telegram_token: None,
            tutor_id,
            store: StoreLocation::Sqlite("sqlite://lessons.db".to_string()),
            subjects: vec![
                "Mathematics".to_string(),
                "Physics".to_string(),
                "Chemistry".to_string(),
            ],
            utc_offset: FixedOffset::east_opt(3 * 3600).unwrap_or_else(|| Utc.fix()),
            reminder_window_min: Duration::minutes(55),
            reminder_window_max: Duration::minutes(65),
            reminder_interval_secs: 30,
            janitor_interval_secs: 3600,
            retention: Duration::hours(24),
            health_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            session_retry_limit: 5,
        }
    }

    pub fn new_from_env() -> Result<Self, AppError> {
        let tutor_id = required("TUTOR_ID")?;
        let mut config = Self::new(parse_var("TUTOR_ID", &tutor_id)?);

        config.telegram_token = env::var("TELEGRAM_TOKEN").ok();

        if let Ok(dir) = env::var("DATA_DIR") {
            config.store = StoreLocation::JsonDir(PathBuf::from(dir));
        } else if let Ok(url) = env::var("DATABASE_URL") {
            config.store = StoreLocation::Sqlite(url);
        }

        if let Ok(raw) = env::var("SUBJECTS") {
            config.subjects = raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Some(minutes) = optional::<i32>("UTC_OFFSET_MINUTES")? {
            config.utc_offset = FixedOffset::east_opt(minutes * 60).ok_or_else(|| {
                AppError::Validation(format!("UTC_OFFSET_MINUTES out of range: {}", minutes))
            })?;
        }
        if let Some(min) = optional::<i64>("REMINDER_WINDOW_MIN")? {
            config.reminder_window_min = Duration::minutes(min);
        }
        if let Some(max) = optional::<i64>("REMINDER_WINDOW_MAX")? {
            config.reminder_window_max = Duration::minutes(max);
        }
        if let Some(secs) = optional("REMINDER_INTERVAL_SECS")? {
            config.reminder_interval_secs = secs;
        }
        if let Some(secs) = optional("JANITOR_INTERVAL_SECS")? {
            config.janitor_interval_secs = secs;
        }
        if let Some(hours) = optional::<i64>("RETENTION_HOURS")? {
            config.retention = Duration::hours(hours);
        }
        if let Some(addr) = optional("HEALTH_ADDR")? {
            config.health_addr = addr;
        }
        if let Some(limit) = optional("SESSION_RETRY_LIMIT")? {
            config.session_retry_limit = limit;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.subjects.is_empty() {
            return Err(AppError::Validation("SUBJECTS must name at least one subject".to_string()));
        }
        if self.reminder_window_min > self.reminder_window_max {
            return Err(AppError::Validation(
                "REMINDER_WINDOW_MIN must not exceed REMINDER_WINDOW_MAX".to_string(),
            ));
        }
        if self.reminder_window_min < Duration::zero() {
            return Err(AppError::Validation("reminder window must be positive".to_string()));
        }
        if self.reminder_interval_secs == 0 || self.janitor_interval_secs == 0 {
            return Err(AppError::Validation("sweep intervals must be non-zero".to_string()));
        }
        if self.retention <= Duration::zero() {
            return Err(AppError::Validation("RETENTION_HOURS must be positive".to_string()));
        }
        Ok(())
    }

    pub fn is_tutor(&self, user: StudentId) -> bool {
        user == self.tutor_id
    }

    pub fn offers_subject(&self, subject: &str) -> bool {
        self.subjects.iter().any(|s| s == subject)
    }
}

fn required(key: &str) -> Result<String, AppError> {
    env::var(key).map_err(|_| AppError::Validation(format!("{} is not set", key)))
}

fn optional<T: FromStr>(key: &str) -> Result<Option<T>, AppError> {
    match env::var(key) {
        Ok(raw) => parse_var(key, &raw).map(Some),
        Err(_) => Ok(None),
    }
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> Result<T, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("{} has an invalid value: '{}'", key, raw)))
}
