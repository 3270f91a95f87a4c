use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use tracing::{info, warn};

use crate::chat::deliver;
use crate::error::AppError;
use crate::models::{ConfirmedLesson, ConfirmedLessons};
use crate::services::describe;
use crate::state::AppState;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReminderStats {
    pub reminded: usize,
    pub expired: usize,
}

/// Periodic sweep sending one reminder to each party shortly before a lesson.
pub struct ReminderScheduler {
    state: AppState,
    interval: Duration,
}

impl ReminderScheduler {
    pub fn new(state: AppState, interval_secs: u64) -> Self {
        Self {
            state,
            interval: Duration::from_secs(interval_secs),
        }
    }

    /// Sweeps forever at a fixed interval.
    pub async fn start(self) {
        info!("Starting reminder scheduler (interval: {:?})", self.interval);

        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;

            let now = self.state.clock.now();
            match self.sweep(now).await {
                Ok(stats) if stats.reminded > 0 || stats.expired > 0 => {
                    info!(
                        "Reminder sweep - reminded: {} lessons | expired: {} lessons",
                        stats.reminded, stats.expired
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Reminder sweep failed: {:?}", e);
                }
            }
        }
    }

    /// Marks due lessons as reminded and drops lessons that have started, in one
    /// document write, then notifies. A lesson is reminded at most once per
    /// occurrence even if a notice fails to go out.
    pub async fn sweep(&self, now: DateTime<FixedOffset>) -> Result<ReminderStats, AppError> {
        let window_min = self.state.config.reminder_window_min;
        let window_max = self.state.config.reminder_window_max;

        let (due, expired) = self
            .state
            .repo
            .update::<ConfirmedLessons, _, _>(|lessons| {
                let mut due: Vec<ConfirmedLesson> = Vec::new();
                let mut expired = 0;
                lessons.retain(|_, lesson| {
                    let until = lesson.lesson_datetime - now;
                    if until < chrono::Duration::zero() {
                        expired += 1;
                        return false;
                    }
                    if !lesson.reminder_sent && until >= window_min && until <= window_max {
                        lesson.reminder_sent = true;
                        due.push(lesson.clone());
                    }
                    true
                });
                Ok((due, expired))
            })
            .await?;

        for lesson in &due {
            self.remind(lesson).await;
        }

        Ok(ReminderStats {
            reminded: due.len(),
            expired,
        })
    }

    async fn remind(&self, lesson: &ConfirmedLesson) {
        let when = describe(&lesson.lesson_datetime);
        let student = format!(
            "⏰ LESSON REMINDER!\n\n📚 {}\n📅 {}\n\nStarts in about an hour! Get everything ready!",
            lesson.subject, when
        );
        let tutor = format!(
            "⏰ LESSON REMINDER!\n\n👤 Student: {}\n📚 {}\n📅 {}\n\nStarts in about an hour!",
            lesson.student_name, lesson.subject, when
        );

        deliver(self.state.chat.as_ref(), lesson.student_id, &student).await;
        deliver(self.state.chat.as_ref(), self.state.config.tutor_id, &tutor).await;
        info!("Reminder sent for lesson {}", lesson.lesson_id);
    }
}
