use tracing::info;

use crate::chat::UserId;
use crate::error::AppError;
use crate::models::{DaySchedule, LessonDay, ScheduleTemplate};
use crate::state::AppState;

/// Tutor-only edits of the recurring weekly template. Confirmed lessons are never touched.
pub struct TemplateService {
    state: AppState,
}

impl TemplateService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub async fn current(&self) -> Result<ScheduleTemplate, AppError> {
        self.state.repo.read().await
    }

    /// Replaces the whole template with a JSON object naming all six days.
    pub async fn replace(&self, actor: UserId, json: &str) -> Result<ScheduleTemplate, AppError> {
        self.ensure_tutor(actor)?;
        let template = ScheduleTemplate::parse_full(json)?;
        self.state
            .repo
            .update::<ScheduleTemplate, _, _>(|current| {
                *current = template.clone();
                Ok(())
            })
            .await?;
        info!("schedule template replaced by tutor");
        Ok(template)
    }

    pub async fn set_day(
        &self,
        actor: UserId,
        day: LessonDay,
        schedule: DaySchedule,
    ) -> Result<ScheduleTemplate, AppError> {
        self.ensure_tutor(actor)?;
        let template = self
            .state
            .repo
            .update::<ScheduleTemplate, _, _>(|current| {
                current.set_day(day, schedule.clone());
                Ok(current.clone())
            })
            .await?;
        info!("schedule for {} set to {:?}", day, schedule);
        Ok(template)
    }

    pub async fn close_day(&self, actor: UserId, day: LessonDay) -> Result<ScheduleTemplate, AppError> {
        self.set_day(actor, day, DaySchedule::NoLessons).await
    }

    pub fn ensure_tutor(&self, actor: UserId) -> Result<(), AppError> {
        if self.state.config.is_tutor(actor) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}
