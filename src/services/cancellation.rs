use tracing::info;

use crate::chat::{Action, Choice, deliver, deliver_choices};
use crate::error::AppError;
use crate::models::{
    ConfirmedLesson, ConfirmedLessons, DecisionStatus, PendingCancellation, PendingCancellations,
    StudentId,
};
use crate::services::{describe, new_id};
use crate::state::AppState;

/// Student-initiated cancellation, always subject to the tutor's approval.
pub struct CancellationService {
    state: AppState,
}

impl CancellationService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub async fn cancellable_lessons(&self, student_id: StudentId) -> Result<Vec<ConfirmedLesson>, AppError> {
        let lessons: ConfirmedLessons = self.state.repo.read().await?;
        let mut own: Vec<_> = lessons
            .into_values()
            .filter(|l| l.student_id == student_id)
            .collect();
        own.sort_by_key(|l| l.lesson_datetime);
        Ok(own)
    }

    /// Looks up one of the student's lessons for the confirmation step.
    pub async fn lesson_of(&self, student_id: StudentId, lesson_id: &str) -> Result<ConfirmedLesson, AppError> {
        let lessons: ConfirmedLessons = self.state.repo.read().await?;
        lessons
            .get(lesson_id)
            .filter(|l| l.student_id == student_id)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    pub async fn request_cancel(
        &self,
        student_id: StudentId,
        lesson_id: &str,
    ) -> Result<PendingCancellation, AppError> {
        let (record, lesson) = {
            let _guard = self.state.workflow_lock.lock().await;
            let lesson = self.lesson_of(student_id, lesson_id).await?;

            let record = PendingCancellation {
                cancel_id: new_id(),
                lesson_id: lesson.lesson_id.clone(),
                student_id,
                subject: lesson.subject.clone(),
                lesson_datetime: lesson.lesson_datetime,
                created_at: self.state.clock.now(),
                status: DecisionStatus::Pending,
            };
            self.state
                .repo
                .update::<PendingCancellations, _, _>(|pending| {
                    let open = pending.values().any(|c| {
                        c.lesson_id == record.lesson_id && c.status == DecisionStatus::Pending
                    });
                    if open {
                        return Err(AppError::Validation(
                            "Cancellation of this lesson is already awaiting the tutor".to_string(),
                        ));
                    }
                    pending.insert(record.cancel_id.clone(), record.clone());
                    Ok(())
                })
                .await?;
            (record, lesson)
        };

        info!("cancellation {} of lesson {} requested", record.cancel_id, record.lesson_id);

        let text = format!(
            "❌ CANCELLATION REQUEST\n\n👤 Student: {}\n📚 {}\n📅 {}\n\nAgree to cancel this lesson?",
            lesson.student_name,
            record.subject,
            describe(&record.lesson_datetime)
        );
        deliver_choices(
            self.state.chat.as_ref(),
            self.state.config.tutor_id,
            &text,
            vec![
                Choice::new("✅ Cancel lesson", Action::ApproveCancel(record.cancel_id.clone())),
                Choice::new("❌ Keep lesson", Action::RejectCancel(record.cancel_id.clone())),
            ],
        )
        .await;

        Ok(record)
    }

    /// Deletes the lesson. Its slot is free again for availability queries.
    pub async fn approve_cancel(&self, cancel_id: &str) -> Result<PendingCancellation, AppError> {
        let record = {
            let _guard = self.state.workflow_lock.lock().await;
            let record = settle(&self.state, cancel_id, DecisionStatus::Approved).await?;
            self.state
                .repo
                .update::<ConfirmedLessons, _, _>(|lessons| {
                    Ok(lessons.remove(&record.lesson_id).is_some())
                })
                .await?;
            record
        };

        info!("lesson {} cancelled", record.lesson_id);
        let text = format!(
            "✅ Lesson cancelled!\n\n📚 {}\n📅 {}\n\nYou can always book a new time!",
            record.subject,
            describe(&record.lesson_datetime)
        );
        deliver(self.state.chat.as_ref(), record.student_id, &text).await;
        Ok(record)
    }

    pub async fn reject_cancel(&self, cancel_id: &str) -> Result<PendingCancellation, AppError> {
        let record = {
            let _guard = self.state.workflow_lock.lock().await;
            settle(&self.state, cancel_id, DecisionStatus::Rejected).await?
        };

        info!("cancellation {} rejected", cancel_id);
        let text = format!(
            "❌ The tutor declined the cancellation.\n\n📚 {}\n📅 {}\n\nThe lesson stays in your schedule.",
            record.subject,
            describe(&record.lesson_datetime)
        );
        deliver(self.state.chat.as_ref(), record.student_id, &text).await;
        Ok(record)
    }
}

async fn settle(
    state: &AppState,
    cancel_id: &str,
    status: DecisionStatus,
) -> Result<PendingCancellation, AppError> {
    state
        .repo
        .update::<PendingCancellations, _, _>(|pending| {
            let record = pending
                .get_mut(cancel_id)
                .filter(|c| c.status == DecisionStatus::Pending)
                .ok_or(AppError::NotFound)?;
            record.status = status;
            Ok(record.clone())
        })
        .await
}
