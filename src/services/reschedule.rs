use tracing::{info, warn};

use crate::chat::{Action, Choice, UserId, deliver, deliver_choices};
use crate::error::AppError;
use crate::models::{
    ActiveWeek, ConfirmedLesson, ConfirmedLessons, DecisionStatus, LessonDay, Party,
    PendingReschedule, PendingReschedules, ScheduleTemplate, SlotTime, StudentId,
};
use crate::services::availability::{clashes, is_occupied};
use crate::services::{describe, new_id};
use crate::state::AppState;

/// Moving a confirmed lesson. Whoever asks, the other party decides.
pub struct RescheduleService {
    state: AppState,
}

impl RescheduleService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Lessons a student may ask to move. Requires a resolvable identity.
    pub async fn movable_lessons(&self, student_id: StudentId) -> Result<Vec<ConfirmedLesson>, AppError> {
        self.state.identity.require(student_id).await?;
        let lessons: ConfirmedLessons = self.state.repo.read().await?;
        Ok(sorted(lessons.into_values().filter(|l| l.student_id == student_id)))
    }

    /// Every confirmed lesson, for the tutor's picker.
    pub async fn all_lessons(&self) -> Result<Vec<ConfirmedLesson>, AppError> {
        let lessons: ConfirmedLessons = self.state.repo.read().await?;
        Ok(sorted(lessons.into_values()))
    }

    pub async fn request_by_student(
        &self,
        student_id: StudentId,
        lesson_id: &str,
        day: LessonDay,
        time: SlotTime,
    ) -> Result<PendingReschedule, AppError> {
        self.file(Party::Student, Some(student_id), lesson_id, day, time)
            .await
    }

    pub async fn request_by_tutor(
        &self,
        lesson_id: &str,
        day: LessonDay,
        time: SlotTime,
    ) -> Result<PendingReschedule, AppError> {
        self.file(Party::Tutor, None, lesson_id, day, time).await
    }

    /// Fails unless `actor` is the party that did not initiate `reschedule_id`.
    pub async fn ensure_decider(&self, reschedule_id: &str, actor: UserId) -> Result<(), AppError> {
        let pending: PendingReschedules = self.state.repo.read().await?;
        let record = pending
            .get(reschedule_id)
            .filter(|r| r.status == DecisionStatus::Pending)
            .ok_or(AppError::NotFound)?;
        if self.party_user(record.initiator.counterpart(), record.student_id) == actor {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    /// Applies an agreed move. The record is settled before the lesson is touched
    /// and rolled back to pending if the lesson write fails for an operational reason.
    pub async fn approve_reschedule(&self, reschedule_id: &str) -> Result<ConfirmedLesson, AppError> {
        let (record, applied) = {
            let _guard = self.state.workflow_lock.lock().await;
            let now = self.state.clock.now();
            let record = settle(&self.state, reschedule_id, DecisionStatus::Approved).await?;

            let applied = if record.new_datetime <= now {
                Err(AppError::Validation(format!(
                    "{} has already passed",
                    describe(&record.new_datetime)
                )))
            } else {
                self.state
                    .repo
                    .update::<ConfirmedLessons, _, _>(|lessons| {
                        if clashes(lessons, &record.new_datetime, Some(&record.lesson_id)) {
                            return Err(AppError::SlotTaken);
                        }
                        let lesson = lessons.get_mut(&record.lesson_id).ok_or(AppError::NotFound)?;
                        lesson.lesson_datetime = record.new_datetime;
                        lesson.reminder_sent = false;
                        Ok(lesson.clone())
                    })
                    .await
            };

            match applied {
                Ok(lesson) => (record, Ok(lesson)),
                Err(e @ (AppError::SlotTaken | AppError::NotFound | AppError::Validation(_))) => {
                    restate(&self.state, reschedule_id, DecisionStatus::Rejected).await;
                    (record, Err(e))
                }
                Err(e) => {
                    restate(&self.state, reschedule_id, DecisionStatus::Pending).await;
                    return Err(e);
                }
            }
        };

        match applied {
            Ok(lesson) => {
                info!(
                    "lesson {} moved to {}",
                    lesson.lesson_id,
                    describe(&lesson.lesson_datetime)
                );
                let text = format!(
                    "✅ RESCHEDULE CONFIRMED!\n\n📚 {}\n📅 New time: {}",
                    lesson.subject,
                    describe(&lesson.lesson_datetime)
                );
                self.notify_both(&record, &text).await;
                Ok(lesson)
            }
            Err(err) => {
                warn!("reschedule {} could not be applied: {}", reschedule_id, err);
                let when = describe(&record.new_datetime);
                let text = match err {
                    AppError::NotFound => format!(
                        "❌ The lesson could not be moved to {}: the lesson no longer exists.",
                        when
                    ),
                    AppError::SlotTaken => format!(
                        "❌ The lesson could not be moved to {}: that time is no longer available.",
                        when
                    ),
                    _ => format!(
                        "❌ The lesson could not be moved to {}: that time has already passed.",
                        when
                    ),
                };
                self.notify_both(&record, &text).await;
                Err(err)
            }
        }
    }

    pub async fn reject_reschedule(&self, reschedule_id: &str) -> Result<PendingReschedule, AppError> {
        let record = {
            let _guard = self.state.workflow_lock.lock().await;
            settle(&self.state, reschedule_id, DecisionStatus::Rejected).await?
        };

        info!("reschedule {} rejected", reschedule_id);
        let text = format!(
            "❌ The reschedule was declined.\n\n📚 {}\n📅 The lesson stays at {}",
            record.subject,
            describe(&record.old_datetime)
        );
        self.notify_both(&record, &text).await;
        Ok(record)
    }

    async fn file(
        &self,
        initiator: Party,
        student_id: Option<StudentId>,
        lesson_id: &str,
        day: LessonDay,
        time: SlotTime,
    ) -> Result<PendingReschedule, AppError> {
        let (record, lesson) = {
            let _guard = self.state.workflow_lock.lock().await;
            let now = self.state.clock.now();
            let week = ActiveWeek::containing(now);
            let template: ScheduleTemplate = self.state.repo.read().await?;
            let lessons: ConfirmedLessons = self.state.repo.read().await?;

            let lesson = lessons
                .get(lesson_id)
                .filter(|l| student_id.is_none_or(|id| l.student_id == id))
                .cloned()
                .ok_or(AppError::NotFound)?;

            if !template.offers(day, time) || template.is_closed(day) {
                return Err(AppError::Validation(format!("{} {} is not offered", day, time)));
            }
            let target = week.datetime_of(day, time);
            if target == lesson.lesson_datetime {
                return Err(AppError::Validation(
                    "The lesson is already at that time".to_string(),
                ));
            }
            if is_occupied(&lessons, &week, day, time, Some(lesson_id)) {
                return Err(AppError::SlotTaken);
            }
            if target <= now {
                return Err(AppError::Validation(format!(
                    "{} {} has already passed this week",
                    day, time
                )));
            }

            let record = PendingReschedule {
                reschedule_id: new_id(),
                lesson_id: lesson.lesson_id.clone(),
                student_id: lesson.student_id,
                subject: lesson.subject.clone(),
                old_datetime: lesson.lesson_datetime,
                new_datetime: target,
                created_at: now,
                status: DecisionStatus::Pending,
                initiator,
            };
            self.state
                .repo
                .update::<PendingReschedules, _, _>(|pending| {
                    let open = pending.values().any(|r| {
                        r.lesson_id == record.lesson_id && r.status == DecisionStatus::Pending
                    });
                    if open {
                        return Err(AppError::Validation(
                            "A move of this lesson is already awaiting a decision".to_string(),
                        ));
                    }
                    pending.insert(record.reschedule_id.clone(), record.clone());
                    Ok(())
                })
                .await?;
            (record, lesson)
        };

        info!(
            "reschedule {} of lesson {} requested by {:?}",
            record.reschedule_id, record.lesson_id, initiator
        );

        let text = match initiator {
            Party::Student => format!(
                "📍 RESCHEDULE REQUEST\n\n👤 Student: {}\n📚 {}\n📅 Old time: {}\n📅 New time: {}",
                lesson.student_name,
                record.subject,
                describe(&record.old_datetime),
                describe(&record.new_datetime)
            ),
            Party::Tutor => format!(
                "📍 The tutor asks to move your lesson\n\n📚 {}\n📅 Old time: {}\n📅 New time: {}",
                record.subject,
                describe(&record.old_datetime),
                describe(&record.new_datetime)
            ),
        };
        deliver_choices(
            self.state.chat.as_ref(),
            self.party_user(initiator.counterpart(), record.student_id),
            &text,
            vec![
                Choice::new("✅ Approve", Action::ApproveReschedule(record.reschedule_id.clone())),
                Choice::new("❌ Decline", Action::RejectReschedule(record.reschedule_id.clone())),
            ],
        )
        .await;

        Ok(record)
    }

    fn party_user(&self, party: Party, student_id: StudentId) -> UserId {
        match party {
            Party::Student => student_id,
            Party::Tutor => self.state.config.tutor_id,
        }
    }

    async fn notify_both(&self, record: &PendingReschedule, text: &str) {
        deliver(self.state.chat.as_ref(), record.student_id, text).await;
        deliver(self.state.chat.as_ref(), self.state.config.tutor_id, text).await;
    }
}

async fn settle(
    state: &AppState,
    reschedule_id: &str,
    status: DecisionStatus,
) -> Result<PendingReschedule, AppError> {
    state
        .repo
        .update::<PendingReschedules, _, _>(|pending| {
            let record = pending
                .get_mut(reschedule_id)
                .filter(|r| r.status == DecisionStatus::Pending)
                .ok_or(AppError::NotFound)?;
            record.status = status;
            Ok(record.clone())
        })
        .await
}

/// Puts a settled record back after its lesson write failed. A record purged
/// in the meantime is left alone.
async fn restate(state: &AppState, reschedule_id: &str, status: DecisionStatus) {
    let restored = state
        .repo
        .update::<PendingReschedules, _, _>(|pending| {
            if let Some(record) = pending.get_mut(reschedule_id) {
                record.status = status;
            }
            Ok(())
        })
        .await;
    if let Err(e) = restored {
        warn!("could not restore reschedule {}: {}", reschedule_id, e);
    }
}

fn sorted(lessons: impl Iterator<Item = ConfirmedLesson>) -> Vec<ConfirmedLesson> {
    let mut lessons: Vec<_> = lessons.collect();
    lessons.sort_by_key(|l| l.lesson_datetime);
    lessons
}
