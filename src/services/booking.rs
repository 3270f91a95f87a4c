use tracing::{info, warn};

use crate::chat::{Action, Choice, deliver, deliver_choices};
use crate::error::AppError;
use crate::models::{
    ActiveWeek, ConfirmedLesson, ConfirmedLessons, LessonDay, PendingRequest, PendingRequests,
    RequestStatus, ScheduleTemplate, SlotTime, StudentId, StudentProfile,
};
use crate::services::availability::{available_slots, clashes};
use crate::services::{describe, new_id};
use crate::state::AppState;

/// First and repeat lesson requests and the tutor's decision on them.
pub struct BookingService {
    state: AppState,
}

impl BookingService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// First-lesson registration. Stores the profile the later steps book under.
    pub async fn register(
        &self,
        student_id: StudentId,
        name: &str,
        grade: &str,
    ) -> Result<StudentProfile, AppError> {
        let name = name.trim();
        let grade = grade.trim();
        if name.is_empty() || grade.is_empty() {
            return Err(AppError::Validation("Name and grade must not be empty".to_string()));
        }
        let profile = StudentProfile {
            name: name.to_string(),
            grade: grade.to_string(),
        };
        self.state
            .identity
            .update_profile(student_id, profile.clone())
            .await?;
        Ok(profile)
    }

    /// Profile for a repeat lesson, recovered from any record that still names the student.
    pub async fn repeat_profile(&self, student_id: StudentId) -> Result<StudentProfile, AppError> {
        self.state.identity.require(student_id).await
    }

    /// Files a booking for (`day`, `time`) of the active week after re-checking the slot.
    pub async fn submit_request(
        &self,
        student_id: StudentId,
        profile: &StudentProfile,
        subject: &str,
        day: LessonDay,
        time: SlotTime,
    ) -> Result<PendingRequest, AppError> {
        self.check_subject(subject)?;

        let request = {
            let _guard = self.state.workflow_lock.lock().await;
            let now = self.state.clock.now();
            let week = ActiveWeek::containing(now);
            let template: ScheduleTemplate = self.state.repo.read().await?;
            let lessons: ConfirmedLessons = self.state.repo.read().await?;

            if !template.offers(day, time) || template.is_closed(day) {
                return Err(AppError::Validation(format!(
                    "{} {} is not offered",
                    day, time
                )));
            }
            if !available_slots(day, &template, &lessons, &week).contains(&time) {
                return Err(AppError::SlotTaken);
            }
            let target = week.datetime_of(day, time);
            if target <= now {
                return Err(AppError::Validation(format!(
                    "{} {} has already passed this week",
                    day, time
                )));
            }

            let request = PendingRequest {
                request_id: new_id(),
                student_id,
                student_name: profile.name.clone(),
                grade: profile.grade.clone(),
                subject: subject.to_string(),
                target_datetime: target,
                created_at: now,
                status: RequestStatus::Pending,
            };
            self.state
                .repo
                .update::<PendingRequests, _, _>(|requests| {
                    if requests.contains_key(&request.request_id) {
                        return Err(AppError::Conflict("request id collision".to_string()));
                    }
                    requests.insert(request.request_id.clone(), request.clone());
                    Ok(())
                })
                .await?;
            request
        };

        info!(
            "request {} from student {} for {}",
            request.request_id,
            student_id,
            describe(&request.target_datetime)
        );

        let text = format!(
            "📬 NEW LESSON REQUEST\n\n👤 Student: {}\n📖 Grade: {}\n📚 Subject: {}\n📅 {}",
            request.student_name,
            request.grade,
            request.subject,
            describe(&request.target_datetime)
        );
        deliver_choices(
            self.state.chat.as_ref(),
            self.state.config.tutor_id,
            &text,
            vec![
                Choice::new("✅ Approve", Action::ApproveRequest(request.request_id.clone())),
                Choice::new("❌ Reject", Action::RejectRequest(request.request_id.clone())),
            ],
        )
        .await;

        Ok(request)
    }

    /// Confirms a pending request. The lesson id is the request id.
    ///
    /// The request is settled before the lesson is written, so a purge of the
    /// pending record after that point cannot turn a committed lesson into an error.
    pub async fn approve(&self, request_id: &str) -> Result<ConfirmedLesson, AppError> {
        let outcome = {
            let _guard = self.state.workflow_lock.lock().await;
            let now = self.state.clock.now();
            let requests: PendingRequests = self.state.repo.read().await?;
            let request = requests
                .get(request_id)
                .filter(|r| r.status == RequestStatus::Pending)
                .cloned()
                .ok_or(AppError::NotFound)?;

            if request.target_datetime <= now {
                settle_request(&self.state, request_id, RequestStatus::Rejected).await?;
                Err((
                    AppError::Validation(format!(
                        "{} has already passed",
                        describe(&request.target_datetime)
                    )),
                    request,
                ))
            } else {
                let request =
                    settle_request(&self.state, request_id, RequestStatus::Confirmed).await?;
                let lesson = ConfirmedLesson {
                    lesson_id: request.request_id.clone(),
                    student_id: request.student_id,
                    student_name: request.student_name.clone(),
                    grade: request.grade.clone(),
                    subject: request.subject.clone(),
                    lesson_datetime: request.target_datetime,
                    reminder_sent: false,
                };

                let inserted = self
                    .state
                    .repo
                    .update::<ConfirmedLessons, _, _>(|lessons| {
                        if lessons.contains_key(&lesson.lesson_id) {
                            return Err(AppError::NotFound);
                        }
                        if clashes(lessons, &lesson.lesson_datetime, None) {
                            return Err(AppError::SlotTaken);
                        }
                        lessons.insert(lesson.lesson_id.clone(), lesson.clone());
                        Ok(())
                    })
                    .await;

                match inserted {
                    Ok(()) => Ok(lesson),
                    Err(AppError::SlotTaken) => {
                        restate_request(&self.state, request_id, RequestStatus::Rejected).await;
                        Err((AppError::SlotTaken, request))
                    }
                    Err(e) => {
                        restate_request(&self.state, request_id, RequestStatus::Pending).await;
                        return Err(e);
                    }
                }
            }
        };

        match outcome {
            Ok(lesson) => {
                info!("request {} confirmed", request_id);
                let text = format!(
                    "✅ CONFIRMED!\n\n📚 {}\n📅 {}\n\nPrepare your homework and questions for the lesson!",
                    lesson.subject,
                    describe(&lesson.lesson_datetime)
                );
                deliver(self.state.chat.as_ref(), lesson.student_id, &text).await;
                Ok(lesson)
            }
            Err((err, request)) => {
                let text = match err {
                    AppError::SlotTaken => {
                        warn!("request {} lost its slot before approval", request_id);
                        format!(
                            "❌ {} is no longer free. Please choose another time.",
                            describe(&request.target_datetime)
                        )
                    }
                    _ => {
                        warn!("request {} was approved after its time", request_id);
                        format!(
                            "❌ {} has already passed. Please choose another time.",
                            describe(&request.target_datetime)
                        )
                    }
                };
                deliver(self.state.chat.as_ref(), request.student_id, &text).await;
                Err(err)
            }
        }
    }

    pub async fn reject(&self, request_id: &str) -> Result<PendingRequest, AppError> {
        let request = {
            let _guard = self.state.workflow_lock.lock().await;
            settle_request(&self.state, request_id, RequestStatus::Rejected).await?
        };

        info!("request {} rejected", request_id);
        deliver(
            self.state.chat.as_ref(),
            request.student_id,
            "❌ Unfortunately the lesson cannot take place at the chosen time.\n\n\
             Please try another day or time.",
        )
        .await;
        Ok(request)
    }

    fn check_subject(&self, subject: &str) -> Result<(), AppError> {
        let parts: Vec<&str> = subject
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            return Err(AppError::Validation("Choose at least one subject".to_string()));
        }
        for part in parts {
            if !self.state.config.offers_subject(part) {
                return Err(AppError::Validation(format!("Unknown subject '{}'", part)));
            }
        }
        Ok(())
    }
}

/// Moves a pending request to a terminal status exactly once.
async fn settle_request(
    state: &AppState,
    request_id: &str,
    status: RequestStatus,
) -> Result<PendingRequest, AppError> {
    state
        .repo
        .update::<PendingRequests, _, _>(|requests| {
            let request = requests
                .get_mut(request_id)
                .filter(|r| r.status == RequestStatus::Pending)
                .ok_or(AppError::NotFound)?;
            request.status = status;
            Ok(request.clone())
        })
        .await
}

/// Rolls a settled request back after its lesson write failed. A record
/// purged in the meantime is left alone.
async fn restate_request(state: &AppState, request_id: &str, status: RequestStatus) {
    let restored = state
        .repo
        .update::<PendingRequests, _, _>(|requests| {
            if let Some(request) = requests.get_mut(request_id) {
                request.status = status;
            }
            Ok(())
        })
        .await;
    if let Err(e) = restored {
        warn!("could not restore request {}: {}", request_id, e);
    }
}
