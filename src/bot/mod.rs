pub mod dialog;

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::{debug, error};

use crate::chat::{Action, Choice, UserId, deliver, deliver_choices};
use crate::error::AppError;
use crate::models::{ConfirmedLesson, Party};
use crate::services::{
    Availability, BookingService, CancellationService, RescheduleService, TemplateService, describe,
};
use crate::state::AppState;

pub use dialog::{Command, Decision, DialogState, Effect, Event, Inbound, LessonPurpose, Step};

const TEMPLATE_HELP: &str = "📝 Send the new schedule as JSON.\n\n\
Example:\n\
{\n  \"Monday\": [\"18:30\", \"19:30\"],\n  \"Tuesday\": [\"19:30\"],\n  \"Wednesday\": \"no lessons\",\n  \
\"Thursday\": [\"18:15\"],\n  \"Friday\": [],\n  \"Saturday\": [\"16:30\"]\n}";

/// Routes inbound chat events through the dialog table to the workflows.
pub struct Bot {
    state: AppState,
    booking: BookingService,
    reschedule: RescheduleService,
    cancellation: CancellationService,
    template: TemplateService,
    availability: Availability,
    dialogs: Mutex<HashMap<UserId, DialogState>>,
}

impl Bot {
    pub fn new(state: AppState) -> Self {
        Self {
            booking: BookingService::new(state.clone()),
            reschedule: RescheduleService::new(state.clone()),
            cancellation: CancellationService::new(state.clone()),
            template: TemplateService::new(state.clone()),
            availability: Availability::new(state.clone()),
            state,
            dialogs: Mutex::new(HashMap::new()),
        }
    }

    pub fn dialog(&self, user: UserId) -> DialogState {
        self.dialogs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&user)
            .cloned()
            .unwrap_or_default()
    }

    fn set_dialog(&self, user: UserId, next: DialogState) {
        let mut dialogs = self.dialogs.lock().unwrap_or_else(|e| e.into_inner());
        if next == DialogState::Idle {
            dialogs.remove(&user);
        } else {
            dialogs.insert(user, next);
        }
    }

    /// Handles one event. Domain errors become notices; only operational
    /// failures are returned, and never stop the caller's loop.
    pub async fn handle(&self, inbound: Inbound) -> Result<(), AppError> {
        let from = inbound.from;
        let current = self.dialog(from);
        let Step { next, effect } = dialog::step(&current, &inbound.event);
        debug!("user {} in {:?} -> {:?}", from, current, effect);

        let is_decision = matches!(effect, Effect::Decide(_));
        match self.perform(from, next, effect).await {
            Ok(next) => {
                self.set_dialog(from, next);
                Ok(())
            }
            Err(e) if e.is_domain() => {
                let fallback = self.explain(from, &e, &current, is_decision).await;
                self.set_dialog(from, fallback);
                Ok(())
            }
            Err(e) => {
                error!("handling event from {} failed: {}", from, e);
                deliver(self.chat(), from, &e.user_notice()).await;
                self.set_dialog(from, if is_decision { current } else { DialogState::Idle });
                Err(e)
            }
        }
    }

    async fn perform(&self, from: UserId, next: DialogState, effect: Effect) -> Result<DialogState, AppError> {
        match effect {
            Effect::ShowMenu => self.show_menu(from).await,
            Effect::PromptName => deliver(self.chat(), from, "Enter your name:").await,
            Effect::PromptGrade => {
                deliver(self.chat(), from, "Enter your grade (for example 9 or 10):").await
            }
            Effect::Register { name, grade } => {
                self.booking.register(from, &name, &grade).await?;
                self.show_subjects(from, &[]).await;
            }
            Effect::LoadRepeatProfile => {
                let profile = self.booking.repeat_profile(from).await?;
                self.show_subjects(from, &[]).await;
                return Ok(DialogState::ChoosingSubjects {
                    profile,
                    selected: Vec::new(),
                });
            }
            Effect::ShowSubjects { selected } => self.show_subjects(from, &selected).await,
            Effect::Notice(text) => deliver(self.chat(), from, text).await,
            Effect::ShowSlots => self.show_slots(from).await?,
            Effect::SubmitBooking {
                profile,
                subject,
                day,
                time,
            } => {
                let request = self
                    .booking
                    .submit_request(from, &profile, &subject, day, time)
                    .await?;
                let text = format!(
                    "✅ Lesson requested!\n\n📚 {}\n📅 {}\n\n⏳ Waiting for the tutor to confirm...",
                    request.subject,
                    describe(&request.target_datetime)
                );
                deliver(self.chat(), from, &text).await;
            }
            Effect::ListLessons(purpose) => {
                let lessons = match purpose {
                    LessonPurpose::Move => self.reschedule.movable_lessons(from).await?,
                    LessonPurpose::Cancel => self.cancellation.cancellable_lessons(from).await?,
                    LessonPurpose::TutorMove => {
                        self.template.ensure_tutor(from)?;
                        self.reschedule.all_lessons().await?
                    }
                };
                if lessons.is_empty() {
                    deliver(self.chat(), from, "❌ There are no confirmed lessons to choose from.").await;
                    self.show_menu(from).await;
                    return Ok(DialogState::Idle);
                }
                self.show_lessons(from, purpose, &lessons).await;
            }
            Effect::AskCancelConfirm { lesson_id } => {
                let lesson = self.cancellation.lesson_of(from, &lesson_id).await?;
                let text = format!(
                    "⚠️ CONFIRM CANCELLATION\n\n📚 {}\n📅 {}\n\nAre you sure you want to cancel this lesson?",
                    lesson.subject,
                    describe(&lesson.lesson_datetime)
                );
                deliver_choices(
                    self.chat(),
                    from,
                    &text,
                    vec![
                        Choice::new("✅ Yes, cancel", Action::ConfirmCancel),
                        Choice::new("❌ No, back to menu", Action::Menu),
                    ],
                )
                .await;
            }
            Effect::SubmitCancel { lesson_id } => {
                self.cancellation.request_cancel(from, &lesson_id).await?;
                deliver(
                    self.chat(),
                    from,
                    "⏳ Cancellation request sent to the tutor.\n\nWaiting for confirmation...",
                )
                .await;
            }
            Effect::SubmitReschedule {
                lesson_id,
                day,
                time,
                by,
            } => {
                let record = match by {
                    Party::Student => {
                        self.reschedule
                            .request_by_student(from, &lesson_id, day, time)
                            .await?
                    }
                    Party::Tutor => {
                        self.template.ensure_tutor(from)?;
                        self.reschedule.request_by_tutor(&lesson_id, day, time).await?
                    }
                };
                let text = format!(
                    "⏳ RESCHEDULE REQUESTED\n\n📚 {}\n📅 Old time: {}\n📅 New time: {}\n\nWaiting for confirmation...",
                    record.subject,
                    describe(&record.old_datetime),
                    describe(&record.new_datetime)
                );
                deliver(self.chat(), from, &text).await;
            }
            Effect::PromptTemplate => {
                self.template.ensure_tutor(from)?;
                deliver(self.chat(), from, TEMPLATE_HELP).await;
            }
            Effect::ApplyTemplate(json) => {
                self.template.replace(from, &json).await?;
                deliver(self.chat(), from, "✅ Schedule updated!").await;
            }
            Effect::CloseDay(day) => {
                self.template.close_day(from, day).await?;
                deliver(self.chat(), from, &format!("✅ {} is now marked as no lessons.", day)).await;
            }
            Effect::Decide(decision) => self.decide(from, decision).await?,
            Effect::Stale => {
                deliver(self.chat(), from, "This menu is no longer active.").await;
                self.show_menu(from).await;
            }
        }
        Ok(next)
    }

    async fn decide(&self, from: UserId, decision: Decision) -> Result<(), AppError> {
        let ack = match decision {
            Decision::ApproveRequest(id) => {
                self.template.ensure_tutor(from)?;
                self.booking.approve(&id).await?;
                "✅ Lesson confirmed and added to the schedule"
            }
            Decision::RejectRequest(id) => {
                self.template.ensure_tutor(from)?;
                self.booking.reject(&id).await?;
                "❌ Lesson request rejected"
            }
            Decision::ApproveReschedule(id) => {
                self.reschedule.ensure_decider(&id, from).await?;
                self.reschedule.approve_reschedule(&id).await?;
                return Ok(());
            }
            Decision::RejectReschedule(id) => {
                self.reschedule.ensure_decider(&id, from).await?;
                self.reschedule.reject_reschedule(&id).await?;
                return Ok(());
            }
            Decision::ApproveCancel(id) => {
                self.template.ensure_tutor(from)?;
                self.cancellation.approve_cancel(&id).await?;
                "✅ Cancellation confirmed, the time is free again"
            }
            Decision::RejectCancel(id) => {
                self.template.ensure_tutor(from)?;
                self.cancellation.reject_cancel(&id).await?;
                "❌ Cancellation declined"
            }
        };
        deliver(self.chat(), from, ack).await;
        Ok(())
    }

    /// Tells the user what went wrong and picks the state to continue from.
    async fn explain(
        &self,
        from: UserId,
        err: &AppError,
        current: &DialogState,
        is_decision: bool,
    ) -> DialogState {
        deliver(self.chat(), from, &err.user_notice()).await;

        if is_decision {
            return current.clone();
        }
        match err {
            AppError::SlotTaken if current.picks_slot() => {
                if let Err(e) = self.show_slots(from).await {
                    error!("could not re-present slots to {}: {}", from, e);
                }
                current.clone()
            }
            AppError::ProfileMissing => {
                deliver_choices(
                    self.chat(),
                    from,
                    "Book your first lesson to register:",
                    vec![
                        Choice::new("🎓 First lesson", Action::FirstLesson),
                        Choice::new("⬅️ Menu", Action::Menu),
                    ],
                )
                .await;
                DialogState::Idle
            }
            AppError::Validation(_) if *current != DialogState::Idle => current.clone(),
            _ => DialogState::Idle,
        }
    }

    async fn show_menu(&self, user: UserId) {
        let mut choices = vec![
            Choice::new("🎓 First lesson", Action::FirstLesson),
            Choice::new("📅 Repeat lesson", Action::RepeatLesson),
            Choice::new("📍 Reschedule a lesson", Action::Reschedule),
            Choice::new("❌ Cancel a lesson", Action::Cancel),
        ];
        if self.state.config.is_tutor(user) {
            choices.push(Choice::new("🛠 Edit schedule", Action::EditSchedule));
            choices.push(Choice::new("🔁 Move a student's lesson", Action::TutorReschedule));
        }
        deliver_choices(self.chat(), user, "👋 Welcome! What do you need?", choices).await;
    }

    async fn show_subjects(&self, user: UserId, selected: &[String]) {
        let mut choices: Vec<Choice> = self
            .state
            .config
            .subjects
            .iter()
            .map(|s| {
                let mark = if selected.contains(s) { "✅" } else { "⬜" };
                Choice::new(format!("{} {}", mark, s), Action::ToggleSubject(s.clone()))
            })
            .collect();
        choices.push(Choice::new("✓ Confirm choice", Action::SubjectsDone));
        deliver_choices(self.chat(), user, "Choose your subjects:", choices).await;
    }

    async fn show_slots(&self, user: UserId) -> Result<(), AppError> {
        let overview = self.availability.week_overview().await?;

        let mut text = String::from("📅 Choose a day and time:\n\n");
        let mut choices = Vec::new();
        for day in &overview {
            if day.slots.is_empty() {
                text.push_str(&format!("❌ {} - no free time\n", day.label));
                continue;
            }
            let times: Vec<String> = day.slots.iter().map(|t| t.to_string()).collect();
            text.push_str(&format!("{}: {}\n", day.label, times.join(", ")));
            for time in &day.slots {
                choices.push(Choice::new(
                    format!("{} {}", day.label, time),
                    Action::PickSlot(day.day, *time),
                ));
            }
        }
        choices.push(Choice::new("⬅️ Back", Action::Menu));
        deliver_choices(self.chat(), user, &text, choices).await;
        Ok(())
    }

    async fn show_lessons(&self, user: UserId, purpose: LessonPurpose, lessons: &[ConfirmedLesson]) {
        let prompt = match purpose {
            LessonPurpose::Move => "📅 Choose the lesson to move:",
            LessonPurpose::Cancel => "❌ Choose the lesson to cancel:",
            LessonPurpose::TutorMove => "🔁 Choose the lesson to move:",
        };
        let mut choices: Vec<Choice> = lessons
            .iter()
            .map(|l| {
                let label = match purpose {
                    LessonPurpose::TutorMove => format!(
                        "{} - {} ({})",
                        describe(&l.lesson_datetime),
                        l.student_name,
                        l.subject
                    ),
                    _ => format!("{} ({})", describe(&l.lesson_datetime), l.subject),
                };
                Choice::new(label, Action::PickLesson(l.lesson_id.clone()))
            })
            .collect();
        choices.push(Choice::new("⬅️ Menu", Action::Menu));
        deliver_choices(self.chat(), user, prompt, choices).await;
    }

    fn chat(&self) -> &dyn crate::chat::ChatTransport {
        self.state.chat.as_ref()
    }
}
