//! Per-user conversation states and the table of transitions between them.
//!
//! `step` is pure: it names the next state and the effect the dispatcher
//! should carry out. The dispatcher may override the next state when the
//! effect fails (a taken slot keeps the user on the slot picker, and so on).

use crate::chat::{Action, UserId};
use crate::models::{LessonDay, Party, SlotTime, StudentProfile};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Menu,
    Schedule,
    CloseDay(LessonDay),
}

impl Command {
    /// Recognises slash commands.
    pub fn parse(text: &str) -> Option<Command> {
        let mut words = text.split_whitespace();
        match words.next()? {
            "/start" => Some(Command::Start),
            "/menu" => Some(Command::Menu),
            "/schedule" => Some(Command::Schedule),
            "/close" => words.next().and_then(LessonDay::parse).map(Command::CloseDay),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Command(Command),
    Text(String),
    Selected(Action),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub from: UserId,
    pub event: Event,
}

impl Inbound {
    pub fn text(from: UserId, text: &str) -> Self {
        let event = match Command::parse(text) {
            Some(command) => Event::Command(command),
            None => Event::Text(text.to_string()),
        };
        Self { from, event }
    }

    pub fn selected(from: UserId, action: Action) -> Self {
        Self {
            from,
            event: Event::Selected(action),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DialogState {
    #[default]
    Idle,
    AwaitingName,
    AwaitingGrade {
        name: String,
    },
    ChoosingSubjects {
        profile: StudentProfile,
        selected: Vec<String>,
    },
    ChoosingSlot {
        profile: StudentProfile,
        subject: String,
    },
    ChoosingLessonToMove,
    ChoosingNewSlot {
        lesson_id: String,
    },
    ChoosingLessonToCancel,
    ConfirmingCancel {
        lesson_id: String,
    },
    TutorChoosingLesson,
    TutorChoosingSlot {
        lesson_id: String,
    },
    AwaitingTemplate,
}

impl DialogState {
    pub fn picks_slot(&self) -> bool {
        matches!(
            self,
            DialogState::ChoosingSlot { .. }
                | DialogState::ChoosingNewSlot { .. }
                | DialogState::TutorChoosingSlot { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonPurpose {
    Move,
    Cancel,
    TutorMove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    ApproveRequest(String),
    RejectRequest(String),
    ApproveReschedule(String),
    RejectReschedule(String),
    ApproveCancel(String),
    RejectCancel(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    ShowMenu,
    PromptName,
    PromptGrade,
    Register {
        name: String,
        grade: String,
    },
    LoadRepeatProfile,
    ShowSubjects {
        selected: Vec<String>,
    },
    Notice(&'static str),
    ShowSlots,
    SubmitBooking {
        profile: StudentProfile,
        subject: String,
        day: LessonDay,
        time: SlotTime,
    },
    ListLessons(LessonPurpose),
    AskCancelConfirm {
        lesson_id: String,
    },
    SubmitCancel {
        lesson_id: String,
    },
    SubmitReschedule {
        lesson_id: String,
        day: LessonDay,
        time: SlotTime,
        by: Party,
    },
    PromptTemplate,
    ApplyTemplate(String),
    CloseDay(LessonDay),
    Decide(Decision),
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub next: DialogState,
    pub effect: Effect,
}

fn to(next: DialogState, effect: Effect) -> Step {
    Step { next, effect }
}

pub fn step(state: &DialogState, event: &Event) -> Step {
    use DialogState as S;

    // Decisions do not disturb whatever the decider was doing.
    if let Event::Selected(action) = event {
        if let Some(decision) = decision(action) {
            return to(state.clone(), Effect::Decide(decision));
        }
    }

    match (state, event) {
        // Entry points, valid from anywhere.
        (_, Event::Command(Command::Start | Command::Menu)) | (_, Event::Selected(Action::Menu)) => {
            to(S::Idle, Effect::ShowMenu)
        }
        (_, Event::Command(Command::Schedule)) | (_, Event::Selected(Action::EditSchedule)) => {
            to(S::AwaitingTemplate, Effect::PromptTemplate)
        }
        (_, Event::Command(Command::CloseDay(day))) => to(S::Idle, Effect::CloseDay(*day)),
        (_, Event::Selected(Action::FirstLesson)) => to(S::AwaitingName, Effect::PromptName),
        (_, Event::Selected(Action::RepeatLesson)) => to(S::Idle, Effect::LoadRepeatProfile),
        (_, Event::Selected(Action::Reschedule)) => {
            to(S::ChoosingLessonToMove, Effect::ListLessons(LessonPurpose::Move))
        }
        (_, Event::Selected(Action::Cancel)) => {
            to(S::ChoosingLessonToCancel, Effect::ListLessons(LessonPurpose::Cancel))
        }
        (_, Event::Selected(Action::TutorReschedule)) => {
            to(S::TutorChoosingLesson, Effect::ListLessons(LessonPurpose::TutorMove))
        }

        // First lesson registration.
        (S::AwaitingName, Event::Text(name)) => to(
            S::AwaitingGrade {
                name: name.trim().to_string(),
            },
            Effect::PromptGrade,
        ),
        (S::AwaitingGrade { name }, Event::Text(grade)) => to(
            S::ChoosingSubjects {
                profile: StudentProfile {
                    name: name.clone(),
                    grade: grade.trim().to_string(),
                },
                selected: Vec::new(),
            },
            Effect::Register {
                name: name.clone(),
                grade: grade.trim().to_string(),
            },
        ),

        // Subjects, then a slot.
        (S::ChoosingSubjects { profile, selected }, Event::Selected(Action::ToggleSubject(subject))) => {
            let mut selected = selected.clone();
            match selected.iter().position(|s| s == subject) {
                Some(i) => {
                    selected.remove(i);
                }
                None => selected.push(subject.clone()),
            }
            to(
                S::ChoosingSubjects {
                    profile: profile.clone(),
                    selected: selected.clone(),
                },
                Effect::ShowSubjects { selected },
            )
        }
        (S::ChoosingSubjects { selected, .. }, Event::Selected(Action::SubjectsDone))
            if selected.is_empty() =>
        {
            to(state.clone(), Effect::Notice("Choose at least one subject!"))
        }
        (S::ChoosingSubjects { profile, selected }, Event::Selected(Action::SubjectsDone)) => to(
            S::ChoosingSlot {
                profile: profile.clone(),
                subject: selected.join(", "),
            },
            Effect::ShowSlots,
        ),
        (S::ChoosingSlot { profile, subject }, Event::Selected(Action::PickSlot(day, time))) => to(
            S::Idle,
            Effect::SubmitBooking {
                profile: profile.clone(),
                subject: subject.clone(),
                day: *day,
                time: *time,
            },
        ),

        // Student reschedule.
        (S::ChoosingLessonToMove, Event::Selected(Action::PickLesson(id))) => to(
            S::ChoosingNewSlot {
                lesson_id: id.clone(),
            },
            Effect::ShowSlots,
        ),
        (S::ChoosingNewSlot { lesson_id }, Event::Selected(Action::PickSlot(day, time))) => to(
            S::Idle,
            Effect::SubmitReschedule {
                lesson_id: lesson_id.clone(),
                day: *day,
                time: *time,
                by: Party::Student,
            },
        ),

        // Cancellation, with a confirmation step.
        (S::ChoosingLessonToCancel, Event::Selected(Action::PickLesson(id))) => to(
            S::ConfirmingCancel {
                lesson_id: id.clone(),
            },
            Effect::AskCancelConfirm {
                lesson_id: id.clone(),
            },
        ),
        (S::ConfirmingCancel { lesson_id }, Event::Selected(Action::ConfirmCancel)) => to(
            S::Idle,
            Effect::SubmitCancel {
                lesson_id: lesson_id.clone(),
            },
        ),

        // Tutor-initiated reschedule.
        (S::TutorChoosingLesson, Event::Selected(Action::PickLesson(id))) => to(
            S::TutorChoosingSlot {
                lesson_id: id.clone(),
            },
            Effect::ShowSlots,
        ),
        (S::TutorChoosingSlot { lesson_id }, Event::Selected(Action::PickSlot(day, time))) => to(
            S::Idle,
            Effect::SubmitReschedule {
                lesson_id: lesson_id.clone(),
                day: *day,
                time: *time,
                by: Party::Tutor,
            },
        ),

        (S::AwaitingTemplate, Event::Text(json)) => to(S::Idle, Effect::ApplyTemplate(json.clone())),

        (s, Event::Text(_)) => to(
            s.clone(),
            Effect::Notice("Use the menu buttons, or send /menu to start over."),
        ),
        (_, Event::Selected(_)) => to(S::Idle, Effect::Stale),
    }
}

fn decision(action: &Action) -> Option<Decision> {
    Some(match action {
        Action::ApproveRequest(id) => Decision::ApproveRequest(id.clone()),
        Action::RejectRequest(id) => Decision::RejectRequest(id.clone()),
        Action::ApproveReschedule(id) => Decision::ApproveReschedule(id.clone()),
        Action::RejectReschedule(id) => Decision::RejectReschedule(id.clone()),
        Action::ApproveCancel(id) => Decision::ApproveCancel(id.clone()),
        Action::RejectCancel(id) => Decision::RejectCancel(id.clone()),
        _ => return None,
    })
}
