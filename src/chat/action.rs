use std::fmt;
use std::str::FromStr;

use crate::error::AppError;
use crate::models::{LessonDay, SlotTime};

/// Everything a participant can select. Encoded into compact callback payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Menu,
    FirstLesson,
    RepeatLesson,
    Reschedule,
    Cancel,
    EditSchedule,
    TutorReschedule,
    ToggleSubject(String),
    SubjectsDone,
    PickSlot(LessonDay, SlotTime),
    PickLesson(String),
    ConfirmCancel,
    ApproveRequest(String),
    RejectRequest(String),
    ApproveReschedule(String),
    RejectReschedule(String),
    ApproveCancel(String),
    RejectCancel(String),
}

impl Action {
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Menu => f.write_str("menu"),
            Action::FirstLesson => f.write_str("first"),
            Action::RepeatLesson => f.write_str("repeat"),
            Action::Reschedule => f.write_str("move"),
            Action::Cancel => f.write_str("cancel"),
            Action::EditSchedule => f.write_str("edit_schedule"),
            Action::TutorReschedule => f.write_str("tutor_move"),
            Action::ToggleSubject(s) => write!(f, "subj:{}", s),
            Action::SubjectsDone => f.write_str("subj_done"),
            Action::PickSlot(day, time) => write!(f, "slot:{}:{}", day, time),
            Action::PickLesson(id) => write!(f, "lesson:{}", id),
            Action::ConfirmCancel => f.write_str("cancel_yes"),
            Action::ApproveRequest(id) => write!(f, "req_ok:{}", id),
            Action::RejectRequest(id) => write!(f, "req_no:{}", id),
            Action::ApproveReschedule(id) => write!(f, "mv_ok:{}", id),
            Action::RejectReschedule(id) => write!(f, "mv_no:{}", id),
            Action::ApproveCancel(id) => write!(f, "cx_ok:{}", id),
            Action::RejectCancel(id) => write!(f, "cx_no:{}", id),
        }
    }
}

impl FromStr for Action {
    type Err = AppError;

    fn from_str(payload: &str) -> Result<Self, Self::Err> {
        let unknown = || AppError::Validation(format!("Unknown action '{}'", payload));

        let action = match payload.split_once(':') {
            None => match payload {
                "menu" => Action::Menu,
                "first" => Action::FirstLesson,
                "repeat" => Action::RepeatLesson,
                "move" => Action::Reschedule,
                "cancel" => Action::Cancel,
                "edit_schedule" => Action::EditSchedule,
                "tutor_move" => Action::TutorReschedule,
                "subj_done" => Action::SubjectsDone,
                "cancel_yes" => Action::ConfirmCancel,
                _ => return Err(unknown()),
            },
            Some((_, "")) => return Err(unknown()),
            Some((tag, rest)) => {
                let rest = rest.to_string();
                match tag {
                    "subj" => Action::ToggleSubject(rest),
                    "slot" => {
                        let (day, time) = rest.split_once(':').ok_or_else(unknown)?;
                        Action::PickSlot(day.parse()?, time.parse()?)
                    }
                    "lesson" => Action::PickLesson(rest),
                    "req_ok" => Action::ApproveRequest(rest),
                    "req_no" => Action::RejectRequest(rest),
                    "mv_ok" => Action::ApproveReschedule(rest),
                    "mv_no" => Action::RejectReschedule(rest),
                    "cx_ok" => Action::ApproveCancel(rest),
                    "cx_no" => Action::RejectCancel(rest),
                    _ => return Err(unknown()),
                }
            }
        };
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_payload_carries_day_and_time() {
        let action = Action::PickSlot(LessonDay::Tuesday, "19:30".parse().unwrap());
        assert_eq!(action.encode(), "slot:Tuesday:19:30");
        assert_eq!("slot:Tuesday:19:30".parse::<Action>().unwrap(), action);
    }

    #[test]
    fn decision_payloads_do_not_shadow_each_other() {
        assert_eq!(
            "cx_ok:ab12".parse::<Action>().unwrap(),
            Action::ApproveCancel("ab12".to_string())
        );
        assert_eq!(
            "req_ok:ab12".parse::<Action>().unwrap(),
            Action::ApproveRequest("ab12".to_string())
        );
        assert_eq!(
            "mv_no:ab12".parse::<Action>().unwrap(),
            Action::RejectReschedule("ab12".to_string())
        );
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert!("".parse::<Action>().is_err());
        assert!("req_ok:".parse::<Action>().is_err());
        assert!("slot:Sunday:10:00".parse::<Action>().is_err());
        assert!("slot:Monday".parse::<Action>().is_err());
        assert!("launch".parse::<Action>().is_err());
    }
}
