use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::{DecisionStatus, StudentId};

/// Who asked for the move. The other party decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    Student,
    Tutor,
}

impl Party {
    pub fn counterpart(self) -> Party {
        match self {
            Party::Student => Party::Tutor,
            Party::Tutor => Party::Student,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingReschedule {
    pub reschedule_id: String,
    pub lesson_id: String,
    pub student_id: StudentId,
    pub subject: String,
    pub old_datetime: DateTime<FixedOffset>,
    pub new_datetime: DateTime<FixedOffset>,
    pub created_at: DateTime<FixedOffset>,
    pub status: DecisionStatus,
    pub initiator: Party,
}

pub type PendingReschedules = BTreeMap<String, PendingReschedule>;
