use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::StudentId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedLesson {
    pub lesson_id: String,
    pub student_id: StudentId,
    pub student_name: String,
    pub grade: String,
    pub subject: String,
    pub lesson_datetime: DateTime<FixedOffset>,
    #[serde(default)]
    pub reminder_sent: bool,
}

pub type ConfirmedLessons = BTreeMap<String, ConfirmedLesson>;
