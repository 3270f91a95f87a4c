use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::{DecisionStatus, StudentId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCancellation {
    pub cancel_id: String,
    pub lesson_id: String,
    pub student_id: StudentId,
    pub subject: String,
    pub lesson_datetime: DateTime<FixedOffset>,
    pub created_at: DateTime<FixedOffset>,
    pub status: DecisionStatus,
}

pub type PendingCancellations = BTreeMap<String, PendingCancellation>;
