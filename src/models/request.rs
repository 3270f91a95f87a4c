use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::StudentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Confirmed,
    Rejected,
}

/// A booking waiting for the tutor's decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub request_id: String,
    pub student_id: StudentId,
    pub student_name: String,
    pub grade: String,
    pub subject: String,
    pub target_datetime: DateTime<FixedOffset>,
    pub created_at: DateTime<FixedOffset>,
    pub status: RequestStatus,
}

pub type PendingRequests = BTreeMap<String, PendingRequest>;
