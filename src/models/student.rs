use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Chat-level identity of a student.
pub type StudentId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub name: String,
    pub grade: String,
}

pub type Profiles = BTreeMap<StudentId, StudentProfile>;
