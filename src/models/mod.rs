pub mod cancellation;
pub mod lesson;
pub mod request;
pub mod reschedule;
pub mod schedule;
pub mod student;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

pub use cancellation::{PendingCancellation, PendingCancellations};
pub use lesson::{ConfirmedLesson, ConfirmedLessons};
pub use request::{PendingRequest, PendingRequests, RequestStatus};
pub use reschedule::{Party, PendingReschedule, PendingReschedules};
pub use schedule::{ActiveWeek, DaySchedule, LessonDay, NO_LESSONS, ScheduleTemplate, SlotTime};
pub use student::{Profiles, StudentId, StudentProfile};

/// Outcome of a counter-party approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Pending,
    Approved,
    Rejected,
}

/// Records the janitor ages out.
pub trait Expiring {
    fn created_at(&self) -> DateTime<FixedOffset>;
}

impl Expiring for PendingRequest {
    fn created_at(&self) -> DateTime<FixedOffset> {
        self.created_at
    }
}

impl Expiring for PendingReschedule {
    fn created_at(&self) -> DateTime<FixedOffset> {
        self.created_at
    }
}

impl Expiring for PendingCancellation {
    fn created_at(&self) -> DateTime<FixedOffset> {
        self.created_at
    }
}
