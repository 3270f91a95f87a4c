pub mod availability;
pub mod booking;
pub mod cancellation;
pub mod identity;
pub mod janitor;
pub mod reminder;
pub mod reschedule;
pub mod template;

use chrono::{DateTime, FixedOffset};
use uuid::Uuid;

pub use availability::{Availability, DayAvailability, available_slots};
pub use booking::BookingService;
pub use cancellation::CancellationService;
pub use identity::IdentityResolver;
pub use janitor::{Janitor, PurgeStats};
pub use reminder::{ReminderScheduler, ReminderStats};
pub use reschedule::RescheduleService;
pub use template::TemplateService;

/// Fresh record id. Random v4 ids are never handed out twice.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Human-readable lesson time, e.g. "Tuesday 03 March, 18:00".
pub fn describe(dt: &DateTime<FixedOffset>) -> String {
    dt.format("%A %d %B, %H:%M").to_string()
}
