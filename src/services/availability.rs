use chrono::{DateTime, FixedOffset};

use crate::error::AppError;
use crate::models::{ActiveWeek, ConfirmedLessons, LessonDay, ScheduleTemplate, SlotTime};
use crate::state::AppState;

/// Free slots of `day`: the template's times minus those taken by a confirmed
/// lesson falling on that day of the active week. A "no lessons" day is always empty.
pub fn available_slots(
    day: LessonDay,
    template: &ScheduleTemplate,
    lessons: &ConfirmedLessons,
    week: &ActiveWeek,
) -> Vec<SlotTime> {
    if template.is_closed(day) {
        return Vec::new();
    }
    template
        .times(day)
        .iter()
        .copied()
        .filter(|time| !is_occupied(lessons, week, day, *time, None))
        .collect()
}

/// Same as [`available_slots`] for a weekday given by name; unknown names yield nothing.
pub fn available_slots_by_name(
    day_name: &str,
    template: &ScheduleTemplate,
    lessons: &ConfirmedLessons,
    week: &ActiveWeek,
) -> Vec<SlotTime> {
    match LessonDay::parse(day_name) {
        Some(day) => available_slots(day, template, lessons, week),
        None => Vec::new(),
    }
}

/// Whether a confirmed lesson other than `except` sits on (`day`, `time`) this week.
pub fn is_occupied(
    lessons: &ConfirmedLessons,
    week: &ActiveWeek,
    day: LessonDay,
    time: SlotTime,
    except: Option<&str>,
) -> bool {
    lessons.values().any(|lesson| {
        Some(lesson.lesson_id.as_str()) != except
            && week.day_of(&lesson.lesson_datetime) == Some(day)
            && SlotTime::of(&lesson.lesson_datetime) == time
    })
}

/// Whether any confirmed lesson other than `except` starts at exactly `at`.
pub fn clashes(lessons: &ConfirmedLessons, at: &DateTime<FixedOffset>, except: Option<&str>) -> bool {
    lessons
        .values()
        .any(|lesson| Some(lesson.lesson_id.as_str()) != except && lesson.lesson_datetime == *at)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayAvailability {
    pub day: LessonDay,
    pub label: String,
    pub slots: Vec<SlotTime>,
}

/// Store-backed availability queries against the current active week.
pub struct Availability {
    state: AppState,
}

impl Availability {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub async fn slots(&self, day: LessonDay) -> Result<Vec<SlotTime>, AppError> {
        let week = ActiveWeek::containing(self.state.clock.now());
        let template: ScheduleTemplate = self.state.repo.read().await?;
        let lessons: ConfirmedLessons = self.state.repo.read().await?;
        Ok(available_slots(day, &template, &lessons, &week))
    }

    /// Per-day free slots that still lie in the future, for the slot picker.
    pub async fn week_overview(&self) -> Result<Vec<DayAvailability>, AppError> {
        let now = self.state.clock.now();
        let week = ActiveWeek::containing(now);
        let template: ScheduleTemplate = self.state.repo.read().await?;
        let lessons: ConfirmedLessons = self.state.repo.read().await?;

        Ok(LessonDay::ALL
            .into_iter()
            .map(|day| DayAvailability {
                day,
                label: week.label(day),
                slots: available_slots(day, &template, &lessons, &week)
                    .into_iter()
                    .filter(|time| week.datetime_of(day, *time) > now)
                    .collect(),
            })
            .collect())
    }
}
