use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AppError;

/// Marker the tutor uses for a day that is explicitly closed.
pub const NO_LESSONS: &str = "no lessons";

/// A teaching day. Sunday is never offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LessonDay {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl LessonDay {
    pub const ALL: [LessonDay; 6] = [
        LessonDay::Monday,
        LessonDay::Tuesday,
        LessonDay::Wednesday,
        LessonDay::Thursday,
        LessonDay::Friday,
        LessonDay::Saturday,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LessonDay::Monday => "Monday",
            LessonDay::Tuesday => "Tuesday",
            LessonDay::Wednesday => "Wednesday",
            LessonDay::Thursday => "Thursday",
            LessonDay::Friday => "Friday",
            LessonDay::Saturday => "Saturday",
        }
    }

    pub fn from_weekday(weekday: Weekday) -> Option<Self> {
        match weekday {
            Weekday::Mon => Some(LessonDay::Monday),
            Weekday::Tue => Some(LessonDay::Tuesday),
            Weekday::Wed => Some(LessonDay::Wednesday),
            Weekday::Thu => Some(LessonDay::Thursday),
            Weekday::Fri => Some(LessonDay::Friday),
            Weekday::Sat => Some(LessonDay::Saturday),
            Weekday::Sun => None,
        }
    }

    /// Case-insensitive lookup by full English name.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|day| day.name().eq_ignore_ascii_case(name))
    }

    fn days_from_monday(self) -> i64 {
        match self {
            LessonDay::Monday => 0,
            LessonDay::Tuesday => 1,
            LessonDay::Wednesday => 2,
            LessonDay::Thursday => 3,
            LessonDay::Friday => 4,
            LessonDay::Saturday => 5,
        }
    }
}

impl fmt::Display for LessonDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LessonDay {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| AppError::Validation(format!("Unknown weekday '{}'", s)))
    }
}

/// Time of day of a slot, written as "HH:MM".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotTime(NaiveTime);

impl SlotTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(SlotTime)
    }

    pub fn time(self) -> NaiveTime {
        self.0
    }

    pub fn of(dt: &DateTime<FixedOffset>) -> Self {
        SlotTime(NaiveTime::from_hms_opt(dt.hour(), dt.minute(), 0).unwrap_or(dt.time()))
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl FromStr for SlotTime {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map(SlotTime)
            .map_err(|_| AppError::Validation(format!("'{}' is not a HH:MM time", s)))
    }
}

impl Serialize for SlotTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One day of the recurring template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDay", into = "RawDay")]
pub enum DaySchedule {
    Slots(Vec<SlotTime>),
    NoLessons,
}

impl DaySchedule {
    /// Sorted, de-duplicated slot list.
    pub fn slots(mut times: Vec<SlotTime>) -> Self {
        times.sort();
        times.dedup();
        DaySchedule::Slots(times)
    }

    pub fn times(&self) -> &[SlotTime] {
        match self {
            DaySchedule::Slots(times) => times,
            DaySchedule::NoLessons => &[],
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawDay {
    Slots(Vec<String>),
    Marker(String),
}

impl TryFrom<RawDay> for DaySchedule {
    type Error = String;

    fn try_from(raw: RawDay) -> Result<Self, Self::Error> {
        match raw {
            RawDay::Marker(text) if text.trim().eq_ignore_ascii_case(NO_LESSONS) => {
                Ok(DaySchedule::NoLessons)
            }
            RawDay::Marker(text) => Err(format!(
                "expected a list of times or \"{}\", got '{}'",
                NO_LESSONS, text
            )),
            RawDay::Slots(items) => items
                .iter()
                .map(|item| item.parse::<SlotTime>().map_err(|e| e.to_string()))
                .collect::<Result<Vec<_>, _>>()
                .map(DaySchedule::slots),
        }
    }
}

impl From<DaySchedule> for RawDay {
    fn from(day: DaySchedule) -> Self {
        match day {
            DaySchedule::Slots(times) => RawDay::Slots(times.iter().map(|t| t.to_string()).collect()),
            DaySchedule::NoLessons => RawDay::Marker(NO_LESSONS.to_string()),
        }
    }
}

/// Recurring weekly pattern of offered slots. A day missing from the map is unconfigured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleTemplate {
    days: BTreeMap<LessonDay, DaySchedule>,
}

impl Default for ScheduleTemplate {
    fn default() -> Self {
        let hours = |from: u32, to: u32, minute: u32| -> Vec<SlotTime> {
            (from..to).filter_map(|h| SlotTime::new(h, minute)).collect()
        };

        let mut days = BTreeMap::new();
        days.insert(LessonDay::Monday, DaySchedule::slots(hours(18, 21, 0)));
        days.insert(LessonDay::Tuesday, DaySchedule::slots(hours(19, 21, 30)));
        days.insert(LessonDay::Wednesday, DaySchedule::slots(Vec::new()));
        days.insert(LessonDay::Thursday, DaySchedule::slots(hours(18, 22, 15)));
        days.insert(LessonDay::Friday, DaySchedule::slots(Vec::new()));
        days.insert(LessonDay::Saturday, DaySchedule::slots(hours(16, 21, 30)));
        Self { days }
    }
}

impl ScheduleTemplate {
    pub fn empty() -> Self {
        Self { days: BTreeMap::new() }
    }

    pub fn day(&self, day: LessonDay) -> Option<&DaySchedule> {
        self.days.get(&day)
    }

    pub fn set_day(&mut self, day: LessonDay, schedule: DaySchedule) {
        self.days.insert(day, schedule);
    }

    pub fn times(&self, day: LessonDay) -> &[SlotTime] {
        self.days.get(&day).map(DaySchedule::times).unwrap_or(&[])
    }

    pub fn is_closed(&self, day: LessonDay) -> bool {
        matches!(self.days.get(&day), Some(DaySchedule::NoLessons))
    }

    pub fn offers(&self, day: LessonDay, time: SlotTime) -> bool {
        self.times(day).contains(&time)
    }

    /// Parses a full template as sent by the tutor. All six days must be present.
    pub fn parse_full(json: &str) -> Result<Self, AppError> {
        let raw: BTreeMap<String, DaySchedule> = serde_json::from_str(json)
            .map_err(|e| AppError::Validation(format!("Malformed schedule JSON: {}", e)))?;

        let mut days = BTreeMap::new();
        for (name, schedule) in raw {
            let day = LessonDay::parse(&name)
                .ok_or_else(|| AppError::Validation(format!("Unknown day '{}'", name)))?;
            days.insert(day, schedule);
        }

        if let Some(missing) = LessonDay::ALL.iter().find(|d| !days.contains_key(d)) {
            return Err(AppError::Validation(format!("Day '{}' is missing", missing)));
        }

        Ok(Self { days })
    }
}

/// The Monday–Saturday window weekday names currently resolve against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveWeek {
    monday: NaiveDate,
    offset: FixedOffset,
}

impl ActiveWeek {
    /// Most recent Monday on or before `now`; a Sunday rolls forward to the next Monday.
    pub fn containing(now: DateTime<FixedOffset>) -> Self {
        let today = now.date_naive();
        let monday = match today.weekday() {
            Weekday::Sun => today + Duration::days(1),
            other => today - Duration::days(other.num_days_from_monday() as i64),
        };
        Self {
            monday,
            offset: *now.offset(),
        }
    }

    pub fn monday(&self) -> NaiveDate {
        self.monday
    }

    pub fn date_of(&self, day: LessonDay) -> NaiveDate {
        self.monday + Duration::days(day.days_from_monday())
    }

    pub fn datetime_of(&self, day: LessonDay, time: SlotTime) -> DateTime<FixedOffset> {
        let local = self.date_of(day).and_time(time.time());
        let utc = local - Duration::seconds(self.offset.local_minus_utc() as i64);
        DateTime::from_naive_utc_and_offset(utc, self.offset)
    }

    /// The teaching day `dt` falls on, if it lies inside this week.
    pub fn day_of(&self, dt: &DateTime<FixedOffset>) -> Option<LessonDay> {
        let date = dt.with_timezone(&self.offset).date_naive();
        let delta = (date - self.monday).num_days();
        if !(0..6).contains(&delta) {
            return None;
        }
        LessonDay::from_weekday(date.weekday())
    }

    pub fn label(&self, day: LessonDay) -> String {
        format!("{} ({})", self.date_of(day).format("%d %B"), day)
    }
}
