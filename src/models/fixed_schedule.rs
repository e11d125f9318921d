// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Standing weekly reservations.

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::time_utils::StudioCalendar;

/// Day of the week on the studio's calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub fn as_str(self) -> &'static str {
        match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "monday" => Some(DayOfWeek::Monday),
            "tuesday" => Some(DayOfWeek::Tuesday),
            "wednesday" => Some(DayOfWeek::Wednesday),
            "thursday" => Some(DayOfWeek::Thursday),
            "friday" => Some(DayOfWeek::Friday),
            "saturday" => Some(DayOfWeek::Saturday),
            "sunday" => Some(DayOfWeek::Sunday),
            _ => None,
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

/// "Reserve me into every class on this weekday at this time."
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedSchedule {
    pub id: Uuid,
    pub user_id: Uuid,
    pub day_of_week: DayOfWeek,
    /// Local start time, minute precision.
    pub start_time: NaiveTime,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl FixedSchedule {
    pub fn new(user_id: Uuid, day_of_week: DayOfWeek, start_time: NaiveTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            day_of_week,
            start_time,
            cancelled_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancelled_at.is_none()
    }
}

/// The (weekday, local time) slot a class start falls into.
pub fn slot_of(calendar: &StudioCalendar, start: DateTime<Utc>) -> (DayOfWeek, NaiveTime) {
    (calendar.weekday(start).into(), calendar.time_of_day(start))
}
