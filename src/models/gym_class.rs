// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Scheduled classes and instructors.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_CLASS_NAME: &str = "Clase";
pub const DEFAULT_MAX_SLOTS: u32 = 8;
pub const DEFAULT_DURATION_MINUTES: u32 = 60;
/// Number of weekly instances created for a recurring class.
pub const RECURRING_WEEKS: u32 = 12;

/// A single scheduled class instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GymClass {
    pub id: Uuid,
    pub name: String,
    pub instructor: String,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: u32,
    pub max_slots: u32,
    /// Shared by every instance of a recurring series.
    pub recurrence_group: Option<Uuid>,
    /// Set only on the first instance of a series.
    pub is_recurring: bool,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl GymClass {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled_at.is_some()
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Start time has been reached.
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now
    }
}

/// Someone who teaches classes. Classes refer to instructors by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instructor {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
}

impl Instructor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            is_active: true,
        }
    }
}
