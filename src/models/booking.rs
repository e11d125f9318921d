// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reservations of a slot in a class.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "confirmed" => Some(BookingStatus::Confirmed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }
}

/// At most one booking row exists per (user, class); cancelled rows are
/// reactivated rather than duplicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub gym_class_id: Uuid,
    pub status: BookingStatus,
    pub assisted: bool,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn confirmed(user_id: Uuid, gym_class_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            gym_class_id,
            status: BookingStatus::Confirmed,
            assisted: false,
            created_at: now,
            cancelled_at: None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }

    /// Copy of this booking marked cancelled at `now`.
    pub fn cancelled(&self, now: DateTime<Utc>) -> Self {
        Self {
            status: BookingStatus::Cancelled,
            cancelled_at: Some(now),
            ..self.clone()
        }
    }

    /// Copy of this booking back in the confirmed state.
    pub fn reactivated(&self) -> Self {
        Self {
            status: BookingStatus::Confirmed,
            cancelled_at: None,
            ..self.clone()
        }
    }
}
