// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Runtime-tunable key/value settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `"true"` blocks client bookings.
pub const PAUSE_RESERVATIONS: &str = "pause_reservations";
/// Minutes before start after which a cancellation no longer refunds.
pub const CANCEL_MINUTES_BEFORE: &str = "cancel_minutes_before";

pub const DEFAULT_CANCEL_MINUTES_BEFORE: i64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}
