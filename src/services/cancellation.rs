// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Booking cancellation and the refund window.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::db::Db;
use crate::error::{AppError, Result};
use crate::models::Booking;
use crate::services::ledger::Ledger;
use crate::services::settings::{self, SettingsStore};
use crate::time_utils::SharedClock;

#[derive(Debug, Clone)]
pub struct CancellationOutcome {
    pub booking: Booking,
    pub refunded: bool,
}

/// Whether cancelling at `now` still earns a refund: strictly before
/// `start - minutes_before`.
pub fn refund_window_open(start: DateTime<Utc>, now: DateTime<Utc>, minutes_before: i64) -> bool {
    now < start - Duration::minutes(minutes_before)
}

#[derive(Clone)]
pub struct CancellationPolicy {
    db: Db,
    clock: SharedClock,
    settings: Arc<dyn SettingsStore>,
}

impl CancellationPolicy {
    pub fn new(db: Db, clock: SharedClock, settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            db,
            clock,
            settings,
        }
    }

    /// Member cancels their own booking. Refunds one credit if the refund
    /// window is still open.
    pub async fn cancel_booking(&self, booking_id: Uuid, actor_id: Uuid) -> Result<CancellationOutcome> {
        let actor = self
            .db
            .get_user(actor_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {actor_id}")))?;
        if actor.is_trial {
            return Err(AppError::TrialRestricted);
        }

        // Someone else's booking looks exactly like a missing one.
        let booking = self
            .db
            .get_booking(booking_id)
            .await?
            .filter(|b| b.user_id == actor_id)
            .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

        let mut tx = self.db.begin().await?;
        tx.lock_class(booking.gym_class_id).await?;

        let booking = tx
            .get_booking(booking_id)
            .await?
            .filter(|b| b.user_id == actor_id)
            .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;
        if !booking.is_confirmed() {
            return Err(AppError::Conflict("Booking is not confirmed".to_string()));
        }

        let class = tx
            .get_class(booking.gym_class_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("class {}", booking.gym_class_id)))?;
        let now = self.clock.now();
        if class.has_started(now) {
            return Err(AppError::ClassStarted);
        }

        let minutes_before = settings::cancel_minutes_before(self.settings.as_ref()).await;
        let refunded = refund_window_open(class.start_time, now, minutes_before);

        let cancelled = booking.cancelled(now);
        tx.put_booking(cancelled.clone());
        if refunded {
            Ledger::stage(&mut tx, booking.user_id, 1, None, now);
        }
        tx.commit().await?;

        tracing::info!(
            %booking_id,
            user_id = %actor_id,
            class_id = %class.id,
            refunded,
            minutes_before,
            "Booking cancelled by member"
        );

        Ok(CancellationOutcome {
            booking: cancelled,
            refunded,
        })
    }

    /// Admin cancels any confirmed booking. Always refunds.
    pub async fn admin_cancel_booking(&self, booking_id: Uuid) -> Result<CancellationOutcome> {
        let booking = self
            .db
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

        let mut tx = self.db.begin().await?;
        tx.lock_class(booking.gym_class_id).await?;

        let booking = tx
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;
        if !booking.is_confirmed() {
            return Err(AppError::Conflict("Booking is not confirmed".to_string()));
        }

        let now = self.clock.now();
        let cancelled = booking.cancelled(now);
        tx.put_booking(cancelled.clone());
        Ledger::stage(&mut tx, booking.user_id, 1, None, now);
        tx.commit().await?;

        tracing::info!(%booking_id, user_id = %booking.user_id, "Booking cancelled by admin");

        Ok(CancellationOutcome {
            booking: cancelled,
            refunded: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refund_window_boundary() {
        let start = DateTime::parse_from_rfc3339("2026-05-04T18:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        assert!(refund_window_open(start, start - Duration::minutes(15), 10));
        assert!(!refund_window_open(start, start - Duration::minutes(10), 10));
        assert!(!refund_window_open(start, start - Duration::minutes(5), 10));
        assert!(refund_window_open(start, start - Duration::minutes(1), 0));
    }
}
