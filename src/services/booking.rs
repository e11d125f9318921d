// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Slot allocation: member self-booking and admin manual booking.
//!
//! Capacity is enforced under the class lock, so two members racing for
//! the last slot cannot both be confirmed. Both paths also hold the
//! member's user lock, which serializes ledger debits and keeps a booking
//! from landing on a shadow account mid-merge.
//!
//! The capacity check, the booking upsert and the ledger debit all run in
//! one database transaction; on PostgreSQL the class lock is a row lock on
//! `gym_classes`, so the guarantee holds across server replicas.

use std::sync::Arc;

use uuid::Uuid;

use crate::db::Db;
use crate::error::{AppError, Result};
use crate::models::credit::{display_balance, raw_balance};
use crate::models::{Booking, GymClass, User};
use crate::services::identity::{resolve_or_create_shadow, UserRef};
use crate::services::ledger::Ledger;
use crate::services::settings::{self, SettingsStore};
use crate::time_utils::SharedClock;

/// A confirmed booking and how it came to be.
#[derive(Debug, Clone)]
pub struct BookingOutcome {
    pub booking: Booking,
    pub class: GymClass,
    /// An earlier cancelled row was reused.
    pub reactivated: bool,
    /// Display balance after the debit.
    pub remaining_credits: i64,
}

/// A booking placed by an admin on someone's behalf.
#[derive(Debug, Clone)]
pub struct ManualBookingOutcome {
    pub booking: Booking,
    pub user: User,
    pub user_created: bool,
    pub reactivated: bool,
}

#[derive(Clone)]
pub struct SlotAllocator {
    db: Db,
    clock: SharedClock,
    settings: Arc<dyn SettingsStore>,
}

impl SlotAllocator {
    pub fn new(db: Db, clock: SharedClock, settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            db,
            clock,
            settings,
        }
    }

    /// Reserve a slot for a member, debiting one credit.
    ///
    /// Rejections, first match wins: trial account, reservations paused,
    /// class missing or cancelled, class started, already booked, no
    /// credits, class full.
    pub async fn book(&self, user_id: Uuid, class_id: Uuid) -> Result<BookingOutcome> {
        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {user_id}")))?;
        if !user.is_active() {
            return Err(AppError::Forbidden("Account is disabled".to_string()));
        }
        if user.is_trial {
            return Err(AppError::TrialRestricted);
        }
        if settings::reservations_paused(self.settings.as_ref()).await {
            return Err(AppError::ReservationsPaused);
        }

        let mut tx = self.db.begin().await?;
        tx.lock_user(user_id).await?;
        tx.lock_class(class_id).await?;

        let now = self.clock.now();
        let class = tx
            .get_class(class_id)
            .await?
            .filter(|c| !c.is_cancelled())
            .ok_or_else(|| AppError::NotFound(format!("class {class_id}")))?;
        if class.has_started(now) {
            return Err(AppError::ClassStarted);
        }

        let existing = tx.find_booking(user_id, class_id).await?;
        if existing.as_ref().is_some_and(Booking::is_confirmed) {
            return Err(AppError::Conflict("You already booked this class".to_string()));
        }

        let entries = tx.credits_for_user(user_id).await?;
        let balance = raw_balance(&entries, now);
        if balance < 1 {
            return Err(AppError::InsufficientCredits);
        }

        let confirmed = tx.confirmed_count(class_id).await?;
        if confirmed >= class.max_slots as usize {
            return Err(AppError::ClassFull);
        }

        let reactivated = existing.is_some();
        let booking = match existing {
            Some(cancelled) => cancelled.reactivated(),
            None => Booking::confirmed(user_id, class_id, now),
        };
        tx.put_booking(booking.clone());
        Ledger::stage(&mut tx, user_id, -1, None, now);
        tx.commit().await?;

        tracing::info!(
            %user_id,
            %class_id,
            booking_id = %booking.id,
            reactivated,
            slots_taken = confirmed + 1,
            max_slots = class.max_slots,
            "Class booked"
        );

        Ok(BookingOutcome {
            booking,
            class,
            reactivated,
            remaining_credits: display_balance(balance - 1),
        })
    }

    /// Book a member into a class without touching their credits.
    ///
    /// Skips the trial, pause and credit checks; still rejects duplicates
    /// and full classes. Started classes are allowed so admins can record
    /// attendance after the fact.
    pub async fn manual_book(
        &self,
        reference: UserRef,
        class_id: Uuid,
    ) -> Result<ManualBookingOutcome> {
        let now = self.clock.now();
        let resolved = resolve_or_create_shadow(&self.db, reference, now).await?;
        let user_id = resolved.user.id;

        let mut tx = self.db.begin().await?;
        tx.lock_user(user_id).await?;
        tx.lock_class(class_id).await?;

        // Re-read under the lock; the account may have been merged away.
        let user = tx
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {user_id}")))?;
        if user.is_deleted {
            return Err(AppError::BadRequest(format!(
                "user {} has been deleted",
                user.id
            )));
        }

        let class = tx
            .get_class(class_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("class {class_id}")))?;
        if class.is_cancelled() {
            return Err(AppError::Conflict("Class is cancelled".to_string()));
        }

        let existing = tx.find_booking(user.id, class_id).await?;
        if existing.as_ref().is_some_and(Booking::is_confirmed) {
            return Err(AppError::Conflict(
                "User already has a booking for this class".to_string(),
            ));
        }
        if tx.confirmed_count(class_id).await? >= class.max_slots as usize {
            return Err(AppError::ClassFull);
        }

        let reactivated = existing.is_some();
        let booking = match existing {
            Some(cancelled) => cancelled.reactivated(),
            None => Booking::confirmed(user.id, class_id, now),
        };
        tx.put_booking(booking.clone());
        tx.commit().await?;

        tracing::info!(
            user_id = %user.id,
            %class_id,
            booking_id = %booking.id,
            user_created = resolved.created,
            reactivated,
            "Manual booking created"
        );

        Ok(ManualBookingOutcome {
            booking,
            user,
            user_created: resolved.created,
            reactivated,
        })
    }
}
