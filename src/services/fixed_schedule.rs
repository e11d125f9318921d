// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fixed schedules: standing weekly reservations managed by admins.
//!
//! A rule books its owner into every class on the rule's weekday and local
//! time, both for classes that already exist (backfill at creation) and
//! for classes created later (auto-booking). These bookings never debit
//! credits. On a studio holiday the member is credited one slot instead.

use std::sync::Arc;

use chrono::NaiveTime;
use uuid::Uuid;

use crate::db::Db;
use crate::error::{AppError, Result};
use crate::models::fixed_schedule::slot_of;
use crate::models::{Booking, DayOfWeek, FixedSchedule, GymClass, User};
use crate::services::holidays::HolidayCalendar;
use crate::services::identity::{resolve_or_create_shadow, UserRef};
use crate::services::ledger::Ledger;
use crate::time_utils::{truncate_to_minute, SharedClock, StudioCalendar};

/// Result of creating (or reactivating) a rule.
#[derive(Debug, Clone)]
pub struct ScheduleCreated {
    pub schedule: FixedSchedule,
    pub user: User,
    pub user_created: bool,
    pub reactivated: bool,
    pub bookings_created: usize,
}

/// Result of cancelling a rule.
#[derive(Debug, Clone)]
pub struct ScheduleCancelled {
    pub schedule: FixedSchedule,
    pub bookings_cancelled: usize,
    pub credits_refunded: usize,
}

/// Result of auto-booking newly created classes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutoBookReport {
    pub bookings_created: usize,
    pub holiday_credits: usize,
}

#[derive(Clone)]
pub struct FixedScheduleEngine {
    db: Db,
    clock: SharedClock,
    calendar: StudioCalendar,
    holidays: Arc<HolidayCalendar>,
}

impl FixedScheduleEngine {
    pub fn new(
        db: Db,
        clock: SharedClock,
        calendar: StudioCalendar,
        holidays: Arc<HolidayCalendar>,
    ) -> Self {
        Self {
            db,
            clock,
            calendar,
            holidays,
        }
    }

    pub fn calendar(&self) -> &StudioCalendar {
        &self.calendar
    }

    /// Create a rule for the referenced member and book them into every
    /// matching upcoming class they hold no booking row for.
    ///
    /// A previously cancelled rule for the same slot is reactivated.
    pub async fn create(
        &self,
        reference: UserRef,
        day: DayOfWeek,
        start_time: NaiveTime,
    ) -> Result<ScheduleCreated> {
        let start_time = truncate_to_minute(start_time);
        let now = self.clock.now();
        let resolved = resolve_or_create_shadow(&self.db, reference, now).await?;
        let user = resolved.user;
        if user.is_deleted {
            return Err(AppError::BadRequest(format!(
                "user {} has been deleted",
                user.id
            )));
        }

        let mut tx = self.db.begin().await?;
        tx.lock_schedule_rules().await?;
        tx.lock_user(user.id).await?;

        let (schedule, reactivated) = match tx.find_fixed_schedule(user.id, day, start_time).await? {
            Some(existing) if existing.is_active() => {
                return Err(AppError::Conflict(format!(
                    "User already has a fixed schedule on {day:?} at {}",
                    start_time.format("%H:%M")
                )));
            }
            Some(existing) => (
                FixedSchedule {
                    cancelled_at: None,
                    ..existing
                },
                true,
            ),
            None => (FixedSchedule::new(user.id, day, start_time), false),
        };
        tx.put_fixed_schedule(schedule.clone());

        let matching: Vec<GymClass> = tx
            .upcoming_classes(now)
            .await?
            .into_iter()
            .filter(|c| slot_of(&self.calendar, c.start_time) == (day, start_time))
            .collect();
        tx.lock_classes(matching.iter().map(|c| c.id)).await?;

        let mut bookings_created = 0;
        for class in &matching {
            let still_open = tx
                .get_class(class.id)
                .await?
                .is_some_and(|c| !c.is_cancelled());
            if !still_open || tx.find_booking(user.id, class.id).await?.is_some() {
                continue;
            }
            tx.put_booking(Booking::confirmed(user.id, class.id, now));
            bookings_created += 1;
        }

        tx.commit().await?;

        tracing::info!(
            schedule_id = %schedule.id,
            user_id = %user.id,
            day = ?day,
            time = %start_time,
            reactivated,
            bookings_created,
            "Fixed schedule created"
        );

        Ok(ScheduleCreated {
            schedule,
            user,
            user_created: resolved.created,
            reactivated,
            bookings_created,
        })
    }

    /// Cancel a rule, releasing (and refunding) the owner's confirmed
    /// bookings in matching upcoming classes.
    pub async fn cancel(&self, schedule_id: Uuid) -> Result<ScheduleCancelled> {
        let existing = self
            .db
            .get_fixed_schedule(schedule_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("fixed schedule {schedule_id}")))?;

        let mut tx = self.db.begin().await?;
        tx.lock_schedule_rules().await?;
        tx.lock_user(existing.user_id).await?;

        // Re-read under the lock; a concurrent cancel may have won.
        let schedule = tx
            .get_fixed_schedule(schedule_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("fixed schedule {schedule_id}")))?;
        if !schedule.is_active() {
            return Err(AppError::Conflict(
                "Fixed schedule is already cancelled".to_string(),
            ));
        }

        let now = self.clock.now();
        let slot = (schedule.day_of_week, schedule.start_time);
        let matching: Vec<GymClass> = tx
            .upcoming_classes(now)
            .await?
            .into_iter()
            .filter(|c| slot_of(&self.calendar, c.start_time) == slot)
            .collect();
        tx.lock_classes(matching.iter().map(|c| c.id)).await?;

        let mut bookings_cancelled = 0;
        for class in &matching {
            let Some(booking) = tx.find_booking(schedule.user_id, class.id).await? else {
                continue;
            };
            if !booking.is_confirmed() {
                continue;
            }
            tx.put_booking(booking.cancelled(now));
            Ledger::stage(&mut tx, schedule.user_id, 1, None, now);
            bookings_cancelled += 1;
        }

        let cancelled = FixedSchedule {
            cancelled_at: Some(now),
            ..schedule
        };
        tx.put_fixed_schedule(cancelled.clone());
        tx.commit().await?;

        tracing::info!(
            schedule_id = %cancelled.id,
            user_id = %cancelled.user_id,
            bookings_cancelled,
            "Fixed schedule cancelled"
        );

        Ok(ScheduleCancelled {
            schedule: cancelled,
            bookings_cancelled,
            credits_refunded: bookings_cancelled,
        })
    }

    /// Book rule owners into newly created classes.
    ///
    /// For a class on a studio holiday, each matching owner gets one credit
    /// instead of a booking.
    pub async fn auto_book(&self, classes: &[GymClass]) -> Result<AutoBookReport> {
        if classes.is_empty() {
            return Ok(AutoBookReport::default());
        }

        let mut tx = self.db.begin().await?;
        tx.lock_schedule_rules().await?;
        tx.lock_classes(classes.iter().map(|c| c.id)).await?;

        let now = self.clock.now();
        let mut report = AutoBookReport::default();

        for class in classes {
            let Some(class) = tx.get_class(class.id).await? else {
                continue;
            };
            if class.is_cancelled() {
                continue;
            }

            let (day, time) = slot_of(&self.calendar, class.start_time);
            let schedules = tx.active_schedules_for_slot(day, time).await?;
            if schedules.is_empty() {
                continue;
            }

            let holiday = self
                .holidays
                .is_holiday(self.calendar.local_date(class.start_time));

            for schedule in schedules {
                if holiday {
                    Ledger::stage(&mut tx, schedule.user_id, 1, None, now);
                    report.holiday_credits += 1;
                } else if tx
                    .find_booking(schedule.user_id, class.id)
                    .await?
                    .is_none()
                {
                    tx.put_booking(Booking::confirmed(schedule.user_id, class.id, now));
                    report.bookings_created += 1;
                }
            }

            if holiday {
                tracing::info!(class_id = %class.id, "Class falls on a holiday; credited fixed members");
            }
        }

        tx.commit().await?;

        tracing::info!(
            classes = classes.len(),
            bookings_created = report.bookings_created,
            holiday_credits = report.holiday_credits,
            "Auto-booking complete"
        );
        Ok(report)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<FixedSchedule>> {
        self.db.fixed_schedules_for_user(user_id).await
    }
}
