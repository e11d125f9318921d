// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Class catalog: creating, editing, cancelling and listing classes, plus
//! the instructor roster.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::db::Db;
use crate::error::{AppError, Result};
use crate::models::gym_class::{
    DEFAULT_CLASS_NAME, DEFAULT_DURATION_MINUTES, DEFAULT_MAX_SLOTS, RECURRING_WEEKS,
};
use crate::models::{Booking, BookingStatus, GymClass, Instructor};
use crate::services::fixed_schedule::{AutoBookReport, FixedScheduleEngine};
use crate::services::ledger::Ledger;
use crate::services::notify::Notifier;
use crate::time_utils::SharedClock;

/// Fields for a new class.
#[derive(Debug, Clone)]
pub struct NewClass {
    pub name: Option<String>,
    pub instructor: String,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: Option<u32>,
    pub max_slots: Option<u32>,
    /// Create weekly instances for twelve weeks.
    pub is_recurring: bool,
}

/// Partial update of a class. `None` leaves a field unchanged.
///
/// The start time is fixed once a class exists; bookings and fixed-schedule
/// matches depend on it.
#[derive(Debug, Clone, Default)]
pub struct ClassUpdate {
    pub name: Option<String>,
    pub instructor: Option<String>,
    pub duration_minutes: Option<u32>,
    pub max_slots: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ClassesCreated {
    pub classes: Vec<GymClass>,
    pub auto_booking: AutoBookReport,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassesCancelled {
    pub classes_cancelled: usize,
    pub bookings_cancelled: usize,
    pub credits_refunded: usize,
}

/// A class with its occupancy, as seen by one viewer.
#[derive(Debug, Clone)]
pub struct ClassSummary {
    pub class: GymClass,
    pub confirmed: usize,
    pub available: usize,
    pub viewer_booking: Option<Booking>,
}

/// One row of a class roster.
#[derive(Debug, Clone)]
pub struct Attendee {
    pub booking: Booking,
    pub full_name: Option<String>,
    pub dni: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClassDetail {
    pub class: GymClass,
    pub attendees: Vec<Attendee>,
}

#[derive(Clone)]
pub struct Catalog {
    db: Db,
    clock: SharedClock,
    schedules: FixedScheduleEngine,
    notifier: Arc<dyn Notifier>,
}

impl Catalog {
    pub fn new(
        db: Db,
        clock: SharedClock,
        schedules: FixedScheduleEngine,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            db,
            clock,
            schedules,
            notifier,
        }
    }

    // ─── Classes ─────────────────────────────────────────────────

    /// Create one class, or twelve weekly instances of a recurring class,
    /// then auto-book fixed-schedule members into them. The start time must
    /// lie in the future.
    pub async fn create_class(&self, new: NewClass) -> Result<ClassesCreated> {
        let instructor = new.instructor.trim().to_string();
        if instructor.is_empty() {
            return Err(AppError::BadRequest("Instructor is required".to_string()));
        }
        let max_slots = new.max_slots.unwrap_or(DEFAULT_MAX_SLOTS);
        let duration_minutes = new.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
        validate_shape(max_slots, duration_minutes)?;
        let name = new
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_CLASS_NAME.to_string());

        let now = self.clock.now();
        if new.start_time <= now {
            return Err(AppError::BadRequest(
                "Class start time must be in the future".to_string(),
            ));
        }

        let mut tx = self.db.begin().await?;

        match tx.find_instructor_by_name(&instructor).await? {
            Some(existing) if existing.is_active => {}
            Some(inactive) => {
                tracing::info!(instructor = %instructor, "Reactivating instructor");
                tx.put_instructor(Instructor {
                    is_active: true,
                    ..inactive
                });
            }
            None => {
                tracing::info!(instructor = %instructor, "Creating instructor");
                tx.put_instructor(Instructor::new(instructor.clone()));
            }
        }

        let weeks = if new.is_recurring { RECURRING_WEEKS } else { 1 };
        let group = new.is_recurring.then(Uuid::new_v4);
        let classes: Vec<GymClass> = (0..weeks)
            .map(|week| GymClass {
                id: Uuid::new_v4(),
                name: name.clone(),
                instructor: instructor.clone(),
                start_time: new.start_time + Duration::weeks(i64::from(week)),
                duration_minutes,
                max_slots,
                recurrence_group: group,
                is_recurring: new.is_recurring && week == 0,
                cancelled_at: None,
                created_at: now,
            })
            .collect();
        for class in &classes {
            tx.insert_class(class.clone());
        }
        tx.commit().await?;

        tracing::info!(
            count = classes.len(),
            recurrence_group = ?group,
            instructor = %instructor,
            "Classes created"
        );

        let auto_booking = self.schedules.auto_book(&classes).await?;

        Ok(ClassesCreated {
            classes,
            auto_booking,
        })
    }

    /// Edit class fields. A new instructor must exist and be active.
    pub async fn update_class(&self, class_id: Uuid, update: ClassUpdate) -> Result<GymClass> {
        let mut tx = self.db.begin().await?;
        tx.lock_class(class_id).await?;
        let mut class = tx
            .get_class(class_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("class {class_id}")))?;

        if let Some(instructor) = update.instructor {
            let instructor = instructor.trim().to_string();
            let active = tx
                .find_instructor_by_name(&instructor)
                .await?
                .is_some_and(|i| i.is_active);
            if !active {
                return Err(AppError::BadRequest(format!(
                    "Instructor '{instructor}' does not exist or is inactive"
                )));
            }
            class.instructor = instructor;
        }
        if let Some(name) = update.name.map(|n| n.trim().to_string()) {
            if name.is_empty() {
                return Err(AppError::BadRequest("Class name must not be empty".to_string()));
            }
            class.name = name;
        }
        if let Some(duration) = update.duration_minutes {
            class.duration_minutes = duration;
        }
        if let Some(max_slots) = update.max_slots {
            let confirmed = tx.confirmed_count(class_id).await?;
            if (max_slots as usize) < confirmed {
                return Err(AppError::Conflict(format!(
                    "Class already has {confirmed} confirmed bookings"
                )));
            }
            class.max_slots = max_slots;
        }
        validate_shape(class.max_slots, class.duration_minutes)?;

        tx.update_class(class.clone());
        tx.commit().await?;

        tracing::info!(%class_id, "Class updated");
        Ok(class)
    }

    /// Cancel a class, or with `cascade_to_series` every upcoming instance
    /// of its series.
    ///
    /// Confirmed bookings are cancelled. Members are refunded only for a
    /// single-class cancellation.
    pub async fn cancel_class(&self, class_id: Uuid, cascade_to_series: bool) -> Result<ClassesCancelled> {
        let class = self
            .db
            .get_class(class_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("class {class_id}")))?;
        if class.is_cancelled() {
            return Err(AppError::Conflict("Class is already cancelled".to_string()));
        }

        let now = self.clock.now();
        let targets: Vec<Uuid> = match (cascade_to_series, class.recurrence_group) {
            (true, Some(group)) => self
                .db
                .series_classes(group)
                .await?
                .into_iter()
                .filter(|c| c.start_time > now && !c.is_cancelled())
                .map(|c| c.id)
                .collect(),
            _ => vec![class.id],
        };

        let mut tx = self.db.begin().await?;
        tx.lock_classes(targets.iter().copied()).await?;

        let refund = !cascade_to_series;
        let mut outcome = ClassesCancelled::default();
        let mut notified_users = HashSet::new();

        for id in &targets {
            let Some(target) = tx.get_class(*id).await? else {
                continue;
            };
            if target.is_cancelled() {
                if !cascade_to_series {
                    return Err(AppError::Conflict("Class is already cancelled".to_string()));
                }
                continue;
            }

            tx.update_class(GymClass {
                cancelled_at: Some(now),
                ..target
            });
            outcome.classes_cancelled += 1;

            for booking in tx.bookings_for_class(*id).await? {
                if booking.status != BookingStatus::Confirmed {
                    continue;
                }
                tx.put_booking(booking.cancelled(now));
                outcome.bookings_cancelled += 1;
                if refund {
                    Ledger::stage(&mut tx, booking.user_id, 1, None, now);
                    outcome.credits_refunded += 1;
                }
                notified_users.insert(booking.user_id);
            }
        }

        tx.commit().await?;

        tracing::info!(
            %class_id,
            cascade_to_series,
            classes_cancelled = outcome.classes_cancelled,
            bookings_cancelled = outcome.bookings_cancelled,
            credits_refunded = outcome.credits_refunded,
            "Class cancelled"
        );

        self.notify_cancellation(&class, notified_users, cascade_to_series)
            .await;
        Ok(outcome)
    }

    async fn notify_cancellation(&self, class: &GymClass, users: HashSet<Uuid>, series: bool) {
        if users.is_empty() {
            return;
        }
        let ids: Vec<Uuid> = users.into_iter().collect();
        let tokens: Vec<String> = match self.db.get_users(&ids).await {
            Ok(users) => users.into_iter().filter_map(|u| u.fcm_token).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping cancellation notices");
                return;
            }
        };

        let calendar = self.schedules.calendar();
        let when = calendar.local(class.start_time).format("%d/%m %H:%M");
        let body = if series {
            format!("The upcoming '{}' classes have been cancelled.", class.name)
        } else {
            format!(
                "'{}' on {when} has been cancelled. Your credit was returned.",
                class.name
            )
        };
        self.notifier.notify(tokens, "Class cancelled", &body);
    }

    /// Classes starting in `[from, to)`, with occupancy and the viewer's
    /// own booking.
    pub async fn list_classes(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        viewer: Option<Uuid>,
        include_cancelled: bool,
    ) -> Result<Vec<ClassSummary>> {
        let classes = self.db.classes_between(from, to, include_cancelled).await?;
        let mut summaries = Vec::with_capacity(classes.len());
        for class in classes {
            let confirmed = self.db.confirmed_count(class.id).await?;
            let viewer_booking = match viewer {
                Some(user_id) => self.db.find_booking(user_id, class.id).await?,
                None => None,
            };
            summaries.push(ClassSummary {
                available: (class.max_slots as usize).saturating_sub(confirmed),
                confirmed,
                viewer_booking,
                class,
            });
        }
        Ok(summaries)
    }

    /// A class and its confirmed attendees.
    pub async fn class_detail(&self, class_id: Uuid) -> Result<ClassDetail> {
        let class = self
            .db
            .get_class(class_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("class {class_id}")))?;

        let bookings: Vec<Booking> = self
            .db
            .bookings_for_class(class_id)
            .await?
            .into_iter()
            .filter(Booking::is_confirmed)
            .collect();
        let ids: Vec<Uuid> = bookings.iter().map(|b| b.user_id).collect();
        let users = self.db.get_users(&ids).await?;

        let attendees = bookings
            .into_iter()
            .map(|booking| {
                let user = users.iter().find(|u| u.id == booking.user_id);
                Attendee {
                    full_name: user.and_then(|u| u.full_name.clone()),
                    dni: user.and_then(|u| u.dni.clone()),
                    booking,
                }
            })
            .collect();

        Ok(ClassDetail { class, attendees })
    }

    // ─── Instructors ─────────────────────────────────────────────

    pub async fn list_instructors(&self, include_inactive: bool) -> Result<Vec<Instructor>> {
        self.db.list_instructors(include_inactive).await
    }

    pub async fn create_instructor(&self, name: &str) -> Result<Instructor> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("Instructor name is required".to_string()));
        }
        if self.db.find_instructor_by_name(name).await?.is_some() {
            return Err(AppError::Conflict(format!("Instructor '{name}' already exists")));
        }

        let instructor = Instructor::new(name);
        let mut tx = self.db.begin().await?;
        tx.put_instructor(instructor.clone());
        tx.commit().await?;

        tracing::info!(instructor_id = %instructor.id, name, "Instructor created");
        Ok(instructor)
    }

    pub async fn set_instructor_active(&self, id: Uuid, is_active: bool) -> Result<Instructor> {
        let instructor = self
            .db
            .get_instructor(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("instructor {id}")))?;

        let updated = Instructor {
            is_active,
            ..instructor
        };
        let mut tx = self.db.begin().await?;
        tx.put_instructor(updated.clone());
        tx.commit().await?;

        tracing::info!(instructor_id = %id, is_active, "Instructor updated");
        Ok(updated)
    }

    pub async fn delete_instructor(&self, id: Uuid) -> Result<()> {
        if self.db.get_instructor(id).await?.is_none() {
            return Err(AppError::NotFound(format!("instructor {id}")));
        }
        let mut tx = self.db.begin().await?;
        tx.delete_instructor(id);
        tx.commit().await?;

        tracing::info!(instructor_id = %id, "Instructor deleted");
        Ok(())
    }
}

fn validate_shape(max_slots: u32, duration_minutes: u32) -> Result<()> {
    if max_slots == 0 {
        return Err(AppError::BadRequest("max_slots must be at least 1".to_string()));
    }
    if duration_minutes == 0 {
        return Err(AppError::BadRequest(
            "duration_minutes must be at least 1".to_string(),
        ));
    }
    Ok(())
}
