// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Folding a shadow account into the federated account that claims its DNI.
//!
//! Everything happens in one transaction holding both user locks and the
//! locks of every class the shadow booked:
//!
//! 1. bookings move to the target; where the target already has a row for
//!    the same class, the target's row wins and the shadow's is dropped;
//! 2. every ledger entry moves to the target;
//! 3. fixed schedules move; where the target already has an active rule for
//!    the slot, the shadow's rule is dropped;
//! 4. trial status, medical certificate and name carry over;
//! 5. the shadow row is deleted, and only then does the target take the DNI.
//!
//! If any step fails the whole merge is rolled back.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::db::Db;
use crate::error::{AppError, Result};
use crate::models::{Booking, FixedSchedule, User};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub bookings_moved: usize,
    pub bookings_dropped: usize,
    pub credits_moved: usize,
    pub schedules_moved: usize,
    pub schedules_dropped: usize,
}

/// Merge `shadow_id` into `target_id` and give the target `dni`.
///
/// `edit` applies the caller's other profile changes to the target inside
/// the same transaction. Returns the updated target.
pub async fn merge_shadow_into(
    db: &Db,
    shadow_id: Uuid,
    target_id: Uuid,
    dni: &str,
    edit: impl FnOnce(&mut User),
) -> Result<(User, MergeReport)> {
    if shadow_id == target_id {
        return Err(AppError::BadRequest("Cannot merge a user into itself".to_string()));
    }

    let mut tx = db.begin().await?;
    tx.lock_schedule_rules().await?;
    tx.lock_users([shadow_id, target_id]).await?;

    let shadow = tx
        .get_user(shadow_id)
        .await?
        .filter(|u| u.is_shadow() && u.dni.as_deref() == Some(dni))
        .ok_or_else(|| AppError::Conflict("DNI holder changed; retry".to_string()))?;
    let mut target = tx
        .get_user(target_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {target_id}")))?;

    let shadow_bookings = tx.bookings_for_user(shadow_id).await?;
    tx.lock_classes(shadow_bookings.iter().map(|b| b.gym_class_id))
        .await?;

    let mut report = MergeReport::default();

    // 1. Bookings
    let target_classes: HashSet<Uuid> = tx
        .bookings_for_user(target_id)
        .await?
        .into_iter()
        .map(|b| b.gym_class_id)
        .collect();
    for booking in shadow_bookings {
        if target_classes.contains(&booking.gym_class_id) {
            tx.delete_booking(booking.id);
            report.bookings_dropped += 1;
        } else {
            tx.put_booking(Booking {
                user_id: target_id,
                ..booking
            });
            report.bookings_moved += 1;
        }
    }

    // 2. Credits
    for credit in tx.credits_for_user(shadow_id).await? {
        tx.reassign_credit(credit.id, target_id);
        report.credits_moved += 1;
    }

    // 3. Fixed schedules
    let target_rules: HashMap<_, FixedSchedule> = tx
        .fixed_schedules_for_user(target_id)
        .await?
        .into_iter()
        .map(|f| ((f.day_of_week, f.start_time), f))
        .collect();
    for rule in tx.fixed_schedules_for_user(shadow_id).await? {
        match target_rules.get(&(rule.day_of_week, rule.start_time)) {
            None => {
                tx.put_fixed_schedule(FixedSchedule {
                    user_id: target_id,
                    ..rule
                });
                report.schedules_moved += 1;
            }
            Some(existing) if !existing.is_active() && rule.is_active() => {
                // Keep the target's row, live again.
                tx.delete_fixed_schedule(rule.id);
                tx.put_fixed_schedule(FixedSchedule {
                    cancelled_at: None,
                    ..existing.clone()
                });
                report.schedules_moved += 1;
            }
            Some(_) => {
                tx.delete_fixed_schedule(rule.id);
                report.schedules_dropped += 1;
            }
        }
    }

    // 4. Carry-over
    target.is_trial |= shadow.is_trial;
    if target.medical_certificate_url.is_none() {
        target.medical_certificate_url = shadow.medical_certificate_url.clone();
    }
    if target.full_name.is_none() {
        target.full_name = shadow.full_name.clone();
    }
    if target.phone.is_none() {
        target.phone = shadow.phone.clone();
    }
    edit(&mut target);

    // 5. Shadow goes, then the DNI moves.
    tx.delete_user(shadow_id);
    target.dni = Some(dni.to_string());
    tx.update_user(target.clone());

    tx.commit().await?;

    tracing::info!(
        %shadow_id,
        %target_id,
        bookings_moved = report.bookings_moved,
        bookings_dropped = report.bookings_dropped,
        credits_moved = report.credits_moved,
        schedules_moved = report.schedules_moved,
        schedules_dropped = report.schedules_dropped,
        "Merged shadow account"
    );

    Ok((target, report))
}
