// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Table storage with constraint enforcement.
//!
//! Writes are applied one at a time. Each write checks its constraints
//! against the state left by the writes before it, so a transaction may
//! move children off a row and then delete that row. If any write fails,
//! everything applied so far is undone in reverse order.

use std::collections::HashMap;

use uuid::Uuid;

use super::constraints as cs;
use super::table_names as names;
use super::transaction::Write;
use super::ConstraintViolation;
use crate::models::{Booking, Credit, FixedSchedule, GymClass, Instructor, Setting, User};

/// Prior state of one row, restored on rollback.
enum Undo {
    User(Uuid, Option<User>),
    Instructor(Uuid, Option<Instructor>),
    Class(Uuid, Option<GymClass>),
    Booking(Uuid, Option<Booking>),
    Credit(Uuid, Option<Credit>),
    FixedSchedule(Uuid, Option<FixedSchedule>),
    Setting(String, Option<Setting>),
}

#[derive(Debug, Default, Clone)]
pub(crate) struct Tables {
    pub users: HashMap<Uuid, User>,
    pub instructors: HashMap<Uuid, Instructor>,
    pub classes: HashMap<Uuid, GymClass>,
    pub bookings: HashMap<Uuid, Booking>,
    pub credits: HashMap<Uuid, Credit>,
    pub fixed_schedules: HashMap<Uuid, FixedSchedule>,
    pub settings: HashMap<String, Setting>,
}

impl Tables {
    /// Apply all writes or none of them.
    pub fn apply_all(&mut self, writes: Vec<Write>) -> Result<(), ConstraintViolation> {
        let mut undo = Vec::with_capacity(writes.len());
        for write in writes {
            if let Err(violation) = self.apply(write, &mut undo) {
                self.rollback(undo);
                return Err(violation);
            }
        }
        Ok(())
    }

    fn apply(&mut self, write: Write, undo: &mut Vec<Undo>) -> Result<(), ConstraintViolation> {
        match write {
            Write::InsertUser(user) => {
                if self.users.contains_key(&user.id) {
                    return Err(ConstraintViolation::DuplicateKey {
                        table: names::USERS,
                    });
                }
                self.check_user_unique(&user)?;
                undo.push(Undo::User(user.id, None));
                self.users.insert(user.id, user);
            }
            Write::UpdateUser(user) => {
                if !self.users.contains_key(&user.id) {
                    return Err(ConstraintViolation::MissingRow {
                        table: names::USERS,
                    });
                }
                self.check_user_unique(&user)?;
                let prev = self.users.insert(user.id, user.clone());
                undo.push(Undo::User(user.id, prev));
            }
            Write::DeleteUser(id) => {
                if self.bookings.values().any(|b| b.user_id == id) {
                    return Err(ConstraintViolation::foreign_key(cs::FK_BOOKINGS_USER));
                }
                if self.credits.values().any(|c| c.user_id == id) {
                    return Err(ConstraintViolation::foreign_key(cs::FK_CREDITS_USER));
                }
                if self.fixed_schedules.values().any(|f| f.user_id == id) {
                    return Err(ConstraintViolation::foreign_key(cs::FK_FIXED_SCHEDULES_USER));
                }
                let prev = self.users.remove(&id).ok_or(ConstraintViolation::MissingRow {
                    table: names::USERS,
                })?;
                undo.push(Undo::User(id, Some(prev)));
            }
            Write::PutInstructor(instructor) => {
                if self
                    .instructors
                    .values()
                    .any(|i| i.id != instructor.id && i.name == instructor.name)
                {
                    return Err(ConstraintViolation::unique(cs::UQ_INSTRUCTOR_NAME));
                }
                let prev = self.instructors.insert(instructor.id, instructor.clone());
                undo.push(Undo::Instructor(instructor.id, prev));
            }
            Write::DeleteInstructor(id) => {
                let prev = self
                    .instructors
                    .remove(&id)
                    .ok_or(ConstraintViolation::MissingRow {
                        table: names::INSTRUCTORS,
                    })?;
                undo.push(Undo::Instructor(id, Some(prev)));
            }
            Write::InsertClass(class) => {
                if self.classes.contains_key(&class.id) {
                    return Err(ConstraintViolation::DuplicateKey {
                        table: names::GYM_CLASSES,
                    });
                }
                undo.push(Undo::Class(class.id, None));
                self.classes.insert(class.id, class);
            }
            Write::UpdateClass(class) => {
                if !self.classes.contains_key(&class.id) {
                    return Err(ConstraintViolation::MissingRow {
                        table: names::GYM_CLASSES,
                    });
                }
                let prev = self.classes.insert(class.id, class.clone());
                undo.push(Undo::Class(class.id, prev));
            }
            Write::PutBooking(booking) => {
                if !self.users.contains_key(&booking.user_id) {
                    return Err(ConstraintViolation::foreign_key(cs::FK_BOOKINGS_USER));
                }
                if !self.classes.contains_key(&booking.gym_class_id) {
                    return Err(ConstraintViolation::foreign_key(cs::FK_BOOKINGS_CLASS));
                }
                if self.bookings.values().any(|b| {
                    b.id != booking.id
                        && b.user_id == booking.user_id
                        && b.gym_class_id == booking.gym_class_id
                }) {
                    return Err(ConstraintViolation::unique(cs::UQ_BOOKING_USER_CLASS));
                }
                let prev = self.bookings.insert(booking.id, booking.clone());
                undo.push(Undo::Booking(booking.id, prev));
            }
            Write::DeleteBooking(id) => {
                let prev = self
                    .bookings
                    .remove(&id)
                    .ok_or(ConstraintViolation::MissingRow {
                        table: names::BOOKINGS,
                    })?;
                undo.push(Undo::Booking(id, Some(prev)));
            }
            Write::InsertCredit(credit) => {
                if self.credits.contains_key(&credit.id) {
                    return Err(ConstraintViolation::DuplicateKey {
                        table: names::CREDITS,
                    });
                }
                if !self.users.contains_key(&credit.user_id) {
                    return Err(ConstraintViolation::foreign_key(cs::FK_CREDITS_USER));
                }
                undo.push(Undo::Credit(credit.id, None));
                self.credits.insert(credit.id, credit);
            }
            Write::ReassignCredit { id, user_id } => {
                if !self.users.contains_key(&user_id) {
                    return Err(ConstraintViolation::foreign_key(cs::FK_CREDITS_USER));
                }
                let entry = self
                    .credits
                    .get_mut(&id)
                    .ok_or(ConstraintViolation::MissingRow {
                        table: names::CREDITS,
                    })?;
                let prev = entry.clone();
                entry.user_id = user_id;
                undo.push(Undo::Credit(id, Some(prev)));
            }
            Write::PutFixedSchedule(schedule) => {
                if !self.users.contains_key(&schedule.user_id) {
                    return Err(ConstraintViolation::foreign_key(cs::FK_FIXED_SCHEDULES_USER));
                }
                if self.fixed_schedules.values().any(|f| {
                    f.id != schedule.id
                        && f.user_id == schedule.user_id
                        && f.day_of_week == schedule.day_of_week
                        && f.start_time == schedule.start_time
                }) {
                    return Err(ConstraintViolation::unique(cs::UQ_FIXED_SCHEDULE_USER_SLOT));
                }
                let prev = self
                    .fixed_schedules
                    .insert(schedule.id, schedule.clone());
                undo.push(Undo::FixedSchedule(schedule.id, prev));
            }
            Write::DeleteFixedSchedule(id) => {
                let prev =
                    self.fixed_schedules
                        .remove(&id)
                        .ok_or(ConstraintViolation::MissingRow {
                            table: names::FIXED_SCHEDULES,
                        })?;
                undo.push(Undo::FixedSchedule(id, Some(prev)));
            }
            Write::PutSetting(setting) => {
                let key = setting.key.clone();
                let prev = self.settings.insert(key.clone(), setting);
                undo.push(Undo::Setting(key, prev));
            }
        }
        Ok(())
    }

    fn check_user_unique(&self, user: &User) -> Result<(), ConstraintViolation> {
        for other in self.users.values().filter(|u| u.id != user.id) {
            if other.email == user.email {
                return Err(ConstraintViolation::unique(cs::UQ_USER_EMAIL));
            }
            if user.dni.is_some() && other.dni == user.dni {
                return Err(ConstraintViolation::unique(cs::UQ_USER_DNI));
            }
            if user.social_id.is_some()
                && other.provider == user.provider
                && other.social_id == user.social_id
            {
                return Err(ConstraintViolation::unique(cs::UQ_PROVIDER_SOCIAL_ID));
            }
        }
        Ok(())
    }

    fn rollback(&mut self, undo: Vec<Undo>) {
        for entry in undo.into_iter().rev() {
            match entry {
                Undo::User(id, prev) => restore(&mut self.users, id, prev),
                Undo::Instructor(id, prev) => restore(&mut self.instructors, id, prev),
                Undo::Class(id, prev) => restore(&mut self.classes, id, prev),
                Undo::Booking(id, prev) => restore(&mut self.bookings, id, prev),
                Undo::Credit(id, prev) => restore(&mut self.credits, id, prev),
                Undo::FixedSchedule(id, prev) => restore(&mut self.fixed_schedules, id, prev),
                Undo::Setting(key, prev) => restore(&mut self.settings, key, prev),
            }
        }
    }
}

fn restore<K: std::hash::Hash + Eq, V>(table: &mut HashMap<K, V>, key: K, prev: Option<V>) {
    match prev {
        Some(row) => {
            table.insert(key, row);
        }
        None => {
            table.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingStatus, Provider};
    use chrono::{Duration, Utc};

    fn class() -> GymClass {
        let now = Utc::now();
        GymClass {
            id: Uuid::new_v4(),
            name: "Reformer".to_string(),
            instructor: "Laura".to_string(),
            start_time: now + Duration::days(1),
            duration_minutes: 60,
            max_slots: 2,
            recurrence_group: None,
            is_recurring: false,
            cancelled_at: None,
            created_at: now,
        }
    }

    #[test]
    fn test_failed_write_rolls_back_earlier_writes() {
        let mut tables = Tables::default();
        let user = User::federated("a@example.com", Provider::Google, "g-1", Utc::now());
        let class = class();
        tables
            .apply_all(vec![
                Write::InsertUser(user.clone()),
                Write::InsertClass(class.clone()),
            ])
            .unwrap();

        let booking = Booking::confirmed(user.id, class.id, Utc::now());
        let duplicate = Booking::confirmed(user.id, class.id, Utc::now());
        let result = tables.apply_all(vec![
            Write::InsertCredit(Credit::new(user.id, 5, None, Utc::now())),
            Write::PutBooking(booking),
            Write::PutBooking(duplicate),
        ]);

        assert_eq!(
            result,
            Err(ConstraintViolation::unique(cs::UQ_BOOKING_USER_CLASS))
        );
        assert!(tables.bookings.is_empty());
        assert!(tables.credits.is_empty());
    }

    #[test]
    fn test_user_delete_requires_children_moved_first() {
        let mut tables = Tables::default();
        let shadow = User::shadow("123", "Shadow", false, Utc::now());
        let target = User::federated("t@example.com", Provider::Apple, "a-1", Utc::now());
        let class = class();
        let booking = Booking::confirmed(shadow.id, class.id, Utc::now());
        tables
            .apply_all(vec![
                Write::InsertUser(shadow.clone()),
                Write::InsertUser(target.clone()),
                Write::InsertClass(class),
                Write::PutBooking(booking.clone()),
            ])
            .unwrap();

        assert_eq!(
            tables.apply_all(vec![Write::DeleteUser(shadow.id)]),
            Err(ConstraintViolation::foreign_key(cs::FK_BOOKINGS_USER))
        );

        let moved = Booking {
            user_id: target.id,
            ..booking
        };
        let claimed = User {
            dni: Some("123".to_string()),
            ..target.clone()
        };
        tables
            .apply_all(vec![
                Write::PutBooking(moved),
                Write::DeleteUser(shadow.id),
                Write::UpdateUser(claimed),
            ])
            .unwrap();

        assert!(!tables.users.contains_key(&shadow.id));
        assert_eq!(tables.users[&target.id].dni.as_deref(), Some("123"));
        assert!(tables
            .bookings
            .values()
            .all(|b| b.user_id == target.id && b.status == BookingStatus::Confirmed));
    }

    #[test]
    fn test_dni_unique_across_users() {
        let mut tables = Tables::default();
        let first = User::shadow("555", "One", false, Utc::now());
        tables.apply_all(vec![Write::InsertUser(first)]).unwrap();

        let mut other = User::federated("x@example.com", Provider::Google, "g-2", Utc::now());
        other.dni = Some("555".to_string());
        assert_eq!(
            tables.apply_all(vec![Write::InsertUser(other)]),
            Err(ConstraintViolation::unique(cs::UQ_USER_DNI))
        );
        assert_eq!(tables.users.len(), 1);
    }
}
