// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Transactions: row locks plus staged writes.
//!
//! A transaction takes exclusive per-row locks (users, classes) and holds
//! them until it is committed or dropped. Reads made through the
//! transaction after taking a lock observe every commit that released it
//! earlier. Staged writes are applied in order at commit and become visible
//! atomically; dropping the transaction discards them.
//!
//! On PostgreSQL the locks are `FOR NO KEY UPDATE` row locks plus one
//! advisory lock for schedule rules, so they hold across every process
//! sharing the database.
//!
//! Lock order: the schedule-rules lock, then user locks, then class locks,
//! ascending id within each kind. `lock_users` and `lock_classes` sort for
//! you.

use chrono::{DateTime, NaiveTime, Utc};
use uuid::Uuid;

use super::memory::MemoryLocks;
use super::postgres;
use crate::error::Result;
use crate::models::{
    Booking, Credit, DayOfWeek, FixedSchedule, GymClass, Instructor, Setting, User,
};

/// A staged write, applied at commit.
#[derive(Debug, Clone)]
pub(crate) enum Write {
    InsertUser(User),
    UpdateUser(User),
    DeleteUser(Uuid),
    PutInstructor(Instructor),
    DeleteInstructor(Uuid),
    InsertClass(GymClass),
    UpdateClass(GymClass),
    PutBooking(Booking),
    DeleteBooking(Uuid),
    InsertCredit(Credit),
    ReassignCredit { id: Uuid, user_id: Uuid },
    PutFixedSchedule(FixedSchedule),
    DeleteFixedSchedule(Uuid),
    PutSetting(Setting),
}

pub(super) enum Connection {
    Postgres(sqlx::Transaction<'static, sqlx::Postgres>),
    Memory(MemoryLocks),
}

pub struct Transaction {
    conn: Connection,
    writes: Vec<Write>,
    locked_users: Vec<Uuid>,
    locked_classes: Vec<Uuid>,
    holds_schedule_rules: bool,
}

impl Transaction {
    pub(super) fn new(conn: Connection) -> Self {
        Self {
            conn,
            writes: Vec::new(),
            locked_users: Vec::new(),
            locked_classes: Vec::new(),
            holds_schedule_rules: false,
        }
    }

    // ─── Locking ─────────────────────────────────────────────────

    /// Exclusive lock over fixed-schedule rules and the bookings they drive.
    pub async fn lock_schedule_rules(&mut self) -> Result<()> {
        debug_assert!(
            self.locked_users.is_empty() && self.locked_classes.is_empty(),
            "schedule-rules lock must be taken first"
        );
        if self.holds_schedule_rules {
            return Ok(());
        }
        match &mut self.conn {
            Connection::Postgres(tx) => postgres::lock_schedule_rules(tx).await?,
            Connection::Memory(locks) => locks.lock_schedule_rules().await,
        }
        self.holds_schedule_rules = true;
        Ok(())
    }

    /// Lock a user row (serializes ledger and membership changes).
    pub async fn lock_user(&mut self, id: Uuid) -> Result<()> {
        debug_assert!(
            self.locked_classes.is_empty(),
            "user locks must be taken before class locks"
        );
        if self.locked_users.contains(&id) {
            return Ok(());
        }
        match &mut self.conn {
            Connection::Postgres(tx) => postgres::lock_user(tx, id).await?,
            Connection::Memory(locks) => locks.lock_user(id).await,
        }
        self.locked_users.push(id);
        Ok(())
    }

    pub async fn lock_users(&mut self, ids: impl IntoIterator<Item = Uuid>) -> Result<()> {
        for id in sorted(ids) {
            self.lock_user(id).await?;
        }
        Ok(())
    }

    /// Lock a class row (serializes capacity checks for that class).
    pub async fn lock_class(&mut self, id: Uuid) -> Result<()> {
        if self.locked_classes.contains(&id) {
            return Ok(());
        }
        match &mut self.conn {
            Connection::Postgres(tx) => postgres::lock_class(tx, id).await?,
            Connection::Memory(locks) => locks.lock_class(id).await,
        }
        self.locked_classes.push(id);
        Ok(())
    }

    pub async fn lock_classes(&mut self, ids: impl IntoIterator<Item = Uuid>) -> Result<()> {
        for id in sorted(ids) {
            self.lock_class(id).await?;
        }
        Ok(())
    }

    // ─── Reads ───────────────────────────────────────────────────

    pub async fn get_user(&mut self, id: Uuid) -> Result<Option<User>> {
        match &mut self.conn {
            Connection::Postgres(tx) => postgres::get_user(tx, id).await,
            Connection::Memory(locks) => Ok(locks.store().get_user(id).await),
        }
    }

    pub async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>> {
        match &mut self.conn {
            Connection::Postgres(tx) => postgres::find_user_by_email(tx, email).await,
            Connection::Memory(locks) => Ok(locks.store().find_user_by_email(email).await),
        }
    }

    pub async fn find_user_by_dni(&mut self, dni: &str) -> Result<Option<User>> {
        match &mut self.conn {
            Connection::Postgres(tx) => postgres::find_user_by_dni(tx, dni).await,
            Connection::Memory(locks) => Ok(locks.store().find_user_by_dni(dni).await),
        }
    }

    pub async fn find_instructor_by_name(&mut self, name: &str) -> Result<Option<Instructor>> {
        match &mut self.conn {
            Connection::Postgres(tx) => postgres::find_instructor_by_name(tx, name).await,
            Connection::Memory(locks) => Ok(locks.store().find_instructor_by_name(name).await),
        }
    }

    pub async fn get_class(&mut self, id: Uuid) -> Result<Option<GymClass>> {
        match &mut self.conn {
            Connection::Postgres(tx) => postgres::get_class(tx, id).await,
            Connection::Memory(locks) => Ok(locks.store().get_class(id).await),
        }
    }

    pub async fn upcoming_classes(&mut self, after: DateTime<Utc>) -> Result<Vec<GymClass>> {
        match &mut self.conn {
            Connection::Postgres(tx) => postgres::upcoming_classes(tx, after).await,
            Connection::Memory(locks) => Ok(locks.store().upcoming_classes(after).await),
        }
    }

    pub async fn get_booking(&mut self, id: Uuid) -> Result<Option<Booking>> {
        match &mut self.conn {
            Connection::Postgres(tx) => postgres::get_booking(tx, id).await,
            Connection::Memory(locks) => Ok(locks.store().get_booking(id).await),
        }
    }

    pub async fn find_booking(&mut self, user_id: Uuid, class_id: Uuid) -> Result<Option<Booking>> {
        match &mut self.conn {
            Connection::Postgres(tx) => postgres::find_booking(tx, user_id, class_id).await,
            Connection::Memory(locks) => Ok(locks.store().find_booking(user_id, class_id).await),
        }
    }

    pub async fn bookings_for_class(&mut self, class_id: Uuid) -> Result<Vec<Booking>> {
        match &mut self.conn {
            Connection::Postgres(tx) => postgres::bookings_for_class(tx, class_id).await,
            Connection::Memory(locks) => Ok(locks.store().bookings_for_class(class_id).await),
        }
    }

    pub async fn confirmed_count(&mut self, class_id: Uuid) -> Result<usize> {
        match &mut self.conn {
            Connection::Postgres(tx) => postgres::confirmed_count(tx, class_id).await,
            Connection::Memory(locks) => Ok(locks.store().confirmed_count(class_id).await),
        }
    }

    pub async fn bookings_for_user(&mut self, user_id: Uuid) -> Result<Vec<Booking>> {
        match &mut self.conn {
            Connection::Postgres(tx) => postgres::bookings_for_user(tx, user_id).await,
            Connection::Memory(locks) => Ok(locks.store().bookings_for_user(user_id).await),
        }
    }

    /// A user's bookings paired with their classes, ordered by class start.
    pub async fn bookings_with_classes_for_user(
        &mut self,
        user_id: Uuid,
    ) -> Result<Vec<(Booking, GymClass)>> {
        let bookings = self.bookings_for_user(user_id).await?;
        let ids: Vec<Uuid> = bookings.iter().map(|b| b.gym_class_id).collect();
        let classes = match &mut self.conn {
            Connection::Postgres(tx) => postgres::get_classes(tx, &ids).await?,
            Connection::Memory(locks) => locks.store().get_classes(&ids).await,
        };
        Ok(pair_with_classes(bookings, classes))
    }

    pub async fn credits_for_user(&mut self, user_id: Uuid) -> Result<Vec<Credit>> {
        match &mut self.conn {
            Connection::Postgres(tx) => postgres::credits_for_user(tx, user_id).await,
            Connection::Memory(locks) => Ok(locks.store().credits_for_user(user_id).await),
        }
    }

    pub async fn get_fixed_schedule(&mut self, id: Uuid) -> Result<Option<FixedSchedule>> {
        match &mut self.conn {
            Connection::Postgres(tx) => postgres::get_fixed_schedule(tx, id).await,
            Connection::Memory(locks) => Ok(locks.store().get_fixed_schedule(id).await),
        }
    }

    pub async fn find_fixed_schedule(
        &mut self,
        user_id: Uuid,
        day: DayOfWeek,
        time: NaiveTime,
    ) -> Result<Option<FixedSchedule>> {
        match &mut self.conn {
            Connection::Postgres(tx) => postgres::find_fixed_schedule(tx, user_id, day, time).await,
            Connection::Memory(locks) => {
                Ok(locks.store().find_fixed_schedule(user_id, day, time).await)
            }
        }
    }

    pub async fn fixed_schedules_for_user(&mut self, user_id: Uuid) -> Result<Vec<FixedSchedule>> {
        match &mut self.conn {
            Connection::Postgres(tx) => postgres::fixed_schedules_for_user(tx, user_id).await,
            Connection::Memory(locks) => Ok(locks.store().fixed_schedules_for_user(user_id).await),
        }
    }

    pub async fn active_schedules_for_slot(
        &mut self,
        day: DayOfWeek,
        time: NaiveTime,
    ) -> Result<Vec<FixedSchedule>> {
        match &mut self.conn {
            Connection::Postgres(tx) => postgres::active_schedules_for_slot(tx, day, time).await,
            Connection::Memory(locks) => Ok(locks.store().active_schedules_for_slot(day, time).await),
        }
    }

    // ─── Staged Writes ───────────────────────────────────────────

    pub fn insert_user(&mut self, user: User) {
        self.writes.push(Write::InsertUser(user));
    }

    pub fn update_user(&mut self, user: User) {
        self.writes.push(Write::UpdateUser(user));
    }

    pub fn delete_user(&mut self, id: Uuid) {
        self.writes.push(Write::DeleteUser(id));
    }

    pub fn put_instructor(&mut self, instructor: Instructor) {
        self.writes.push(Write::PutInstructor(instructor));
    }

    pub fn delete_instructor(&mut self, id: Uuid) {
        self.writes.push(Write::DeleteInstructor(id));
    }

    pub fn insert_class(&mut self, class: GymClass) {
        self.writes.push(Write::InsertClass(class));
    }

    pub fn update_class(&mut self, class: GymClass) {
        self.writes.push(Write::UpdateClass(class));
    }

    /// Insert a booking, or replace the row with the same id.
    pub fn put_booking(&mut self, booking: Booking) {
        self.writes.push(Write::PutBooking(booking));
    }

    pub fn delete_booking(&mut self, id: Uuid) {
        self.writes.push(Write::DeleteBooking(id));
    }

    pub fn insert_credit(&mut self, credit: Credit) {
        self.writes.push(Write::InsertCredit(credit));
    }

    pub fn reassign_credit(&mut self, id: Uuid, user_id: Uuid) {
        self.writes.push(Write::ReassignCredit { id, user_id });
    }

    pub fn put_fixed_schedule(&mut self, schedule: FixedSchedule) {
        self.writes.push(Write::PutFixedSchedule(schedule));
    }

    pub fn delete_fixed_schedule(&mut self, id: Uuid) {
        self.writes.push(Write::DeleteFixedSchedule(id));
    }

    pub fn put_setting(&mut self, key: impl Into<String>, value: impl Into<String>, now: DateTime<Utc>) {
        self.writes.push(Write::PutSetting(Setting {
            key: key.into(),
            value: value.into(),
            updated_at: now,
        }));
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Apply every staged write atomically, then release all locks.
    pub async fn commit(self) -> Result<()> {
        let Transaction { conn, writes, .. } = self;
        let count = writes.len();

        let applied = match conn {
            Connection::Postgres(mut tx) => {
                let mut applied = Ok(());
                for write in &writes {
                    applied = postgres::apply(&mut tx, write).await;
                    if applied.is_err() {
                        break;
                    }
                }
                match applied {
                    // Dropping `tx` rolls it back.
                    Ok(()) => tx.commit().await.map_err(Into::into),
                    Err(e) => Err(e),
                }
            }
            Connection::Memory(locks) => {
                if writes.is_empty() {
                    Ok(())
                } else {
                    locks.store().apply_all(writes).await.map_err(Into::into)
                }
            }
        };

        if let Err(e) = &applied {
            tracing::warn!(error = %e, writes = count, "Transaction rolled back");
        }
        applied
    }
}

/// Join bookings to their classes, ordered by class start.
pub(super) fn pair_with_classes(
    bookings: Vec<Booking>,
    classes: Vec<GymClass>,
) -> Vec<(Booking, GymClass)> {
    let mut found: Vec<(Booking, GymClass)> = bookings
        .into_iter()
        .filter_map(|b| {
            classes
                .iter()
                .find(|c| c.id == b.gym_class_id)
                .map(|c| (b, c.clone()))
        })
        .collect();
    found.sort_by_key(|(b, c)| (c.start_time, b.id));
    found
}

fn sorted(ids: impl IntoIterator<Item = Uuid>) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = ids.into_iter().collect();
    ids.sort();
    ids.dedup();
    ids
}
