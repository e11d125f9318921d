// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Store handle with typed read operations.
//!
//! Reads see committed state only. Writes go through [`Transaction`].

use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::memory::{MemoryLocks, MemoryStore};
use super::postgres;
use super::transaction::{pair_with_classes, Connection, Transaction};
use super::MIGRATOR;
use crate::error::Result;
use crate::models::{
    Booking, Credit, DayOfWeek, FixedSchedule, GymClass, Instructor, Setting, User,
};

#[derive(Clone)]
enum Backend {
    Postgres(PgPool),
    Memory(Arc<MemoryStore>),
}

/// Shared handle to the store.
#[derive(Clone)]
pub struct Db {
    backend: Backend,
}

/// Run one read against whichever backend this handle wraps.
macro_rules! read {
    ($db:expr, $query:ident ( $($arg:expr),* )) => {
        match &$db.backend {
            Backend::Postgres(pool) => {
                let mut conn = pool.acquire().await?;
                postgres::$query(&mut conn, $($arg),*).await
            }
            Backend::Memory(store) => Ok(store.$query($($arg),*).await),
        }
    };
}

impl Db {
    /// Connect a pool to the database at `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = postgres::connect(url, max_connections).await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            backend: Backend::Postgres(pool),
        }
    }

    /// An empty in-process store with the same constraints as the schema.
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(MemoryStore::default())),
        }
    }

    /// Bring the schema up to date.
    pub async fn migrate(&self) -> Result<()> {
        if let Backend::Postgres(pool) = &self.backend {
            MIGRATOR.run(pool).await.map_err(sqlx::Error::from)?;
            tracing::info!("Database migrations applied");
        }
        Ok(())
    }

    /// Start a transaction. Nothing it stages is visible until commit.
    pub async fn begin(&self) -> Result<Transaction> {
        let conn = match &self.backend {
            Backend::Postgres(pool) => Connection::Postgres(pool.begin().await?),
            Backend::Memory(store) => Connection::Memory(MemoryLocks::new(store.clone())),
        };
        Ok(Transaction::new(conn))
    }

    #[cfg(test)]
    pub(crate) fn row_lock_count(&self) -> usize {
        match &self.backend {
            Backend::Postgres(_) => 0,
            Backend::Memory(store) => store.row_lock_count(),
        }
    }

    // ─── User Operations ─────────────────────────────────────────

    pub async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        read!(self, get_user(id))
    }

    pub async fn get_users(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        read!(self, get_users(ids))
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        read!(self, find_user_by_email(email))
    }

    pub async fn find_user_by_dni(&self, dni: &str) -> Result<Option<User>> {
        read!(self, find_user_by_dni(dni))
    }

    /// Case-insensitive substring search on name or DNI over live users,
    /// ordered by name.
    pub async fn search_users(
        &self,
        query: Option<&str>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<User>> {
        read!(self, search_users(query, offset, limit))
    }

    // ─── Instructor Operations ───────────────────────────────────

    pub async fn get_instructor(&self, id: Uuid) -> Result<Option<Instructor>> {
        read!(self, get_instructor(id))
    }

    pub async fn find_instructor_by_name(&self, name: &str) -> Result<Option<Instructor>> {
        read!(self, find_instructor_by_name(name))
    }

    pub async fn list_instructors(&self, include_inactive: bool) -> Result<Vec<Instructor>> {
        read!(self, list_instructors(include_inactive))
    }

    // ─── Class Operations ────────────────────────────────────────

    pub async fn get_class(&self, id: Uuid) -> Result<Option<GymClass>> {
        read!(self, get_class(id))
    }

    pub async fn get_classes(&self, ids: &[Uuid]) -> Result<Vec<GymClass>> {
        read!(self, get_classes(ids))
    }

    /// Classes starting in `[from, to)`, ordered by start time.
    pub async fn classes_between(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        include_cancelled: bool,
    ) -> Result<Vec<GymClass>> {
        read!(self, classes_between(from, to, include_cancelled))
    }

    /// Classes strictly after `after` that are not cancelled.
    pub async fn upcoming_classes(&self, after: DateTime<Utc>) -> Result<Vec<GymClass>> {
        read!(self, upcoming_classes(after))
    }

    /// Every instance of a recurring series, ordered by start time.
    pub async fn series_classes(&self, group: Uuid) -> Result<Vec<GymClass>> {
        read!(self, series_classes(group))
    }

    // ─── Booking Operations ──────────────────────────────────────

    pub async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>> {
        read!(self, get_booking(id))
    }

    /// The single booking row for a (user, class) pair, in any status.
    pub async fn find_booking(&self, user_id: Uuid, class_id: Uuid) -> Result<Option<Booking>> {
        read!(self, find_booking(user_id, class_id))
    }

    pub async fn bookings_for_class(&self, class_id: Uuid) -> Result<Vec<Booking>> {
        read!(self, bookings_for_class(class_id))
    }

    pub async fn confirmed_count(&self, class_id: Uuid) -> Result<usize> {
        read!(self, confirmed_count(class_id))
    }

    pub async fn bookings_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>> {
        read!(self, bookings_for_user(user_id))
    }

    /// A user's bookings paired with their classes, ordered by class start.
    pub async fn bookings_with_classes_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<(Booking, GymClass)>> {
        let bookings = self.bookings_for_user(user_id).await?;
        let ids: Vec<Uuid> = bookings.iter().map(|b| b.gym_class_id).collect();
        let classes = self.get_classes(&ids).await?;
        Ok(pair_with_classes(bookings, classes))
    }

    // ─── Credit Operations ───────────────────────────────────────

    pub async fn credits_for_user(&self, user_id: Uuid) -> Result<Vec<Credit>> {
        read!(self, credits_for_user(user_id))
    }

    // ─── Fixed Schedule Operations ───────────────────────────────

    pub async fn get_fixed_schedule(&self, id: Uuid) -> Result<Option<FixedSchedule>> {
        read!(self, get_fixed_schedule(id))
    }

    /// The rule for (user, day, time), active or not.
    pub async fn find_fixed_schedule(
        &self,
        user_id: Uuid,
        day: DayOfWeek,
        time: NaiveTime,
    ) -> Result<Option<FixedSchedule>> {
        read!(self, find_fixed_schedule(user_id, day, time))
    }

    pub async fn fixed_schedules_for_user(&self, user_id: Uuid) -> Result<Vec<FixedSchedule>> {
        read!(self, fixed_schedules_for_user(user_id))
    }

    /// Active rules for a slot whose owners are not deleted.
    pub async fn active_schedules_for_slot(
        &self,
        day: DayOfWeek,
        time: NaiveTime,
    ) -> Result<Vec<FixedSchedule>> {
        read!(self, active_schedules_for_slot(day, time))
    }

    // ─── Setting Operations ──────────────────────────────────────

    pub async fn get_setting(&self, key: &str) -> Result<Option<Setting>> {
        read!(self, get_setting(key))
    }

    pub async fn all_settings(&self) -> Result<Vec<Setting>> {
        read!(self, all_settings())
    }
}
