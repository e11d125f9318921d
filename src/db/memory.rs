// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store used by the test suite.
//!
//! Tables live behind one `RwLock`; row locks are per-id mutexes that a
//! transaction holds until it ends. A row lock entry is dropped from its
//! map as soon as nobody holds or waits on it.

use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use super::tables::Tables;
use super::transaction::Write;
use super::ConstraintViolation;
use crate::models::{
    Booking, BookingStatus, Credit, DayOfWeek, FixedSchedule, GymClass, Instructor, Setting, User,
};

/// Per-row exclusive locks, held by a transaction until it ends.
type RowLocks = DashMap<Uuid, Arc<Mutex<()>>>;

#[derive(Default)]
pub(super) struct MemoryStore {
    tables: RwLock<Tables>,
    /// Serializes changes driven by fixed-schedule rules.
    schedule_rules: Arc<Mutex<()>>,
    user_locks: RowLocks,
    class_locks: RowLocks,
}

impl MemoryStore {
    async fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        let tables = self.tables.read().await;
        f(&tables)
    }

    pub async fn apply_all(&self, writes: Vec<Write>) -> Result<(), ConstraintViolation> {
        self.tables.write().await.apply_all(writes)
    }

    #[cfg(test)]
    pub fn row_lock_count(&self) -> usize {
        self.user_locks.len() + self.class_locks.len()
    }

    // ─── Users ───────────────────────────────────────────────────

    pub async fn get_user(&self, id: Uuid) -> Option<User> {
        self.read(|t| t.users.get(&id).cloned()).await
    }

    pub async fn get_users(&self, ids: &[Uuid]) -> Vec<User> {
        self.read(|t| ids.iter().filter_map(|id| t.users.get(id).cloned()).collect())
            .await
    }

    pub async fn find_user_by_email(&self, email: &str) -> Option<User> {
        self.read(|t| t.users.values().find(|u| u.email == email).cloned())
            .await
    }

    pub async fn find_user_by_dni(&self, dni: &str) -> Option<User> {
        self.read(|t| {
            t.users
                .values()
                .find(|u| u.dni.as_deref() == Some(dni))
                .cloned()
        })
        .await
    }

    pub async fn search_users(&self, query: Option<&str>, offset: usize, limit: usize) -> Vec<User> {
        let needle = query.map(str::to_lowercase).filter(|q| !q.is_empty());
        self.read(|t| {
            let mut found: Vec<User> = t
                .users
                .values()
                .filter(|u| !u.is_deleted)
                .filter(|u| match &needle {
                    None => true,
                    Some(q) => {
                        u.full_name
                            .as_deref()
                            .is_some_and(|n| n.to_lowercase().contains(q))
                            || u.dni.as_deref().is_some_and(|d| d.contains(q.as_str()))
                    }
                })
                .cloned()
                .collect();
            found.sort_by(|a, b| {
                a.full_name
                    .cmp(&b.full_name)
                    .then_with(|| a.created_at.cmp(&b.created_at))
            });
            found.into_iter().skip(offset).take(limit).collect()
        })
        .await
    }

    // ─── Instructors ─────────────────────────────────────────────

    pub async fn get_instructor(&self, id: Uuid) -> Option<Instructor> {
        self.read(|t| t.instructors.get(&id).cloned()).await
    }

    pub async fn find_instructor_by_name(&self, name: &str) -> Option<Instructor> {
        self.read(|t| t.instructors.values().find(|i| i.name == name).cloned())
            .await
    }

    pub async fn list_instructors(&self, include_inactive: bool) -> Vec<Instructor> {
        self.read(|t| {
            let mut all: Vec<Instructor> = t
                .instructors
                .values()
                .filter(|i| include_inactive || i.is_active)
                .cloned()
                .collect();
            all.sort_by(|a, b| a.name.cmp(&b.name));
            all
        })
        .await
    }

    // ─── Classes ─────────────────────────────────────────────────

    pub async fn get_class(&self, id: Uuid) -> Option<GymClass> {
        self.read(|t| t.classes.get(&id).cloned()).await
    }

    pub async fn get_classes(&self, ids: &[Uuid]) -> Vec<GymClass> {
        self.read(|t| ids.iter().filter_map(|id| t.classes.get(id).cloned()).collect())
            .await
    }

    pub async fn classes_between(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        include_cancelled: bool,
    ) -> Vec<GymClass> {
        self.read(|t| {
            let mut found: Vec<GymClass> = t
                .classes
                .values()
                .filter(|c| include_cancelled || !c.is_cancelled())
                .filter(|c| from.is_none_or(|f| c.start_time >= f))
                .filter(|c| to.is_none_or(|end| c.start_time < end))
                .cloned()
                .collect();
            found.sort_by_key(|c| (c.start_time, c.id));
            found
        })
        .await
    }

    pub async fn upcoming_classes(&self, after: DateTime<Utc>) -> Vec<GymClass> {
        self.read(|t| {
            let mut found: Vec<GymClass> = t
                .classes
                .values()
                .filter(|c| !c.is_cancelled() && c.start_time > after)
                .cloned()
                .collect();
            found.sort_by_key(|c| (c.start_time, c.id));
            found
        })
        .await
    }

    pub async fn series_classes(&self, group: Uuid) -> Vec<GymClass> {
        self.read(|t| {
            let mut found: Vec<GymClass> = t
                .classes
                .values()
                .filter(|c| c.recurrence_group == Some(group))
                .cloned()
                .collect();
            found.sort_by_key(|c| (c.start_time, c.id));
            found
        })
        .await
    }

    // ─── Bookings ────────────────────────────────────────────────

    pub async fn get_booking(&self, id: Uuid) -> Option<Booking> {
        self.read(|t| t.bookings.get(&id).cloned()).await
    }

    pub async fn find_booking(&self, user_id: Uuid, class_id: Uuid) -> Option<Booking> {
        self.read(|t| {
            t.bookings
                .values()
                .find(|b| b.user_id == user_id && b.gym_class_id == class_id)
                .cloned()
        })
        .await
    }

    pub async fn bookings_for_class(&self, class_id: Uuid) -> Vec<Booking> {
        self.read(|t| {
            let mut found: Vec<Booking> = t
                .bookings
                .values()
                .filter(|b| b.gym_class_id == class_id)
                .cloned()
                .collect();
            found.sort_by_key(|b| b.created_at);
            found
        })
        .await
    }

    pub async fn confirmed_count(&self, class_id: Uuid) -> usize {
        self.read(|t| {
            t.bookings
                .values()
                .filter(|b| b.gym_class_id == class_id && b.status == BookingStatus::Confirmed)
                .count()
        })
        .await
    }

    pub async fn bookings_for_user(&self, user_id: Uuid) -> Vec<Booking> {
        self.read(|t| {
            t.bookings
                .values()
                .filter(|b| b.user_id == user_id)
                .cloned()
                .collect()
        })
        .await
    }

    // ─── Credits ─────────────────────────────────────────────────

    pub async fn credits_for_user(&self, user_id: Uuid) -> Vec<Credit> {
        self.read(|t| {
            let mut found: Vec<Credit> = t
                .credits
                .values()
                .filter(|c| c.user_id == user_id)
                .cloned()
                .collect();
            found.sort_by_key(|c| (c.created_at, c.id));
            found
        })
        .await
    }

    // ─── Fixed Schedules ─────────────────────────────────────────

    pub async fn get_fixed_schedule(&self, id: Uuid) -> Option<FixedSchedule> {
        self.read(|t| t.fixed_schedules.get(&id).cloned()).await
    }

    pub async fn find_fixed_schedule(
        &self,
        user_id: Uuid,
        day: DayOfWeek,
        time: NaiveTime,
    ) -> Option<FixedSchedule> {
        self.read(|t| {
            t.fixed_schedules
                .values()
                .find(|f| f.user_id == user_id && f.day_of_week == day && f.start_time == time)
                .cloned()
        })
        .await
    }

    pub async fn fixed_schedules_for_user(&self, user_id: Uuid) -> Vec<FixedSchedule> {
        self.read(|t| {
            let mut found: Vec<FixedSchedule> = t
                .fixed_schedules
                .values()
                .filter(|f| f.user_id == user_id)
                .cloned()
                .collect();
            found.sort_by_key(|f| (f.day_of_week, f.start_time));
            found
        })
        .await
    }

    pub async fn active_schedules_for_slot(&self, day: DayOfWeek, time: NaiveTime) -> Vec<FixedSchedule> {
        self.read(|t| {
            t.fixed_schedules
                .values()
                .filter(|f| f.is_active() && f.day_of_week == day && f.start_time == time)
                .filter(|f| t.users.get(&f.user_id).is_some_and(|u| !u.is_deleted))
                .cloned()
                .collect()
        })
        .await
    }

    // ─── Settings ────────────────────────────────────────────────

    pub async fn get_setting(&self, key: &str) -> Option<Setting> {
        self.read(|t| t.settings.get(key).cloned()).await
    }

    pub async fn all_settings(&self) -> Vec<Setting> {
        self.read(|t| {
            let mut all: Vec<Setting> = t.settings.values().cloned().collect();
            all.sort_by(|a, b| a.key.cmp(&b.key));
            all
        })
        .await
    }
}

/// Row locks taken by one transaction. Released on drop.
pub(super) struct MemoryLocks {
    store: Arc<MemoryStore>,
    guards: Vec<OwnedMutexGuard<()>>,
    users: Vec<Uuid>,
    classes: Vec<Uuid>,
}

impl MemoryLocks {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            guards: Vec::new(),
            users: Vec::new(),
            classes: Vec::new(),
        }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub async fn lock_schedule_rules(&mut self) {
        let guard = self.store.schedule_rules.clone().lock_owned().await;
        self.guards.push(guard);
    }

    pub async fn lock_user(&mut self, id: Uuid) {
        let guard = acquire(&self.store.user_locks, id).await;
        self.users.push(id);
        self.guards.push(guard);
    }

    pub async fn lock_class(&mut self, id: Uuid) {
        let guard = acquire(&self.store.class_locks, id).await;
        self.classes.push(id);
        self.guards.push(guard);
    }
}

impl Drop for MemoryLocks {
    fn drop(&mut self) {
        self.guards.clear();
        for id in &self.users {
            prune(&self.store.user_locks, *id);
        }
        for id in &self.classes {
            prune(&self.store.class_locks, *id);
        }
    }
}

async fn acquire(locks: &RowLocks, id: Uuid) -> OwnedMutexGuard<()> {
    let lock = locks
        .entry(id)
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone();
    lock.lock_owned().await
}

/// Drop the entry once the map holds the only reference. Waiters hold a
/// clone, so an entry someone is queued on survives.
fn prune(locks: &RowLocks, id: Uuid) {
    locks.remove_if(&id, |_, lock| Arc::strong_count(lock) == 1);
}
