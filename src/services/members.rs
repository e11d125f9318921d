// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin member management.

use uuid::Uuid;

use crate::db::{Db, Transaction};
use crate::error::{AppError, Result};
use crate::models::user::normalize_dni;
use crate::models::{Booking, Credit, FixedSchedule, GymClass, User};
use crate::services::identity::create_shadow_user;
use crate::services::ledger::Ledger;
use crate::time_utils::SharedClock;

pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct MemberSummary {
    pub user: User,
    pub balance: i64,
}

#[derive(Debug, Clone)]
pub struct MemberDetail {
    pub user: User,
    pub balance: i64,
    pub credits: Vec<Credit>,
    pub bookings: Vec<(Booking, GymClass)>,
    pub fixed_schedules: Vec<FixedSchedule>,
}

/// Admin edits to a member. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct MemberUpdate {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub dni: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Disabled,
    Admin,
    Trial,
}

#[derive(Clone)]
pub struct MemberService {
    db: Db,
    clock: SharedClock,
    ledger: Ledger,
}

impl MemberService {
    pub fn new(db: Db, clock: SharedClock, ledger: Ledger) -> Self {
        Self { db, clock, ledger }
    }

    pub async fn create_shadow(&self, dni: &str, full_name: &str, is_trial: bool) -> Result<User> {
        create_shadow_user(&self.db, dni, full_name, is_trial, self.clock.now()).await
    }

    /// Live members matching `query` on name or DNI, with display balances.
    pub async fn search(&self, query: Option<&str>, skip: usize, limit: usize) -> Result<Vec<MemberSummary>> {
        if limit == 0 || limit > MAX_PAGE_SIZE {
            return Err(AppError::BadRequest(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        let users = self
            .db
            .search_users(query.map(str::trim), skip, limit)
            .await?;
        let mut summaries = Vec::with_capacity(users.len());
        for user in users {
            let balance = self.ledger.balance(user.id).await?;
            summaries.push(MemberSummary { user, balance });
        }
        Ok(summaries)
    }

    pub async fn detail(&self, user_id: Uuid) -> Result<MemberDetail> {
        let user = self.load(user_id).await?;
        Ok(MemberDetail {
            balance: self.ledger.balance(user_id).await?,
            credits: self.ledger.entries(user_id).await?,
            bookings: self.db.bookings_with_classes_for_user(user_id).await?,
            fixed_schedules: self.db.fixed_schedules_for_user(user_id).await?,
            user,
        })
    }

    pub async fn bookings(&self, user_id: Uuid) -> Result<Vec<(Booking, GymClass)>> {
        self.load(user_id).await?;
        self.db.bookings_with_classes_for_user(user_id).await
    }

    pub async fn fixed_schedules(&self, user_id: Uuid) -> Result<Vec<FixedSchedule>> {
        self.load(user_id).await?;
        self.db.fixed_schedules_for_user(user_id).await
    }

    /// Flip a flag. Disabling a member also cancels their upcoming
    /// confirmed bookings, without refund.
    pub async fn toggle(&self, user_id: Uuid, flag: Flag) -> Result<User> {
        let now = self.clock.now();

        let mut tx = self.db.begin().await?;
        tx.lock_user(user_id).await?;
        let mut user = load_locked(&mut tx, user_id).await?;

        let mut released = 0;
        match flag {
            Flag::Admin => user.is_admin = !user.is_admin,
            Flag::Trial => user.is_trial = !user.is_trial,
            Flag::Disabled => {
                user.disabled = !user.disabled;
                if user.disabled {
                    let upcoming: Vec<Booking> = tx
                        .bookings_with_classes_for_user(user_id)
                        .await?
                        .into_iter()
                        .filter(|(b, c)| b.is_confirmed() && c.start_time > now)
                        .map(|(b, _)| b)
                        .collect();
                    tx.lock_classes(upcoming.iter().map(|b| b.gym_class_id))
                        .await?;
                    for booking in upcoming {
                        // Re-read under the class lock.
                        if let Some(current) = tx.get_booking(booking.id).await? {
                            if current.is_confirmed() {
                                tx.put_booking(current.cancelled(now));
                                released += 1;
                            }
                        }
                    }
                }
            }
        }

        tx.update_user(user.clone());
        tx.commit().await?;

        tracing::info!(
            %user_id,
            flag = ?flag,
            disabled = user.disabled,
            is_admin = user.is_admin,
            is_trial = user.is_trial,
            bookings_released = released,
            "Member flag toggled"
        );
        Ok(user)
    }

    /// Edit email, name, phone or DNI. Values already held by someone else
    /// are rejected; admins do not trigger merges.
    pub async fn update_details(&self, user_id: Uuid, update: MemberUpdate) -> Result<User> {
        let mut tx = self.db.begin().await?;
        tx.lock_user(user_id).await?;
        let mut user = load_locked(&mut tx, user_id).await?;

        if let Some(email) = update.email.map(|e| e.trim().to_lowercase()) {
            if !email.contains('@') {
                return Err(AppError::BadRequest("email is not valid".to_string()));
            }
            if let Some(holder) = tx.find_user_by_email(&email).await? {
                if holder.id != user_id {
                    return Err(AppError::Conflict(format!(
                        "email {email} belongs to another member"
                    )));
                }
            }
            user.email = email;
        }
        if let Some(name) = update.full_name.map(|n| n.trim().to_string()) {
            if name.is_empty() {
                return Err(AppError::BadRequest("full_name must not be empty".to_string()));
            }
            user.full_name = Some(name);
        }
        if let Some(phone) = update.phone {
            let phone = phone.trim().to_string();
            user.phone = (!phone.is_empty()).then_some(phone);
        }
        if let Some(raw) = update.dni {
            let dni = normalize_dni(&raw)
                .ok_or_else(|| AppError::BadRequest("DNI must contain only digits".to_string()))?;
            if let Some(holder) = tx.find_user_by_dni(&dni).await? {
                if holder.id != user_id {
                    return Err(AppError::Conflict(format!(
                        "DNI {dni} belongs to another member"
                    )));
                }
            }
            user.dni = Some(dni);
        }

        tx.update_user(user.clone());
        tx.commit().await?;

        tracing::info!(%user_id, "Member details updated");
        Ok(user)
    }

    async fn load(&self, user_id: Uuid) -> Result<User> {
        self.db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {user_id}")))
    }
}

async fn load_locked(tx: &mut Transaction, user_id: Uuid) -> Result<User> {
    tx.get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {user_id}")))
}
