// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credit ledger: append-only signed entries per user.
//!
//! A booking debits one credit; refunds and holiday compensation append
//! +1. Balances are derived, never stored.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::{Db, Transaction};
use crate::error::{AppError, Result};
use crate::models::credit::{display_balance, raw_balance};
use crate::models::Credit;
use crate::time_utils::SharedClock;

#[derive(Clone)]
pub struct Ledger {
    db: Db,
    clock: SharedClock,
}

impl Ledger {
    pub fn new(db: Db, clock: SharedClock) -> Self {
        Self { db, clock }
    }

    /// Stage an entry inside a caller's transaction.
    pub fn stage(
        tx: &mut Transaction,
        user_id: Uuid,
        amount: i32,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Credit {
        let credit = Credit::new(user_id, amount, expires_at, now);
        tx.insert_credit(credit.clone());
        credit
    }

    /// Append a manual entry (admin top-up or correction).
    ///
    /// The resulting balance is not checked; corrections may push it below
    /// zero.
    pub async fn apply_entry(
        &self,
        user_id: Uuid,
        amount: i32,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Credit> {
        if amount == 0 {
            return Err(AppError::BadRequest(
                "Credit amount must not be zero".to_string(),
            ));
        }
        let mut tx = self.db.begin().await?;
        tx.lock_user(user_id).await?;
        if tx.get_user(user_id).await?.is_none() {
            return Err(AppError::NotFound(format!("user {user_id}")));
        }
        let credit = Self::stage(&mut tx, user_id, amount, expires_at, self.clock.now());
        tx.commit().await?;

        tracing::info!(%user_id, amount, expires_at = ?expires_at, "Ledger entry applied");
        Ok(credit)
    }

    /// Raw balance at `as_of`; may be negative.
    pub async fn raw_balance_at(&self, user_id: Uuid, as_of: DateTime<Utc>) -> Result<i64> {
        let entries = self.db.credits_for_user(user_id).await?;
        Ok(raw_balance(&entries, as_of))
    }

    /// Balance shown to users right now, floored at zero.
    pub async fn balance(&self, user_id: Uuid) -> Result<i64> {
        Ok(display_balance(
            self.raw_balance_at(user_id, self.clock.now()).await?,
        ))
    }

    pub async fn entries(&self, user_id: Uuid) -> Result<Vec<Credit>> {
        self.db.credits_for_user(user_id).await
    }
}
