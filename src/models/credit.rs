// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credit ledger entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One signed ledger entry. Entries are never edited or removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credit {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i32,
    /// Positive entries stop counting at this instant. Ignored for debits.
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Credit {
    pub fn new(
        user_id: Uuid,
        amount: i32,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount,
            expires_at,
            created_at: now,
        }
    }

    /// Whether this entry contributes to a balance evaluated at `as_of`.
    pub fn counts_at(&self, as_of: DateTime<Utc>) -> bool {
        if self.amount <= 0 {
            return true;
        }
        self.expires_at.is_none_or(|expiry| expiry > as_of)
    }
}

/// Sum of all debits plus unexpired positive entries. May be negative.
pub fn raw_balance<'a>(entries: impl IntoIterator<Item = &'a Credit>, as_of: DateTime<Utc>) -> i64 {
    entries
        .into_iter()
        .filter(|c| c.counts_at(as_of))
        .map(|c| i64::from(c.amount))
        .sum()
}

/// Balance as shown to users: never below zero.
pub fn display_balance(raw: i64) -> i64 {
    raw.max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_expired_positive_entries_drop_out() {
        let now = Utc::now();
        let user = Uuid::new_v4();
        let entries = vec![
            Credit::new(user, 4, Some(now - Duration::days(1)), now),
            Credit::new(user, 3, Some(now + Duration::days(1)), now),
            Credit::new(user, 2, None, now),
            Credit::new(user, -1, Some(now - Duration::days(5)), now),
        ];

        assert_eq!(raw_balance(&entries, now), 4);
    }

    #[test]
    fn test_debits_can_push_raw_balance_negative() {
        let now = Utc::now();
        let user = Uuid::new_v4();
        let entries = vec![
            Credit::new(user, 2, Some(now - Duration::hours(1)), now),
            Credit::new(user, -1, None, now),
        ];

        let raw = raw_balance(&entries, now);
        assert_eq!(raw, -1);
        assert_eq!(display_balance(raw), 0);
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let now = Utc::now();
        let entry = Credit::new(Uuid::new_v4(), 1, Some(now), now);
        assert!(!entry.counts_at(now));
        assert!(entry.counts_at(now - Duration::seconds(1)));
    }
}
