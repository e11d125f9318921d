// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Studio closure dates.
//!
//! Classes that fall on one of these dates are not auto-booked from fixed
//! schedules; the member is credited instead.

use std::collections::HashSet;

use chrono::NaiveDate;

/// National holidays the studio observes, as (year, month, day).
const STUDIO_HOLIDAYS: &[(i32, u32, u32)] = &[
    // 2026
    (2026, 1, 1),
    (2026, 2, 16),
    (2026, 2, 17),
    (2026, 3, 24),
    (2026, 4, 2),
    (2026, 4, 3),
    (2026, 5, 1),
    (2026, 5, 25),
    (2026, 6, 20),
    (2026, 7, 9),
    (2026, 8, 17),
    (2026, 10, 12),
    (2026, 11, 23),
    (2026, 12, 8),
    (2026, 12, 25),
    // 2027
    (2027, 1, 1),
    (2027, 2, 8),
    (2027, 2, 9),
    (2027, 3, 24),
    (2027, 3, 26),
    (2027, 4, 2),
    (2027, 5, 1),
    (2027, 5, 25),
    (2027, 6, 20),
    (2027, 7, 9),
    (2027, 12, 8),
    (2027, 12, 25),
];

/// Static allow-list of closure dates on the studio calendar.
#[derive(Debug, Clone)]
pub struct HolidayCalendar {
    dates: HashSet<NaiveDate>,
}

impl HolidayCalendar {
    /// The studio's built-in holiday list.
    pub fn studio() -> Self {
        Self::from_dates(
            STUDIO_HOLIDAYS
                .iter()
                .filter_map(|&(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
        )
    }

    pub fn from_dates(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            dates: dates.into_iter().collect(),
        }
    }

    pub fn empty() -> Self {
        Self {
            dates: HashSet::new(),
        }
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }
}

impl Default for HolidayCalendar {
    fn default() -> Self {
        Self::studio()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_studio_list_is_complete() {
        let calendar = HolidayCalendar::studio();
        assert_eq!(calendar.dates.len(), STUDIO_HOLIDAYS.len());
        assert!(calendar.is_holiday(NaiveDate::from_ymd_opt(2026, 7, 9).unwrap()));
        assert!(calendar.is_holiday(NaiveDate::from_ymd_opt(2027, 3, 26).unwrap()));
        assert!(!calendar.is_holiday(NaiveDate::from_ymd_opt(2026, 7, 10).unwrap()));
    }
}
