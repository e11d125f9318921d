// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer.
//!
//! Production runs on PostgreSQL through `sqlx`; the schema lives in
//! `migrations/`. An in-process store with the same constraints backs the
//! test suite.

mod memory;
mod postgres;
pub mod store;
mod tables;
pub mod transaction;

pub use store::Db;
pub use transaction::Transaction;

/// Table names as constants.
pub mod table_names {
    pub const USERS: &str = "users";
    pub const INSTRUCTORS: &str = "instructors";
    pub const GYM_CLASSES: &str = "gym_classes";
    pub const BOOKINGS: &str = "bookings";
    pub const CREDITS: &str = "credits";
    pub const FIXED_SCHEDULES: &str = "fixed_schedules";
    pub const SETTINGS: &str = "settings";
}

/// Constraint names, as declared in the migrations.
pub mod constraints {
    pub const UQ_USER_EMAIL: &str = "uq_user_email";
    pub const UQ_USER_DNI: &str = "uq_user_dni";
    pub const UQ_PROVIDER_SOCIAL_ID: &str = "uq_provider_social_id";
    pub const UQ_INSTRUCTOR_NAME: &str = "uq_instructor_name";
    pub const UQ_BOOKING_USER_CLASS: &str = "uq_booking_user_class";
    pub const UQ_FIXED_SCHEDULE_USER_SLOT: &str = "uq_fixed_schedule_user_slot";
    pub const FK_BOOKINGS_USER: &str = "fk_bookings_user";
    pub const FK_BOOKINGS_CLASS: &str = "fk_bookings_class";
    pub const FK_CREDITS_USER: &str = "fk_credits_user";
    pub const FK_FIXED_SCHEDULES_USER: &str = "fk_fixed_schedules_user";
}

/// A constraint the store refused to break.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstraintViolation {
    #[error("unique constraint {constraint} violated")]
    Unique { constraint: String },

    #[error("foreign key {constraint} violated")]
    ForeignKey { constraint: String },

    #[error("row not found in {table}")]
    MissingRow { table: &'static str },

    #[error("duplicate primary key in {table}")]
    DuplicateKey { table: &'static str },
}

impl ConstraintViolation {
    pub fn unique(constraint: &str) -> Self {
        Self::Unique {
            constraint: constraint.to_string(),
        }
    }

    pub fn foreign_key(constraint: &str) -> Self {
        Self::ForeignKey {
            constraint: constraint.to_string(),
        }
    }

    /// The violation a database error reports, if it is one.
    pub fn from_sqlx(err: &sqlx::Error) -> Option<Self> {
        let sqlx::Error::Database(db_err) = err else {
            return None;
        };
        let constraint = db_err.constraint().unwrap_or("unnamed");
        match db_err.kind() {
            sqlx::error::ErrorKind::UniqueViolation => Some(Self::unique(constraint)),
            sqlx::error::ErrorKind::ForeignKeyViolation => Some(Self::foreign_key(constraint)),
            _ => None,
        }
    }
}

/// Embedded schema migrations.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
