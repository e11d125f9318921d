// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod accounts;
pub mod booking;
pub mod cancellation;
pub mod catalog;
pub mod firebase_auth;
pub mod fixed_schedule;
pub mod holidays;
pub mod identity;
pub mod ledger;
pub mod members;
pub mod merge;
pub mod notify;
pub mod settings;

pub use accounts::AccountService;
pub use booking::SlotAllocator;
pub use cancellation::CancellationPolicy;
pub use catalog::Catalog;
pub use firebase_auth::{FirebaseVerifier, IdentityError, IdentityProvider, VerifiedIdentity};
pub use fixed_schedule::FixedScheduleEngine;
pub use holidays::HolidayCalendar;
pub use ledger::Ledger;
pub use members::MemberService;
pub use notify::{ConsoleMailer, LocalMediaStore, LogNotifier, Mailer, MediaStore, Notifier};
pub use settings::SettingsStore;
