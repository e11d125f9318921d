// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pilates studio booking backend.
//!
//! Members hold prepaid class credits and reserve slots in scheduled
//! classes. Admins manage the timetable, standing weekly reservations and
//! members who have not signed up yet.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use std::sync::Arc;

use config::Config;
use db::Db;
use services::{
    AccountService, CancellationPolicy, Catalog, ConsoleMailer, FixedScheduleEngine,
    HolidayCalendar, IdentityProvider, Ledger, LocalMediaStore, LogNotifier, Mailer, MediaStore,
    MemberService, Notifier, SettingsStore, SlotAllocator,
};
use time_utils::{SharedClock, SystemClock};

/// External dependencies the services are wired to.
pub struct Collaborators {
    pub identity: Arc<dyn IdentityProvider>,
    pub clock: SharedClock,
    pub notifier: Arc<dyn Notifier>,
    pub mailer: Arc<dyn Mailer>,
    pub media: Arc<dyn MediaStore>,
    pub holidays: HolidayCalendar,
}

impl Collaborators {
    /// Local defaults: system clock, logging notifier and mailer, uploads on
    /// disk, the studio's holiday list.
    pub fn local(config: &Config, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            identity,
            clock: Arc::new(SystemClock),
            notifier: Arc::new(LogNotifier),
            mailer: Arc::new(ConsoleMailer),
            media: Arc::new(LocalMediaStore::new(
                config.upload_dir.clone(),
                config.upload_url_prefix.clone(),
            )),
            holidays: HolidayCalendar::studio(),
        }
    }
}

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Db,
    pub clock: SharedClock,
    pub identity: Arc<dyn IdentityProvider>,
    pub settings: Arc<dyn SettingsStore>,
    pub ledger: Ledger,
    pub catalog: Catalog,
    pub allocator: SlotAllocator,
    pub schedules: FixedScheduleEngine,
    pub cancellations: CancellationPolicy,
    pub accounts: AccountService,
    pub members: MemberService,
}

impl AppState {
    pub fn new(config: Config, db: Db, collaborators: Collaborators) -> Self {
        let Collaborators {
            identity,
            clock,
            notifier,
            mailer,
            media,
            holidays,
        } = collaborators;

        let settings: Arc<dyn SettingsStore> = Arc::new(db.clone());
        let ledger = Ledger::new(db.clone(), clock.clone());
        let schedules = FixedScheduleEngine::new(
            db.clone(),
            clock.clone(),
            config.calendar(),
            Arc::new(holidays),
        );

        Self {
            catalog: Catalog::new(db.clone(), clock.clone(), schedules.clone(), notifier),
            allocator: SlotAllocator::new(db.clone(), clock.clone(), settings.clone()),
            cancellations: CancellationPolicy::new(db.clone(), clock.clone(), settings.clone()),
            accounts: AccountService::new(
                db.clone(),
                clock.clone(),
                ledger.clone(),
                mailer,
                media,
                config.feedback_email.clone(),
            ),
            members: MemberService::new(db.clone(), clock.clone(), ledger.clone()),
            schedules,
            ledger,
            settings,
            identity,
            clock,
            db,
            config,
        }
    }
}
