// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use chrono::{DateTime, Duration, Utc};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use pilates_booking::config::Config;
use pilates_booking::db::Db;
use pilates_booking::models::{GymClass, Provider, User};
use pilates_booking::routes::create_router;
use pilates_booking::services::catalog::NewClass;
use pilates_booking::services::{
    HolidayCalendar, IdentityError, IdentityProvider, Mailer, MediaStore, Notifier,
    VerifiedIdentity,
};
use pilates_booking::time_utils::FixedClock;
use pilates_booking::{AppState, Collaborators};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

/// Monday 2026-05-04, 09:00 in the studio (UTC-3).
#[allow(dead_code)]
pub fn test_now() -> DateTime<Utc> {
    "2026-05-04T12:00:00Z".parse().unwrap()
}

/// Bearer token the static identity provider accepts for `email`.
#[allow(dead_code)]
pub fn token_for(email: &str) -> String {
    format!("token-{email}")
}

/// Identity provider backed by a fixed token table.
#[derive(Default)]
pub struct StaticIdentity {
    tokens: Mutex<HashMap<String, VerifiedIdentity>>,
}

impl StaticIdentity {
    pub fn register(&self, email: &str, name: &str) -> String {
        let token = token_for(email);
        self.tokens.lock().unwrap().insert(
            token.clone(),
            VerifiedIdentity {
                subject: format!("sub-{email}"),
                email: Some(email.to_string()),
                name: Some(name.to_string()),
                provider: Provider::Google,
            },
        );
        token
    }
}

impl IdentityProvider for StaticIdentity {
    fn verify<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<VerifiedIdentity, IdentityError>> {
        let found = self.tokens.lock().unwrap().get(token).cloned();
        async move { found.ok_or_else(|| IdentityError::Invalid("unknown token".to_string())) }
            .boxed()
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(Vec<String>, String)>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, device_tokens: Vec<String>, title: &str, _body: &str) {
        self.sent
            .lock()
            .unwrap()
            .push((device_tokens, title.to_string()));
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl Mailer for RecordingMailer {
    fn send<'a>(
        &'a self,
        to: &'a str,
        _subject: &'a str,
        body: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        async { Ok(()) }.boxed()
    }
}

#[derive(Default)]
pub struct MemoryMedia {
    pub stored: Mutex<Vec<(Uuid, String, usize)>>,
}

impl MediaStore for MemoryMedia {
    fn store<'a>(
        &'a self,
        owner: Uuid,
        extension: &'a str,
        bytes: Vec<u8>,
    ) -> BoxFuture<'a, anyhow::Result<String>> {
        self.stored
            .lock()
            .unwrap()
            .push((owner, extension.to_string(), bytes.len()));
        let url = format!("/static/uploads/{owner}.{extension}");
        async move { Ok(url) }.boxed()
    }
}

/// A fully wired app over an in-memory store, a fixed clock and recording
/// collaborators.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub clock: Arc<FixedClock>,
    pub identity: Arc<StaticIdentity>,
    pub notifier: Arc<RecordingNotifier>,
    pub mailer: Arc<RecordingMailer>,
    pub media: Arc<MemoryMedia>,
}

#[allow(dead_code)]
impl TestApp {
    pub fn new() -> Self {
        Self::with_holidays(HolidayCalendar::studio())
    }

    pub fn with_holidays(holidays: HolidayCalendar) -> Self {
        Self::build(Db::in_memory(), holidays)
    }

    /// Same wiring over a caller-supplied store.
    pub fn with_db(db: Db) -> Self {
        Self::build(db, HolidayCalendar::studio())
    }

    fn build(db: Db, holidays: HolidayCalendar) -> Self {
        let clock = Arc::new(FixedClock::new(test_now()));
        let identity = Arc::new(StaticIdentity::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let mailer = Arc::new(RecordingMailer::default());
        let media = Arc::new(MemoryMedia::default());

        let collaborators = Collaborators {
            identity: identity.clone(),
            clock: clock.clone(),
            notifier: notifier.clone(),
            mailer: mailer.clone(),
            media: media.clone(),
            holidays,
        };
        let state = Arc::new(AppState::new(
            Config::test_default(),
            db,
            collaborators,
        ));

        Self {
            router: create_router(state.clone()),
            state,
            clock,
            identity,
            notifier,
            mailer,
            media,
        }
    }

    /// Register a federated member and sign them in once.
    pub async fn member(&self, email: &str, name: &str) -> User {
        self.identity.register(email, name);
        let identity = VerifiedIdentity {
            subject: format!("sub-{email}"),
            email: Some(email.to_string()),
            name: Some(name.to_string()),
            provider: Provider::Google,
        };
        self.state.accounts.login(&identity).await.unwrap()
    }

    pub async fn admin(&self, email: &str, name: &str) -> User {
        let user = self.member(email, name).await;
        let mut tx = self.state.db.begin().await.unwrap();
        tx.lock_user(user.id).await.unwrap();
        let admin = User {
            is_admin: true,
            ..user
        };
        tx.update_user(admin.clone());
        tx.commit().await.unwrap();
        admin
    }

    /// Give a member `amount` credits with no expiry.
    pub async fn grant(&self, user_id: Uuid, amount: i32) {
        self.state
            .ledger
            .apply_entry(user_id, amount, None)
            .await
            .unwrap();
    }

    /// A single class starting `hours_from_now` hours after the test clock.
    pub async fn class_in_hours(&self, hours_from_now: i64, max_slots: u32) -> GymClass {
        let start = self.clock_now() + Duration::hours(hours_from_now);
        self.class_at(start, max_slots).await
    }

    pub async fn class_at(&self, start: DateTime<Utc>, max_slots: u32) -> GymClass {
        let created = self
            .state
            .catalog
            .create_class(NewClass {
                name: Some("Reformer".to_string()),
                instructor: "Laura".to_string(),
                start_time: start,
                duration_minutes: None,
                max_slots: Some(max_slots),
                is_recurring: false,
            })
            .await
            .unwrap();
        created.classes.into_iter().next().unwrap()
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        use pilates_booking::time_utils::Clock;
        self.clock.now()
    }

    pub async fn balance(&self, user_id: Uuid) -> i64 {
        self.state.ledger.balance(user_id).await.unwrap()
    }

    /// Send a request through the router, returning status and JSON body
    /// (`Null` when empty).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}
