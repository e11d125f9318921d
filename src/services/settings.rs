// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Runtime settings lookup.

use std::collections::HashMap;
use std::sync::RwLock;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::db::Db;
use crate::error::{AppError, Result};
use crate::models::setting::{CANCEL_MINUTES_BEFORE, PAUSE_RESERVATIONS};
use crate::models::Setting;
use crate::time_utils::Clock;

/// Read access to key/value settings.
pub trait SettingsStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<String>>;
}

impl SettingsStore for Db {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<String>> {
        async move {
            match self.get_setting(key).await {
                Ok(setting) => setting.map(|s| s.value),
                Err(e) => {
                    tracing::warn!(key, error = %e, "Setting lookup failed; using default");
                    None
                }
            }
        }
        .boxed()
    }
}

/// In-memory settings, for tests and tooling.
#[derive(Debug, Default)]
pub struct StaticSettings {
    values: RwLock<HashMap<String, String>>,
}

impl StaticSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, key: &str, value: &str) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&self, key: &str, value: &str) {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
    }
}

impl SettingsStore for StaticSettings {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<String>> {
        let value = self
            .values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned();
        async move { value }.boxed()
    }
}

/// Integer setting; missing or unparseable values fall back to `default`.
pub async fn get_int(store: &dyn SettingsStore, key: &str, default: i64) -> i64 {
    match store.get(key).await {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Ignoring non-integer setting");
            default
        }),
        None => default,
    }
}

/// Boolean setting; only `"true"` (any case) is true.
pub async fn get_bool(store: &dyn SettingsStore, key: &str, default: bool) -> bool {
    match store.get(key).await {
        Some(raw) => raw.trim().eq_ignore_ascii_case("true"),
        None => default,
    }
}

pub async fn reservations_paused(store: &dyn SettingsStore) -> bool {
    get_bool(store, PAUSE_RESERVATIONS, false).await
}

pub async fn cancel_minutes_before(store: &dyn SettingsStore) -> i64 {
    get_int(
        store,
        CANCEL_MINUTES_BEFORE,
        crate::models::setting::DEFAULT_CANCEL_MINUTES_BEFORE,
    )
    .await
}

/// Upsert a setting.
pub async fn update_setting(db: &Db, clock: &dyn Clock, key: &str, value: &str) -> Result<Setting> {
    let key = key.trim();
    if key.is_empty() {
        return Err(AppError::BadRequest("Setting key must not be empty".to_string()));
    }

    let mut tx = db.begin().await?;
    tx.put_setting(key, value, clock.now());
    tx.commit().await?;

    tracing::info!(key, value, "Setting updated");

    db.get_setting(key)
        .await?
        .ok_or_else(|| AppError::Database(format!("setting {key} missing after write")))
}
