// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use crate::time_utils::StudioCalendar;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// PostgreSQL connection string
    pub database_url: String,
    /// Upper bound on pooled database connections
    pub database_max_connections: u32,
    /// Frontend origin allowed by CORS
    pub frontend_url: String,
    /// Firebase project whose ID tokens we accept
    pub firebase_project_id: String,
    /// Studio wall clock, minutes east of UTC
    pub studio_utc_offset_minutes: i32,
    /// Where uploaded medical certificates are written
    pub upload_dir: PathBuf,
    /// URL prefix uploads are served under
    pub upload_url_prefix: String,
    /// Largest accepted upload, in bytes
    pub max_upload_bytes: usize,
    /// Recipient of negative feedback
    pub feedback_email: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let studio_utc_offset_minutes = parse_or("STUDIO_UTC_OFFSET_MINUTES", -180)?;
        if StudioCalendar::from_offset_minutes(studio_utc_offset_minutes).is_none() {
            return Err(ConfigError::Invalid {
                name: "STUDIO_UTC_OFFSET_MINUTES",
                value: studio_utc_offset_minutes.to_string(),
            });
        }

        Ok(Self {
            port: parse_or("PORT", 8080)?,
            database_url: env::var("DATABASE_URL")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10)?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            firebase_project_id: env::var("FIREBASE_PROJECT_ID")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("FIREBASE_PROJECT_ID"))?,
            studio_utc_offset_minutes,
            upload_dir: env::var("UPLOAD_DIR")
                .unwrap_or_else(|_| "static/uploads".to_string())
                .into(),
            upload_url_prefix: env::var("UPLOAD_URL_PREFIX")
                .unwrap_or_else(|_| "/static/uploads".to_string()),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            feedback_email: env::var("FEEDBACK_EMAIL")
                .unwrap_or_else(|_| "admin@example.com".to_string()),
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            port: 8080,
            database_url: "postgres://localhost/pilates_test".to_string(),
            database_max_connections: 5,
            frontend_url: "http://localhost:5173".to_string(),
            firebase_project_id: "test-project".to_string(),
            studio_utc_offset_minutes: -180,
            upload_dir: std::env::temp_dir().join("pilates-booking-uploads"),
            upload_url_prefix: "/static/uploads".to_string(),
            max_upload_bytes: 1024 * 1024,
            feedback_email: "admin@example.com".to_string(),
        }
    }

    /// The studio's calendar. Falls back to UTC for an out-of-range offset.
    pub fn calendar(&self) -> StudioCalendar {
        StudioCalendar::from_offset_minutes(self.studio_utc_offset_minutes).unwrap_or_default()
    }
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}
