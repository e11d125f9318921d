// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Studio members, both federated and shadow accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Domain used for the placeholder email of shadow accounts.
pub const SHADOW_EMAIL_DOMAIN: &str = "local.placeholder";

/// How a user authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Provider {
    Google,
    Apple,
    Microsoft,
    /// Shadow account created by an admin; cannot sign in.
    Local,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Google => "GOOGLE",
            Provider::Apple => "APPLE",
            Provider::Microsoft => "MICROSOFT",
            Provider::Local => "LOCAL",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "GOOGLE" => Some(Provider::Google),
            "APPLE" => Some(Provider::Apple),
            "MICROSOFT" => Some(Provider::Microsoft),
            "LOCAL" => Some(Provider::Local),
            _ => None,
        }
    }

    /// Map an identity token's `sign_in_provider` claim.
    pub fn from_sign_in_provider(value: &str) -> Option<Self> {
        match value {
            "google.com" => Some(Provider::Google),
            "apple.com" => Some(Provider::Apple),
            "microsoft.com" => Some(Provider::Microsoft),
            _ => None,
        }
    }
}

/// A studio member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    /// National ID, digits only. Unique across users.
    pub dni: Option<String>,
    pub phone: Option<String>,
    pub provider: Provider,
    pub social_id: Option<String>,
    pub medical_certificate_url: Option<String>,
    pub is_admin: bool,
    pub disabled: bool,
    pub is_trial: bool,
    pub is_deleted: bool,
    pub has_given_feedback: bool,
    pub feedback_sentiment: Option<String>,
    #[serde(skip_serializing)]
    pub fcm_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// New federated account, as created on first sign-in.
    pub fn federated(
        email: impl Into<String>,
        provider: Provider,
        social_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            full_name: None,
            dni: None,
            phone: None,
            provider,
            social_id: Some(social_id.into()),
            medical_certificate_url: None,
            is_admin: false,
            disabled: false,
            is_trial: false,
            is_deleted: false,
            has_given_feedback: false,
            feedback_sentiment: None,
            fcm_token: None,
            created_at: now,
        }
    }

    /// New shadow account keyed by DNI.
    pub fn shadow(dni: &str, full_name: impl Into<String>, is_trial: bool, now: DateTime<Utc>) -> Self {
        Self {
            full_name: Some(full_name.into()),
            dni: Some(dni.to_string()),
            is_trial,
            ..Self::federated(
                shadow_email(dni),
                Provider::Local,
                shadow_social_id(dni),
                now,
            )
        }
    }

    pub fn is_shadow(&self) -> bool {
        self.provider == Provider::Local
    }

    /// Can sign in and act through the API.
    pub fn is_active(&self) -> bool {
        !self.disabled && !self.is_deleted
    }
}

pub fn shadow_email(dni: &str) -> String {
    format!("{dni}@{SHADOW_EMAIL_DOMAIN}")
}

pub fn shadow_social_id(dni: &str) -> String {
    format!("local_{dni}")
}

/// Trim a DNI. Returns `None` unless what is left is all ASCII digits.
pub fn normalize_dni(raw: &str) -> Option<String> {
    let dni = raw.trim();
    (!dni.is_empty() && dni.bytes().all(|b| b.is_ascii_digit())).then(|| dni.to_string())
}
