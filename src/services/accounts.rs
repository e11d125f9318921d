// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Member self-service: sign-in, profile, account deletion, feedback and
//! medical certificates.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{Db, Transaction};
use crate::error::{AppError, Result};
use crate::models::user::normalize_dni;
use crate::models::{FixedSchedule, User};
use crate::services::firebase_auth::VerifiedIdentity;
use crate::services::ledger::Ledger;
use crate::services::merge::{merge_shadow_into, MergeReport};
use crate::services::notify::{Mailer, MediaStore};
use crate::time_utils::SharedClock;

/// Display name left on an anonymized account.
pub const DELETED_USER_NAME: &str = "Usuario Eliminado";

/// Accepted certificate uploads and the extension they are stored under.
const CERTIFICATE_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
    ("image/heic", "heic"),
    ("image/heif", "heif"),
    ("application/pdf", "pdf"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
}

impl Sentiment {
    fn as_str(self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
        }
    }
}

/// Profile fields a member may change. `None` leaves a field unchanged;
/// an empty phone clears it.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub dni: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Profile {
    pub user: User,
    pub balance: i64,
}

#[derive(Debug, Clone)]
pub struct ProfileUpdated {
    pub user: User,
    /// Present when claiming the DNI folded a shadow account in.
    pub merged: Option<MergeReport>,
}

#[derive(Clone)]
pub struct AccountService {
    db: Db,
    clock: SharedClock,
    ledger: Ledger,
    mailer: Arc<dyn Mailer>,
    media: Arc<dyn MediaStore>,
    feedback_email: String,
}

impl AccountService {
    pub fn new(
        db: Db,
        clock: SharedClock,
        ledger: Ledger,
        mailer: Arc<dyn Mailer>,
        media: Arc<dyn MediaStore>,
        feedback_email: impl Into<String>,
    ) -> Self {
        Self {
            db,
            clock,
            ledger,
            mailer,
            media,
            feedback_email: feedback_email.into(),
        }
    }

    // ─── Sign-in ─────────────────────────────────────────────────

    /// Find the member for a verified identity, creating one on first
    /// sign-in. Fills in a missing name and keeps provider and subject
    /// current.
    pub async fn login(&self, identity: &VerifiedIdentity) -> Result<User> {
        let email = identity
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AppError::BadRequest("Identity token carries no email".to_string()))?
            .to_lowercase();

        let user = match self.db.find_user_by_email(&email).await? {
            Some(existing) => self.refresh_identity(existing, identity).await?,
            None => self.create_federated(&email, identity).await?,
        };

        if !user.is_active() {
            tracing::warn!(user_id = %user.id, "Sign-in rejected for disabled account");
            return Err(AppError::Unauthorized);
        }
        Ok(user)
    }

    async fn create_federated(&self, email: &str, identity: &VerifiedIdentity) -> Result<User> {
        let mut user = User::federated(
            email,
            identity.provider,
            identity.subject.clone(),
            self.clock.now(),
        );
        user.full_name = identity.name.clone();

        let mut tx = self.db.begin().await?;
        tx.insert_user(user.clone());
        match tx.commit().await {
            Ok(()) => {
                tracing::info!(user_id = %user.id, provider = ?user.provider, "New member signed up");
                Ok(user)
            }
            Err(AppError::Conflict(reason)) => {
                // First sign-in raced with itself.
                self.db
                    .find_user_by_email(email)
                    .await?
                    .ok_or(AppError::Conflict(reason))
            }
            Err(e) => Err(e),
        }
    }

    async fn refresh_identity(&self, existing: User, identity: &VerifiedIdentity) -> Result<User> {
        let mut updated = existing.clone();
        if updated.full_name.is_none() {
            updated.full_name = identity.name.clone();
        }
        updated.provider = identity.provider;
        updated.social_id = Some(identity.subject.clone());

        if updated == existing {
            return Ok(existing);
        }

        let mut tx = self.db.begin().await?;
        tx.lock_user(existing.id).await?;
        tx.update_user(updated.clone());
        tx.commit().await?;
        Ok(updated)
    }

    // ─── Profile ─────────────────────────────────────────────────

    pub async fn profile(&self, user_id: Uuid) -> Result<Profile> {
        let user = self.load(user_id).await?;
        let balance = self.ledger.balance(user_id).await?;
        Ok(Profile { user, balance })
    }

    /// Apply profile changes. Claiming a DNI held by a shadow account
    /// merges that account in; a DNI held by a federated account is
    /// rejected.
    pub async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> Result<ProfileUpdated> {
        if update.full_name.is_none() && update.phone.is_none() && update.dni.is_none() {
            return Err(AppError::BadRequest("Nothing to update".to_string()));
        }
        let current = self.load(user_id).await?;

        let full_name = update.full_name.map(|n| n.trim().to_string());
        if full_name.as_deref() == Some("") {
            return Err(AppError::BadRequest("full_name must not be empty".to_string()));
        }
        let phone = update.phone.map(|p| {
            let p = p.trim().to_string();
            (!p.is_empty()).then_some(p)
        });
        let edit = |user: &mut User| {
            if let Some(name) = full_name.clone() {
                user.full_name = Some(name);
            }
            if let Some(phone) = phone.clone() {
                user.phone = phone;
            }
        };

        let new_dni = match update.dni {
            Some(raw) => Some(
                normalize_dni(&raw)
                    .ok_or_else(|| AppError::BadRequest("DNI must contain only digits".to_string()))?,
            ),
            None => None,
        };

        let claim = new_dni.filter(|dni| current.dni.as_deref() != Some(dni.as_str()));
        let Some(dni) = claim else {
            let mut tx = self.db.begin().await?;
            tx.lock_user(user_id).await?;
            let mut user = load_locked(&mut tx, user_id).await?;
            edit(&mut user);
            tx.update_user(user.clone());
            tx.commit().await?;
            return Ok(ProfileUpdated { user, merged: None });
        };

        match self.db.find_user_by_dni(&dni).await? {
            Some(holder) if holder.is_shadow() => {
                let (user, report) = merge_shadow_into(&self.db, holder.id, user_id, &dni, edit).await?;
                Ok(ProfileUpdated {
                    user,
                    merged: Some(report),
                })
            }
            Some(_) => Err(AppError::Conflict(
                "This DNI is already registered to another account".to_string(),
            )),
            None => {
                let mut tx = self.db.begin().await?;
                tx.lock_user(user_id).await?;
                let mut user = load_locked(&mut tx, user_id).await?;
                edit(&mut user);
                user.dni = Some(dni);
                tx.update_user(user.clone());
                tx.commit().await?;
                Ok(ProfileUpdated { user, merged: None })
            }
        }
    }

    pub async fn set_fcm_token(&self, user_id: Uuid, token: Option<String>) -> Result<()> {
        let token = token.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());

        let mut tx = self.db.begin().await?;
        tx.lock_user(user_id).await?;
        let user = load_locked(&mut tx, user_id).await?;
        tx.update_user(User {
            fcm_token: token,
            ..user
        });
        tx.commit().await
    }

    /// Soft-delete: anonymize the row, cancel upcoming bookings without
    /// refund and stop fixed schedules.
    pub async fn delete_account(&self, user_id: Uuid) -> Result<usize> {
        let now = self.clock.now();

        let mut tx = self.db.begin().await?;
        tx.lock_schedule_rules().await?;
        tx.lock_user(user_id).await?;
        let user = load_locked(&mut tx, user_id).await?;
        if user.is_deleted {
            return Err(AppError::Conflict("Account already deleted".to_string()));
        }

        let upcoming: Vec<_> = tx
            .bookings_with_classes_for_user(user_id)
            .await?
            .into_iter()
            .filter(|(b, c)| b.is_confirmed() && c.start_time > now)
            .collect();
        tx.lock_classes(upcoming.iter().map(|(_, c)| c.id)).await?;
        for (booking, _) in &upcoming {
            tx.put_booking(booking.cancelled(now));
        }

        for rule in tx.fixed_schedules_for_user(user_id).await? {
            if rule.is_active() {
                tx.put_fixed_schedule(FixedSchedule {
                    cancelled_at: Some(now),
                    ..rule
                });
            }
        }

        tx.update_user(User {
            email: format!("deleted_{}_{}@deleted.local", user.id, now.timestamp()),
            full_name: Some(DELETED_USER_NAME.to_string()),
            dni: None,
            phone: None,
            social_id: Some(format!("deleted_{}", user.id)),
            medical_certificate_url: None,
            fcm_token: None,
            disabled: true,
            is_deleted: true,
            ..user
        });
        tx.commit().await?;

        tracing::info!(%user_id, bookings_cancelled = upcoming.len(), "Account deleted");
        Ok(upcoming.len())
    }

    // ─── Feedback & documents ────────────────────────────────────

    /// Record the member's one-time feedback. Negative feedback with a
    /// message is forwarded to the studio by email.
    pub async fn submit_feedback(
        &self,
        user_id: Uuid,
        sentiment: Sentiment,
        message: Option<String>,
    ) -> Result<()> {
        let mut tx = self.db.begin().await?;
        tx.lock_user(user_id).await?;
        let user = load_locked(&mut tx, user_id).await?;
        if user.has_given_feedback {
            return Err(AppError::Conflict("Feedback already submitted".to_string()));
        }
        tx.update_user(User {
            has_given_feedback: true,
            feedback_sentiment: Some(sentiment.as_str().to_string()),
            ..user.clone()
        });
        tx.commit().await?;

        tracing::info!(%user_id, sentiment = sentiment.as_str(), "Feedback recorded");

        let message = message.map(|m| m.trim().to_string()).filter(|m| !m.is_empty());
        if let (Sentiment::Negative, Some(message)) = (sentiment, message) {
            let who = user.full_name.as_deref().unwrap_or(&user.email);
            let body = format!("From: {who} <{}>\n\n{message}", user.email);
            if let Err(e) = self
                .mailer
                .send(&self.feedback_email, "Negative feedback", &body)
                .await
            {
                tracing::error!(error = %e, %user_id, "Failed to forward feedback");
            }
        }
        Ok(())
    }

    /// Store a medical certificate and point the profile at it.
    pub async fn upload_medical_certificate(
        &self,
        user_id: Uuid,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<User> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        let extension = CERTIFICATE_TYPES
            .iter()
            .find(|(accepted, _)| *accepted == mime)
            .map(|(_, ext)| *ext)
            .ok_or_else(|| {
                AppError::BadRequest(format!("Unsupported certificate type: {content_type}"))
            })?;
        if bytes.is_empty() {
            return Err(AppError::BadRequest("Empty upload".to_string()));
        }
        self.load(user_id).await?;

        let url = self.media.store(user_id, extension, bytes).await?;

        let mut tx = self.db.begin().await?;
        tx.lock_user(user_id).await?;
        let user = User {
            medical_certificate_url: Some(url),
            ..load_locked(&mut tx, user_id).await?
        };
        tx.update_user(user.clone());
        tx.commit().await?;

        tracing::info!(%user_id, extension, "Medical certificate uploaded");
        Ok(user)
    }

    async fn load(&self, user_id: Uuid) -> Result<User> {
        self.db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {user_id}")))
    }
}

async fn load_locked(tx: &mut Transaction, user_id: Uuid) -> Result<User> {
    tx.get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {user_id}")))
}
