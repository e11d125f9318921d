// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Resolving admin-supplied user references, creating shadow accounts on
//! demand.
//!
//! Admins book or schedule members by DNI before those members have ever
//! signed in. A shadow account (provider `LOCAL`) holds their bookings and
//! credits until a federated account claims the DNI.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::Db;
use crate::error::{AppError, Result};
use crate::models::user::{normalize_dni, shadow_email};
use crate::models::User;

/// How an admin identifies the member an action applies to.
#[derive(Debug, Clone)]
pub enum UserRef {
    Existing(Uuid),
    Dni {
        dni: String,
        full_name: Option<String>,
        is_trial: bool,
    },
}

impl UserRef {
    /// Build from the loose fields admin endpoints accept.
    pub fn from_parts(
        user_id: Option<Uuid>,
        dni: Option<String>,
        full_name: Option<String>,
        is_trial: bool,
    ) -> Result<Self> {
        match (user_id, dni) {
            (Some(id), _) => Ok(UserRef::Existing(id)),
            (None, Some(dni)) => Ok(UserRef::Dni {
                dni,
                full_name,
                is_trial,
            }),
            (None, None) => Err(AppError::BadRequest(
                "Either user_id or dni is required".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedUser {
    pub user: User,
    pub created: bool,
}

/// Find the referenced user, creating a shadow account if a DNI matches
/// nobody.
///
/// Lookup order for a DNI: the `dni` column, then the shadow placeholder
/// email. Creating requires a full name. Two concurrent creations for the
/// same DNI collapse onto whichever commits first.
pub async fn resolve_or_create_shadow(
    db: &Db,
    reference: UserRef,
    now: DateTime<Utc>,
) -> Result<ResolvedUser> {
    let (raw_dni, full_name, is_trial) = match reference {
        UserRef::Existing(id) => {
            let user = db
                .get_user(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("user {id}")))?;
            return Ok(ResolvedUser {
                user,
                created: false,
            });
        }
        UserRef::Dni {
            dni,
            full_name,
            is_trial,
        } => (dni, full_name, is_trial),
    };

    let dni = normalize_dni(&raw_dni)
        .ok_or_else(|| AppError::BadRequest("DNI must contain only digits".to_string()))?;

    if let Some(user) = find_by_dni(db, &dni).await? {
        return Ok(ResolvedUser {
            user,
            created: false,
        });
    }

    let full_name = full_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            AppError::BadRequest("full_name is required to create a new member".to_string())
        })?;

    let shadow = User::shadow(&dni, full_name, is_trial, now);
    let mut tx = db.begin().await?;
    tx.insert_user(shadow.clone());
    match tx.commit().await {
        Ok(()) => {
            tracing::info!(user_id = %shadow.id, dni = %dni, "Created shadow user");
            Ok(ResolvedUser {
                user: shadow,
                created: true,
            })
        }
        Err(AppError::Conflict(reason)) => {
            // Lost a creation race for this DNI; use the winner.
            let user = find_by_dni(db, &dni)
                .await?
                .ok_or(AppError::Conflict(reason))?;
            Ok(ResolvedUser {
                user,
                created: false,
            })
        }
        Err(e) => Err(e),
    }
}

/// Admin-initiated shadow creation. Rejects a DNI that is already taken.
pub async fn create_shadow_user(
    db: &Db,
    raw_dni: &str,
    full_name: &str,
    is_trial: bool,
    now: DateTime<Utc>,
) -> Result<User> {
    let dni = normalize_dni(raw_dni)
        .ok_or_else(|| AppError::BadRequest("DNI must contain only digits".to_string()))?;
    let full_name = full_name.trim();
    if full_name.is_empty() {
        return Err(AppError::BadRequest("full_name is required".to_string()));
    }

    if find_by_dni(db, &dni).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "A user with DNI {dni} already exists"
        )));
    }

    let shadow = User::shadow(&dni, full_name, is_trial, now);
    let mut tx = db.begin().await?;
    tx.insert_user(shadow.clone());
    tx.commit().await?;

    tracing::info!(user_id = %shadow.id, dni = %dni, "Admin created shadow user");
    Ok(shadow)
}

async fn find_by_dni(db: &Db, dni: &str) -> Result<Option<User>> {
    match db.find_user_by_dni(dni).await? {
        Some(user) => Ok(Some(user)),
        None => db.find_user_by_email(&shadow_email(dni)).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_creates_then_reuses_shadow() {
        let db = Db::in_memory();
        let now = Utc::now();

        let first = resolve_or_create_shadow(
            &db,
            UserRef::Dni {
                dni: "30111222".to_string(),
                full_name: Some("Ana".to_string()),
                is_trial: false,
            },
            now,
        )
        .await
        .unwrap();
        assert!(first.created);
        assert_eq!(first.user.dni.as_deref(), Some("30111222"));

        let second = resolve_or_create_shadow(
            &db,
            UserRef::Dni {
                dni: " 30111222 ".to_string(),
                full_name: None,
                is_trial: false,
            },
            now,
        )
        .await
        .unwrap();
        assert!(!second.created);
        assert_eq!(second.user.id, first.user.id);
    }

    #[tokio::test]
    async fn test_unknown_dni_without_name_rejected() {
        let db = Db::in_memory();
        let err = resolve_or_create_shadow(
            &db,
            UserRef::Dni {
                dni: "999".to_string(),
                full_name: Some("  ".to_string()),
                is_trial: false,
            },
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_concurrent_creation_yields_one_user() {
        let db = Db::in_memory();
        let now = Utc::now();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let db = db.clone();
                tokio::spawn(async move {
                    resolve_or_create_shadow(
                        &db,
                        UserRef::Dni {
                            dni: "777".to_string(),
                            full_name: Some("Race".to_string()),
                            is_trial: false,
                        },
                        now,
                    )
                    .await
                    .unwrap()
                    .user
                    .id
                })
            })
            .collect();

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(db.search_users(None, 0, 100).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_admin_create_rejects_taken_dni() {
        let db = Db::in_memory();
        create_shadow_user(&db, "123", "One", false, Utc::now())
            .await
            .unwrap();
        let err = create_shadow_user(&db, " 123 ", "Two", false, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_dni_with_non_digits_is_rejected_not_stripped() {
        let db = Db::in_memory();
        create_shadow_user(&db, "7", "Seven", false, Utc::now())
            .await
            .unwrap();

        let err = resolve_or_create_shadow(
            &db,
            UserRef::Dni {
                dni: "abc7xyz".to_string(),
                full_name: Some("Someone Else".to_string()),
                is_trial: false,
            },
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = create_shadow_user(&db, "1-2-3", "Dashes", false, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(db.search_users(None, 0, 100).await.unwrap().len(), 1);
    }
}
