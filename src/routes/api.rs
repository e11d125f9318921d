// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for signed-in members.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, patch, post},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

use crate::error::Result;
use crate::middleware::{AuthUser, ValidatedJson};
use crate::routes::views::{
    BookingResponse, BookingWithClass, CancelBookingResponse, ClassListing, ClassResponse,
    MergeSummary, UserResponse,
};
use crate::services::accounts::{ProfileUpdate, Sentiment};
use crate::AppState;

/// API routes (require authentication).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me).patch(update_me).delete(delete_me))
        .route("/api/me/fcm-token", patch(set_fcm_token))
        .route("/api/me/feedback", post(submit_feedback))
        .route(
            "/api/me/medical-certificate",
            post(upload_medical_certificate).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/api/gym-classes", get(list_classes))
        .route("/api/gym-classes/{id}/book", post(book_class))
        .route("/api/my-bookings", get(my_bookings))
        .route("/api/bookings/{id}/cancel", post(cancel_booking))
}

// ─── Profile ─────────────────────────────────────────────────

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let profile = state.accounts.profile(auth.id()).await?;
    Ok(Json(UserResponse::new(&profile.user, profile.balance)))
}

#[derive(Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 120))]
    pub full_name: Option<String>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub dni: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UpdateProfileResponse {
    pub user: UserResponse,
    /// Set when the new DNI folded an admin-created account into this one
    pub merged: Option<MergeSummary>,
}

/// Update name, phone or DNI.
async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<UpdateProfileRequest>,
) -> Result<Json<UpdateProfileResponse>> {
    let updated = state
        .accounts
        .update_profile(
            auth.id(),
            ProfileUpdate {
                full_name: body.full_name,
                phone: body.phone,
                dni: body.dni,
            },
        )
        .await?;

    if let Some(report) = &updated.merged {
        tracing::info!(
            user_id = %auth.id(),
            bookings_moved = report.bookings_moved,
            credits_moved = report.credits_moved,
            "Profile update merged a shadow account"
        );
    }

    let balance = state.ledger.balance(updated.user.id).await?;
    Ok(Json(UpdateProfileResponse {
        user: UserResponse::new(&updated.user, balance),
        merged: updated.merged.as_ref().map(MergeSummary::from),
    }))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteAccountResponse {
    pub success: bool,
    pub bookings_cancelled: u32,
}

/// Delete the caller's account (soft delete with anonymization).
async fn delete_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<DeleteAccountResponse>> {
    tracing::info!(user_id = %auth.id(), "User-initiated account deletion");

    let cancelled = state.accounts.delete_account(auth.id()).await?;
    Ok(Json(DeleteAccountResponse {
        success: true,
        bookings_cancelled: cancelled as u32,
    }))
}

#[derive(Deserialize, Validate)]
pub struct FcmTokenRequest {
    /// `null` clears the token
    #[validate(length(max = 4096))]
    pub fcm_token: Option<String>,
}

async fn set_fcm_token(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<FcmTokenRequest>,
) -> Result<StatusCode> {
    state.accounts.set_fcm_token(auth.id(), body.fcm_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize, Validate)]
pub struct FeedbackRequest {
    pub sentiment: Sentiment,
    #[validate(length(max = 2000))]
    pub message: Option<String>,
}

async fn submit_feedback(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<FeedbackRequest>,
) -> Result<StatusCode> {
    state
        .accounts
        .submit_feedback(auth.id(), body.sentiment, body.message)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Upload a medical certificate. The request body is the raw file; its
/// type comes from `Content-Type`.
async fn upload_medical_certificate(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UserResponse>> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let user = state
        .accounts
        .upload_medical_certificate(auth.id(), content_type, body.to_vec())
        .await?;
    let balance = state.ledger.balance(user.id).await?;
    Ok(Json(UserResponse::new(&user, balance)))
}

// ─── Classes ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct ClassesQuery {
    /// Studio-local date (YYYY-MM-DD); defaults to everything from now on
    date: Option<NaiveDate>,
}

/// Timetable as seen by the caller.
async fn list_classes(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<ClassesQuery>,
) -> Result<Json<Vec<ClassListing>>> {
    let (from, to) = match params.date {
        Some(date) => {
            let (start, end) = state.schedules.calendar().day_bounds(date);
            (start, Some(end))
        }
        None => (state.clock.now(), None),
    };

    let summaries = state
        .catalog
        .list_classes(Some(from), to, Some(auth.id()), false)
        .await?;
    Ok(Json(summaries.iter().map(ClassListing::from).collect()))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct BookClassResponse {
    pub booking: BookingResponse,
    pub class: ClassResponse,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub remaining_credits: i64,
}

/// Reserve a slot, spending one credit.
async fn book_class(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(class_id): Path<Uuid>,
) -> Result<(StatusCode, Json<BookClassResponse>)> {
    let outcome = state.allocator.book(auth.id(), class_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(BookClassResponse {
            booking: BookingResponse::from(&outcome.booking),
            class: ClassResponse::from(&outcome.class),
            remaining_credits: outcome.remaining_credits,
        }),
    ))
}

// ─── Bookings ────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MyBooking {
    #[serde(flatten)]
    #[cfg_attr(feature = "binding-generation", ts(flatten))]
    pub entry: BookingWithClass,
    pub booked_slots: u32,
    pub can_cancel: bool,
}

/// The caller's bookings, newest class first.
async fn my_bookings(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<MyBooking>>> {
    let now = state.clock.now();
    let mut rows = state.db.bookings_with_classes_for_user(auth.id()).await?;
    rows.reverse();

    let mut bookings = Vec::with_capacity(rows.len());
    for row in &rows {
        let (booking, class) = row;
        bookings.push(MyBooking {
            booked_slots: state.db.confirmed_count(class.id).await? as u32,
            can_cancel: booking.is_confirmed() && class.start_time > now,
            entry: BookingWithClass::from(row),
        });
    }
    Ok(Json(bookings))
}

/// Cancel one of the caller's bookings. Refunds the credit when far
/// enough ahead of the class.
async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<CancelBookingResponse>> {
    let outcome = state
        .cancellations
        .cancel_booking(booking_id, auth.id())
        .await?;
    Ok(Json(CancelBookingResponse {
        booking: BookingResponse::from(&outcome.booking),
        refunded: outcome.refunded,
    }))
}
