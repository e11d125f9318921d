// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin routes: timetable, standing reservations, members and settings.
//!
//! Both the auth and admin middleware are applied in routes/mod.rs.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
    Json, Router,
};
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::ValidatedJson;
use crate::models::DayOfWeek;
use crate::routes::views::{
    AttendeeResponse, BookingResponse, BookingWithClass, CancelBookingResponse, ClassListing,
    ClassResponse, CreditResponse, FixedScheduleResponse, InstructorResponse, UserResponse,
};
use crate::services::catalog::{ClassUpdate, NewClass};
use crate::services::identity::UserRef;
use crate::services::members::{Flag, MemberUpdate, MAX_PAGE_SIZE};
use crate::services::settings::update_setting;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/gym-classes", get(list_classes).post(create_class))
        .route(
            "/admin/gym-classes/{id}",
            get(class_detail).patch(update_class).delete(cancel_class),
        )
        .route("/admin/gym-classes/{id}/manual-book", post(manual_book))
        .route("/admin/fixed-schedules", post(create_fixed_schedule))
        .route("/admin/fixed-schedules/{id}", delete(cancel_fixed_schedule))
        .route(
            "/admin/instructors",
            get(list_instructors).post(create_instructor),
        )
        .route(
            "/admin/instructors/{id}",
            patch(update_instructor).delete(delete_instructor),
        )
        .route("/admin/users", get(search_users).post(create_shadow_user))
        .route("/admin/users/{id}", get(user_detail))
        .route("/admin/users/{id}/details", patch(update_user_details))
        .route("/admin/users/{id}/toggle-disabled", patch(toggle_disabled))
        .route("/admin/users/{id}/toggle-admin", patch(toggle_admin))
        .route("/admin/users/{id}/toggle-trial", patch(toggle_trial))
        .route("/admin/users/{id}/credits", post(apply_credit))
        .route("/admin/users/{id}/bookings", get(user_bookings))
        .route("/admin/users/{id}/fixed-schedules", get(user_fixed_schedules))
        .route("/admin/bookings/{id}", delete(cancel_booking))
        .route("/admin/settings/{key}", patch(put_setting))
}

// ─── Classes ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct AdminClassesQuery {
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    #[serde(default)]
    include_cancelled: bool,
}

async fn list_classes(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AdminClassesQuery>,
) -> Result<Json<Vec<ClassListing>>> {
    let summaries = state
        .catalog
        .list_classes(params.from, params.to, None, params.include_cancelled)
        .await?;
    Ok(Json(summaries.iter().map(ClassListing::from).collect()))
}

#[derive(Deserialize, Validate)]
pub struct CreateClassRequest {
    #[validate(length(max = 120))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub instructor: String,
    pub start_time: DateTime<Utc>,
    #[validate(range(min = 1, max = 480))]
    pub duration_minutes: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub max_slots: Option<u32>,
    #[serde(default)]
    pub is_recurring: bool,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CreateClassResponse {
    pub classes: Vec<ClassResponse>,
    /// Fixed-schedule bookings made into the new classes
    pub bookings_created: u32,
    /// Credits granted instead of bookings on holidays
    pub holiday_credits: u32,
}

/// Create a class, or a twelve-week recurring series.
async fn create_class(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<CreateClassRequest>,
) -> Result<(StatusCode, Json<CreateClassResponse>)> {
    let created = state
        .catalog
        .create_class(NewClass {
            name: body.name,
            instructor: body.instructor,
            start_time: body.start_time,
            duration_minutes: body.duration_minutes,
            max_slots: body.max_slots,
            is_recurring: body.is_recurring,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateClassResponse {
            classes: created.classes.iter().map(ClassResponse::from).collect(),
            bookings_created: created.auto_booking.bookings_created as u32,
            holiday_credits: created.auto_booking.holiday_credits as u32,
        }),
    ))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ClassDetailResponse {
    pub class: ClassResponse,
    pub attendees: Vec<AttendeeResponse>,
}

async fn class_detail(
    State(state): State<Arc<AppState>>,
    Path(class_id): Path<Uuid>,
) -> Result<Json<ClassDetailResponse>> {
    let detail = state.catalog.class_detail(class_id).await?;
    Ok(Json(ClassDetailResponse {
        class: ClassResponse::from(&detail.class),
        attendees: detail.attendees.iter().map(AttendeeResponse::from).collect(),
    }))
}

#[derive(Deserialize, Validate)]
pub struct UpdateClassRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub instructor: Option<String>,
    #[validate(range(min = 1, max = 480))]
    pub duration_minutes: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub max_slots: Option<u32>,
}

async fn update_class(
    State(state): State<Arc<AppState>>,
    Path(class_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<UpdateClassRequest>,
) -> Result<Json<ClassResponse>> {
    let class = state
        .catalog
        .update_class(
            class_id,
            ClassUpdate {
                name: body.name,
                instructor: body.instructor,
                duration_minutes: body.duration_minutes,
                max_slots: body.max_slots,
            },
        )
        .await?;
    Ok(Json(ClassResponse::from(&class)))
}

#[derive(Deserialize)]
struct CancelClassQuery {
    #[serde(default)]
    cancel_series: bool,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CancelClassResponse {
    pub classes_cancelled: u32,
    pub bookings_cancelled: u32,
    pub credits_refunded: u32,
}

/// Cancel a class, or with `?cancel_series=true` every upcoming class of
/// its series.
async fn cancel_class(
    State(state): State<Arc<AppState>>,
    Path(class_id): Path<Uuid>,
    Query(params): Query<CancelClassQuery>,
) -> Result<Json<CancelClassResponse>> {
    let cancelled = state
        .catalog
        .cancel_class(class_id, params.cancel_series)
        .await?;
    Ok(Json(CancelClassResponse {
        classes_cancelled: cancelled.classes_cancelled as u32,
        bookings_cancelled: cancelled.bookings_cancelled as u32,
        credits_refunded: cancelled.credits_refunded as u32,
    }))
}

/// Identifies a member either by id or by DNI. An unknown DNI with a name
/// creates an admin-managed account.
#[derive(Deserialize, Validate)]
pub struct MemberReference {
    pub user_id: Option<Uuid>,
    #[validate(length(min = 1, max = 20))]
    pub dni: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub full_name: Option<String>,
    #[serde(default)]
    pub is_trial: bool,
}

impl MemberReference {
    fn into_user_ref(self) -> Result<UserRef> {
        UserRef::from_parts(self.user_id, self.dni, self.full_name, self.is_trial)
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ManualBookResponse {
    pub booking: BookingResponse,
    pub user: UserResponse,
    pub user_created: bool,
}

/// Book a member into a class without charging a credit.
async fn manual_book(
    State(state): State<Arc<AppState>>,
    Path(class_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<MemberReference>,
) -> Result<(StatusCode, Json<ManualBookResponse>)> {
    let outcome = state
        .allocator
        .manual_book(body.into_user_ref()?, class_id)
        .await?;
    let balance = state.ledger.balance(outcome.user.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(ManualBookResponse {
            booking: BookingResponse::from(&outcome.booking),
            user: UserResponse::new(&outcome.user, balance),
            user_created: outcome.user_created,
        }),
    ))
}

// ─── Fixed schedules ─────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct CreateFixedScheduleRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub member: MemberReference,
    pub day_of_week: DayOfWeek,
    /// Studio wall-clock time, `HH:MM`
    pub start_time: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct FixedScheduleCreatedResponse {
    pub schedule: FixedScheduleResponse,
    pub user: UserResponse,
    pub user_created: bool,
    pub reactivated: bool,
    pub bookings_created: u32,
}

/// Give a member a standing weekly reservation.
async fn create_fixed_schedule(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<CreateFixedScheduleRequest>,
) -> Result<(StatusCode, Json<FixedScheduleCreatedResponse>)> {
    let start_time = parse_wall_clock(&body.start_time)?;
    let created = state
        .schedules
        .create(body.member.into_user_ref()?, body.day_of_week, start_time)
        .await?;
    let balance = state.ledger.balance(created.user.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(FixedScheduleCreatedResponse {
            schedule: FixedScheduleResponse::from(&created.schedule),
            user: UserResponse::new(&created.user, balance),
            user_created: created.user_created,
            reactivated: created.reactivated,
            bookings_created: created.bookings_created as u32,
        }),
    ))
}

fn parse_wall_clock(raw: &str) -> Result<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| AppError::BadRequest(format!("start_time must be HH:MM, got '{raw}'")))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct FixedScheduleCancelledResponse {
    pub schedule: FixedScheduleResponse,
    pub bookings_cancelled: u32,
    pub credits_refunded: u32,
}

/// Stop a standing reservation, releasing (and refunding) its upcoming
/// bookings.
async fn cancel_fixed_schedule(
    State(state): State<Arc<AppState>>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<FixedScheduleCancelledResponse>> {
    let cancelled = state.schedules.cancel(schedule_id).await?;
    Ok(Json(FixedScheduleCancelledResponse {
        schedule: FixedScheduleResponse::from(&cancelled.schedule),
        bookings_cancelled: cancelled.bookings_cancelled as u32,
        credits_refunded: cancelled.credits_refunded as u32,
    }))
}

// ─── Instructors ─────────────────────────────────────────────

#[derive(Deserialize)]
struct InstructorsQuery {
    #[serde(default)]
    include_inactive: bool,
}

async fn list_instructors(
    State(state): State<Arc<AppState>>,
    Query(params): Query<InstructorsQuery>,
) -> Result<Json<Vec<InstructorResponse>>> {
    let instructors = state
        .catalog
        .list_instructors(params.include_inactive)
        .await?;
    Ok(Json(instructors.iter().map(InstructorResponse::from).collect()))
}

#[derive(Deserialize, Validate)]
pub struct CreateInstructorRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
}

async fn create_instructor(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<CreateInstructorRequest>,
) -> Result<(StatusCode, Json<InstructorResponse>)> {
    let instructor = state.catalog.create_instructor(&body.name).await?;
    Ok((
        StatusCode::CREATED,
        Json(InstructorResponse::from(&instructor)),
    ))
}

#[derive(Deserialize, Validate)]
pub struct UpdateInstructorRequest {
    pub is_active: bool,
}

async fn update_instructor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<UpdateInstructorRequest>,
) -> Result<Json<InstructorResponse>> {
    let instructor = state
        .catalog
        .set_instructor_active(id, body.is_active)
        .await?;
    Ok(Json(InstructorResponse::from(&instructor)))
}

async fn delete_instructor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.catalog.delete_instructor(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Members ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct UsersQuery {
    q: Option<String>,
    #[serde(default)]
    skip: usize,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    MAX_PAGE_SIZE
}

async fn search_users(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UsersQuery>,
) -> Result<Json<Vec<UserResponse>>> {
    let members = state
        .members
        .search(params.q.as_deref(), params.skip, params.limit)
        .await?;
    Ok(Json(
        members
            .iter()
            .map(|m| UserResponse::new(&m.user, m.balance))
            .collect(),
    ))
}

#[derive(Deserialize, Validate)]
pub struct CreateShadowUserRequest {
    #[validate(length(min = 1, max = 20))]
    pub dni: String,
    #[validate(length(min = 1, max = 120))]
    pub full_name: String,
    #[serde(default)]
    pub is_trial: bool,
}

/// Register a member who has not signed in yet.
async fn create_shadow_user(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<CreateShadowUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let user = state
        .members
        .create_shadow(&body.dni, &body.full_name, body.is_trial)
        .await?;
    Ok((StatusCode::CREATED, Json(UserResponse::new(&user, 0))))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserDetailResponse {
    pub user: UserResponse,
    pub credits: Vec<CreditResponse>,
    pub bookings: Vec<BookingWithClass>,
    pub fixed_schedules: Vec<FixedScheduleResponse>,
}

async fn user_detail(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserDetailResponse>> {
    let detail = state.members.detail(user_id).await?;
    Ok(Json(UserDetailResponse {
        user: UserResponse::new(&detail.user, detail.balance),
        credits: detail.credits.iter().map(CreditResponse::from).collect(),
        bookings: detail.bookings.iter().map(BookingWithClass::from).collect(),
        fixed_schedules: detail
            .fixed_schedules
            .iter()
            .map(FixedScheduleResponse::from)
            .collect(),
    }))
}

#[derive(Deserialize, Validate)]
pub struct UpdateUserDetailsRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub full_name: Option<String>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub dni: Option<String>,
}

async fn update_user_details(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<UpdateUserDetailsRequest>,
) -> Result<Json<UserResponse>> {
    let user = state
        .members
        .update_details(
            user_id,
            MemberUpdate {
                email: body.email,
                full_name: body.full_name,
                phone: body.phone,
                dni: body.dni,
            },
        )
        .await?;
    let balance = state.ledger.balance(user_id).await?;
    Ok(Json(UserResponse::new(&user, balance)))
}

async fn toggle(state: &AppState, user_id: Uuid, flag: Flag) -> Result<Json<UserResponse>> {
    let user = state.members.toggle(user_id, flag).await?;
    let balance = state.ledger.balance(user_id).await?;
    Ok(Json(UserResponse::new(&user, balance)))
}

async fn toggle_disabled(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>> {
    toggle(&state, user_id, Flag::Disabled).await
}

async fn toggle_admin(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>> {
    toggle(&state, user_id, Flag::Admin).await
}

async fn toggle_trial(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>> {
    toggle(&state, user_id, Flag::Trial).await
}

#[derive(Deserialize, Validate)]
pub struct CreditEntryRequest {
    /// Signed; negative amounts are corrections
    #[validate(range(min = -1000, max = 1000))]
    pub amount: i32,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CreditEntryResponse {
    pub credit: CreditResponse,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub balance: i64,
}

/// Append a manual ledger entry.
async fn apply_credit(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<CreditEntryRequest>,
) -> Result<(StatusCode, Json<CreditEntryResponse>)> {
    let credit = state
        .ledger
        .apply_entry(user_id, body.amount, body.expires_at)
        .await?;
    let balance = state.ledger.balance(user_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreditEntryResponse {
            credit: CreditResponse::from(&credit),
            balance,
        }),
    ))
}

async fn user_bookings(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<BookingWithClass>>> {
    let bookings = state.members.bookings(user_id).await?;
    Ok(Json(bookings.iter().map(BookingWithClass::from).collect()))
}

/// A member's active standing reservations.
async fn user_fixed_schedules(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<FixedScheduleResponse>>> {
    let rules = state.members.fixed_schedules(user_id).await?;
    Ok(Json(
        rules
            .iter()
            .filter(|rule| rule.is_active())
            .map(FixedScheduleResponse::from)
            .collect(),
    ))
}

/// Cancel any booking, always refunding the credit.
async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<CancelBookingResponse>> {
    let outcome = state.cancellations.admin_cancel_booking(booking_id).await?;
    Ok(Json(CancelBookingResponse {
        booking: BookingResponse::from(&outcome.booking),
        refunded: outcome.refunded,
    }))
}

// ─── Settings ────────────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct SettingRequest {
    #[validate(length(max = 1000))]
    pub value: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SettingResponse {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

async fn put_setting(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    ValidatedJson(body): ValidatedJson<SettingRequest>,
) -> Result<Json<SettingResponse>> {
    let setting = update_setting(&state.db, state.clock.as_ref(), &key, &body.value).await?;
    Ok(Json(SettingResponse {
        key: setting.key,
        value: setting.value,
        updated_at: format_utc_rfc3339(setting.updated_at),
    }))
}
