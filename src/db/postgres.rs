// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! PostgreSQL queries.
//!
//! Every function runs on a borrowed connection, so the same query serves
//! pool reads and reads inside a transaction that holds row locks.

use std::time::Duration;

use chrono::{DateTime, NaiveTime, Utc};
use sqlx::postgres::{PgConnection, PgPoolOptions};
use sqlx::PgPool;
use uuid::Uuid;

use super::table_names as names;
use super::transaction::Write;
use super::ConstraintViolation;
use crate::error::Result;
use crate::models::{
    Booking, BookingStatus, Credit, DayOfWeek, FixedSchedule, GymClass, Instructor, Provider,
    Setting, User,
};

/// Advisory lock key serializing fixed-schedule rule changes.
const SCHEDULE_RULES_LOCK: i64 = 0x5343_4845_4455_4c45;

pub(super) async fn connect(url: &str, max_connections: u32) -> std::result::Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(url)
        .await
}

// ─── Row Decoding ────────────────────────────────────────────

fn decode_error(what: &str, value: &str) -> sqlx::Error {
    sqlx::Error::Decode(format!("unknown {what} '{value}'").into())
}

fn to_u32(value: i32) -> std::result::Result<u32, sqlx::Error> {
    u32::try_from(value).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn to_i32(value: u32) -> std::result::Result<i32, sqlx::Error> {
    i32::try_from(value).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    full_name: Option<String>,
    dni: Option<String>,
    phone: Option<String>,
    provider: String,
    social_id: Option<String>,
    medical_certificate_url: Option<String>,
    is_admin: bool,
    disabled: bool,
    is_trial: bool,
    is_deleted: bool,
    has_given_feedback: bool,
    feedback_sentiment: Option<String>,
    fcm_token: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = sqlx::Error;

    fn try_from(row: UserRow) -> std::result::Result<Self, Self::Error> {
        let provider =
            Provider::parse(&row.provider).ok_or_else(|| decode_error("provider", &row.provider))?;
        Ok(User {
            id: row.id,
            email: row.email,
            full_name: row.full_name,
            dni: row.dni,
            phone: row.phone,
            provider,
            social_id: row.social_id,
            medical_certificate_url: row.medical_certificate_url,
            is_admin: row.is_admin,
            disabled: row.disabled,
            is_trial: row.is_trial,
            is_deleted: row.is_deleted,
            has_given_feedback: row.has_given_feedback,
            feedback_sentiment: row.feedback_sentiment,
            fcm_token: row.fcm_token,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct InstructorRow {
    id: Uuid,
    name: String,
    is_active: bool,
}

impl From<InstructorRow> for Instructor {
    fn from(row: InstructorRow) -> Self {
        Instructor {
            id: row.id,
            name: row.name,
            is_active: row.is_active,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ClassRow {
    id: Uuid,
    name: String,
    instructor: String,
    start_time: DateTime<Utc>,
    duration_minutes: i32,
    max_slots: i32,
    recurrence_group: Option<Uuid>,
    is_recurring: bool,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ClassRow> for GymClass {
    type Error = sqlx::Error;

    fn try_from(row: ClassRow) -> std::result::Result<Self, Self::Error> {
        Ok(GymClass {
            id: row.id,
            name: row.name,
            instructor: row.instructor,
            start_time: row.start_time,
            duration_minutes: to_u32(row.duration_minutes)?,
            max_slots: to_u32(row.max_slots)?,
            recurrence_group: row.recurrence_group,
            is_recurring: row.is_recurring,
            cancelled_at: row.cancelled_at,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    user_id: Uuid,
    gym_class_id: Uuid,
    status: String,
    assisted: bool,
    created_at: DateTime<Utc>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = sqlx::Error;

    fn try_from(row: BookingRow) -> std::result::Result<Self, Self::Error> {
        let status = BookingStatus::parse(&row.status)
            .ok_or_else(|| decode_error("booking status", &row.status))?;
        Ok(Booking {
            id: row.id,
            user_id: row.user_id,
            gym_class_id: row.gym_class_id,
            status,
            assisted: row.assisted,
            created_at: row.created_at,
            cancelled_at: row.cancelled_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CreditRow {
    id: Uuid,
    user_id: Uuid,
    amount: i32,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<CreditRow> for Credit {
    fn from(row: CreditRow) -> Self {
        Credit {
            id: row.id,
            user_id: row.user_id,
            amount: row.amount,
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct FixedScheduleRow {
    id: Uuid,
    user_id: Uuid,
    day_of_week: String,
    start_time: NaiveTime,
    cancelled_at: Option<DateTime<Utc>>,
}

impl TryFrom<FixedScheduleRow> for FixedSchedule {
    type Error = sqlx::Error;

    fn try_from(row: FixedScheduleRow) -> std::result::Result<Self, Self::Error> {
        let day_of_week = DayOfWeek::parse(&row.day_of_week)
            .ok_or_else(|| decode_error("day of week", &row.day_of_week))?;
        Ok(FixedSchedule {
            id: row.id,
            user_id: row.user_id,
            day_of_week,
            start_time: row.start_time,
            cancelled_at: row.cancelled_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SettingRow {
    key: String,
    value: String,
    updated_at: DateTime<Utc>,
}

impl From<SettingRow> for Setting {
    fn from(row: SettingRow) -> Self {
        Setting {
            key: row.key,
            value: row.value,
            updated_at: row.updated_at,
        }
    }
}

fn decode_all<R, T>(rows: Vec<R>) -> std::result::Result<Vec<T>, sqlx::Error>
where
    T: TryFrom<R, Error = sqlx::Error>,
{
    rows.into_iter().map(T::try_from).collect()
}

// ─── Locks ───────────────────────────────────────────────────

pub(super) async fn lock_schedule_rules(conn: &mut PgConnection) -> Result<()> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(SCHEDULE_RULES_LOCK)
        .execute(conn)
        .await?;
    Ok(())
}

// `FOR NO KEY UPDATE` serializes lock holders without blocking the
// foreign-key checks of child rows inserted elsewhere.
pub(super) async fn lock_user(conn: &mut PgConnection, id: Uuid) -> Result<()> {
    sqlx::query("SELECT 1 FROM users WHERE id = $1 FOR NO KEY UPDATE")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

pub(super) async fn lock_class(conn: &mut PgConnection, id: Uuid) -> Result<()> {
    sqlx::query("SELECT 1 FROM gym_classes WHERE id = $1 FOR NO KEY UPDATE")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

// ─── User Queries ────────────────────────────────────────────

pub(super) async fn get_user(conn: &mut PgConnection, id: Uuid) -> Result<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(User::try_from).transpose()?)
}

pub(super) async fn get_users(conn: &mut PgConnection, ids: &[Uuid]) -> Result<Vec<User>> {
    let rows: Vec<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(conn)
        .await?;
    Ok(decode_all(rows)?)
}

pub(super) async fn find_user_by_email(conn: &mut PgConnection, email: &str) -> Result<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(User::try_from).transpose()?)
}

pub(super) async fn find_user_by_dni(conn: &mut PgConnection, dni: &str) -> Result<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE dni = $1")
        .bind(dni)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(User::try_from).transpose()?)
}

pub(super) async fn search_users(
    conn: &mut PgConnection,
    query: Option<&str>,
    offset: usize,
    limit: usize,
) -> Result<Vec<User>> {
    let needle = query.map(str::to_lowercase).filter(|q| !q.is_empty());
    let rows: Vec<UserRow> = sqlx::query_as(
        "SELECT * FROM users
         WHERE NOT is_deleted
           AND ($1::text IS NULL
                OR strpos(lower(coalesce(full_name, '')), $1) > 0
                OR strpos(coalesce(dni, ''), $1) > 0)
         ORDER BY full_name ASC NULLS FIRST, created_at
         OFFSET $2 LIMIT $3",
    )
    .bind(needle)
    .bind(i64::try_from(offset).unwrap_or(i64::MAX))
    .bind(i64::try_from(limit).unwrap_or(i64::MAX))
    .fetch_all(conn)
    .await?;
    Ok(decode_all(rows)?)
}

// ─── Instructor Queries ──────────────────────────────────────

pub(super) async fn get_instructor(conn: &mut PgConnection, id: Uuid) -> Result<Option<Instructor>> {
    let row: Option<InstructorRow> = sqlx::query_as("SELECT * FROM instructors WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(Instructor::from))
}

pub(super) async fn find_instructor_by_name(
    conn: &mut PgConnection,
    name: &str,
) -> Result<Option<Instructor>> {
    let row: Option<InstructorRow> = sqlx::query_as("SELECT * FROM instructors WHERE name = $1")
        .bind(name)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(Instructor::from))
}

pub(super) async fn list_instructors(
    conn: &mut PgConnection,
    include_inactive: bool,
) -> Result<Vec<Instructor>> {
    let rows: Vec<InstructorRow> =
        sqlx::query_as("SELECT * FROM instructors WHERE $1 OR is_active ORDER BY name")
            .bind(include_inactive)
            .fetch_all(conn)
            .await?;
    Ok(rows.into_iter().map(Instructor::from).collect())
}

// ─── Class Queries ───────────────────────────────────────────

pub(super) async fn get_class(conn: &mut PgConnection, id: Uuid) -> Result<Option<GymClass>> {
    let row: Option<ClassRow> = sqlx::query_as("SELECT * FROM gym_classes WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(GymClass::try_from).transpose()?)
}

pub(super) async fn get_classes(conn: &mut PgConnection, ids: &[Uuid]) -> Result<Vec<GymClass>> {
    let rows: Vec<ClassRow> = sqlx::query_as("SELECT * FROM gym_classes WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(conn)
        .await?;
    Ok(decode_all(rows)?)
}

pub(super) async fn classes_between(
    conn: &mut PgConnection,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    include_cancelled: bool,
) -> Result<Vec<GymClass>> {
    let rows: Vec<ClassRow> = sqlx::query_as(
        "SELECT * FROM gym_classes
         WHERE ($1::timestamptz IS NULL OR start_time >= $1)
           AND ($2::timestamptz IS NULL OR start_time < $2)
           AND ($3 OR cancelled_at IS NULL)
         ORDER BY start_time, id",
    )
    .bind(from)
    .bind(to)
    .bind(include_cancelled)
    .fetch_all(conn)
    .await?;
    Ok(decode_all(rows)?)
}

pub(super) async fn upcoming_classes(
    conn: &mut PgConnection,
    after: DateTime<Utc>,
) -> Result<Vec<GymClass>> {
    let rows: Vec<ClassRow> = sqlx::query_as(
        "SELECT * FROM gym_classes
         WHERE cancelled_at IS NULL AND start_time > $1
         ORDER BY start_time, id",
    )
    .bind(after)
    .fetch_all(conn)
    .await?;
    Ok(decode_all(rows)?)
}

pub(super) async fn series_classes(conn: &mut PgConnection, group: Uuid) -> Result<Vec<GymClass>> {
    let rows: Vec<ClassRow> = sqlx::query_as(
        "SELECT * FROM gym_classes WHERE recurrence_group = $1 ORDER BY start_time, id",
    )
    .bind(group)
    .fetch_all(conn)
    .await?;
    Ok(decode_all(rows)?)
}

// ─── Booking Queries ─────────────────────────────────────────

pub(super) async fn get_booking(conn: &mut PgConnection, id: Uuid) -> Result<Option<Booking>> {
    let row: Option<BookingRow> = sqlx::query_as("SELECT * FROM bookings WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(Booking::try_from).transpose()?)
}

pub(super) async fn find_booking(
    conn: &mut PgConnection,
    user_id: Uuid,
    class_id: Uuid,
) -> Result<Option<Booking>> {
    let row: Option<BookingRow> =
        sqlx::query_as("SELECT * FROM bookings WHERE user_id = $1 AND gym_class_id = $2")
            .bind(user_id)
            .bind(class_id)
            .fetch_optional(conn)
            .await?;
    Ok(row.map(Booking::try_from).transpose()?)
}

pub(super) async fn bookings_for_class(conn: &mut PgConnection, class_id: Uuid) -> Result<Vec<Booking>> {
    let rows: Vec<BookingRow> =
        sqlx::query_as("SELECT * FROM bookings WHERE gym_class_id = $1 ORDER BY created_at")
            .bind(class_id)
            .fetch_all(conn)
            .await?;
    Ok(decode_all(rows)?)
}

pub(super) async fn confirmed_count(conn: &mut PgConnection, class_id: Uuid) -> Result<usize> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT count(*) FROM bookings WHERE gym_class_id = $1 AND status = 'confirmed'",
    )
    .bind(class_id)
    .fetch_one(conn)
    .await?;
    Ok(usize::try_from(count).unwrap_or_default())
}

pub(super) async fn bookings_for_user(conn: &mut PgConnection, user_id: Uuid) -> Result<Vec<Booking>> {
    let rows: Vec<BookingRow> = sqlx::query_as("SELECT * FROM bookings WHERE user_id = $1")
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(decode_all(rows)?)
}

// ─── Credit Queries ──────────────────────────────────────────

pub(super) async fn credits_for_user(conn: &mut PgConnection, user_id: Uuid) -> Result<Vec<Credit>> {
    let rows: Vec<CreditRow> =
        sqlx::query_as("SELECT * FROM credits WHERE user_id = $1 ORDER BY created_at, id")
            .bind(user_id)
            .fetch_all(conn)
            .await?;
    Ok(rows.into_iter().map(Credit::from).collect())
}

// ─── Fixed Schedule Queries ──────────────────────────────────

pub(super) async fn get_fixed_schedule(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<Option<FixedSchedule>> {
    let row: Option<FixedScheduleRow> =
        sqlx::query_as("SELECT * FROM fixed_schedules WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await?;
    Ok(row.map(FixedSchedule::try_from).transpose()?)
}

pub(super) async fn find_fixed_schedule(
    conn: &mut PgConnection,
    user_id: Uuid,
    day: DayOfWeek,
    time: NaiveTime,
) -> Result<Option<FixedSchedule>> {
    let row: Option<FixedScheduleRow> = sqlx::query_as(
        "SELECT * FROM fixed_schedules
         WHERE user_id = $1 AND day_of_week = $2 AND start_time = $3",
    )
    .bind(user_id)
    .bind(day.as_str())
    .bind(time)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(FixedSchedule::try_from).transpose()?)
}

pub(super) async fn fixed_schedules_for_user(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<Vec<FixedSchedule>> {
    let rows: Vec<FixedScheduleRow> =
        sqlx::query_as("SELECT * FROM fixed_schedules WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(conn)
            .await?;
    let mut found: Vec<FixedSchedule> = decode_all(rows)?;
    found.sort_by_key(|f| (f.day_of_week, f.start_time));
    Ok(found)
}

pub(super) async fn active_schedules_for_slot(
    conn: &mut PgConnection,
    day: DayOfWeek,
    time: NaiveTime,
) -> Result<Vec<FixedSchedule>> {
    let rows: Vec<FixedScheduleRow> = sqlx::query_as(
        "SELECT f.* FROM fixed_schedules f
         JOIN users u ON u.id = f.user_id
         WHERE f.cancelled_at IS NULL
           AND f.day_of_week = $1
           AND f.start_time = $2
           AND NOT u.is_deleted",
    )
    .bind(day.as_str())
    .bind(time)
    .fetch_all(conn)
    .await?;
    Ok(decode_all(rows)?)
}

// ─── Setting Queries ─────────────────────────────────────────

pub(super) async fn get_setting(conn: &mut PgConnection, key: &str) -> Result<Option<Setting>> {
    let row: Option<SettingRow> = sqlx::query_as("SELECT * FROM settings WHERE key = $1")
        .bind(key)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(Setting::from))
}

pub(super) async fn all_settings(conn: &mut PgConnection) -> Result<Vec<Setting>> {
    let rows: Vec<SettingRow> = sqlx::query_as("SELECT * FROM settings ORDER BY key")
        .fetch_all(conn)
        .await?;
    Ok(rows.into_iter().map(Setting::from).collect())
}

// ─── Writes ──────────────────────────────────────────────────

fn expect_row(rows_affected: u64, table: &'static str) -> Result<()> {
    if rows_affected == 0 {
        return Err(ConstraintViolation::MissingRow { table }.into());
    }
    Ok(())
}

/// Apply one staged write. Constraint failures surface as
/// [`ConstraintViolation`]s through `AppError`.
pub(super) async fn apply(conn: &mut PgConnection, write: &Write) -> Result<()> {
    match write {
        Write::InsertUser(user) => {
            bind_user(sqlx::query(
                "INSERT INTO users (id, email, full_name, dni, phone, provider, social_id,
                    medical_certificate_url, is_admin, disabled, is_trial, is_deleted,
                    has_given_feedback, feedback_sentiment, fcm_token, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
            ), user)
            .execute(conn)
            .await?;
        }
        Write::UpdateUser(user) => {
            let result = bind_user(sqlx::query(
                "UPDATE users SET email = $2, full_name = $3, dni = $4, phone = $5,
                    provider = $6, social_id = $7, medical_certificate_url = $8,
                    is_admin = $9, disabled = $10, is_trial = $11, is_deleted = $12,
                    has_given_feedback = $13, feedback_sentiment = $14, fcm_token = $15,
                    created_at = $16
                 WHERE id = $1",
            ), user)
            .execute(conn)
            .await?;
            expect_row(result.rows_affected(), names::USERS)?;
        }
        Write::DeleteUser(id) => {
            let result = sqlx::query("DELETE FROM users WHERE id = $1")
                .bind(id)
                .execute(conn)
                .await?;
            expect_row(result.rows_affected(), names::USERS)?;
        }
        Write::PutInstructor(instructor) => {
            sqlx::query(
                "INSERT INTO instructors (id, name, is_active) VALUES ($1, $2, $3)
                 ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, is_active = EXCLUDED.is_active",
            )
            .bind(instructor.id)
            .bind(&instructor.name)
            .bind(instructor.is_active)
            .execute(conn)
            .await?;
        }
        Write::DeleteInstructor(id) => {
            let result = sqlx::query("DELETE FROM instructors WHERE id = $1")
                .bind(id)
                .execute(conn)
                .await?;
            expect_row(result.rows_affected(), names::INSTRUCTORS)?;
        }
        Write::InsertClass(class) => {
            bind_class(sqlx::query(
                "INSERT INTO gym_classes (id, name, instructor, start_time, duration_minutes,
                    max_slots, recurrence_group, is_recurring, cancelled_at, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            ), class)?
            .execute(conn)
            .await?;
        }
        Write::UpdateClass(class) => {
            let result = bind_class(sqlx::query(
                "UPDATE gym_classes SET name = $2, instructor = $3, start_time = $4,
                    duration_minutes = $5, max_slots = $6, recurrence_group = $7,
                    is_recurring = $8, cancelled_at = $9, created_at = $10
                 WHERE id = $1",
            ), class)?
            .execute(conn)
            .await?;
            expect_row(result.rows_affected(), names::GYM_CLASSES)?;
        }
        Write::PutBooking(booking) => {
            sqlx::query(
                "INSERT INTO bookings (id, user_id, gym_class_id, status, assisted, created_at, cancelled_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (id) DO UPDATE SET
                    user_id = EXCLUDED.user_id,
                    gym_class_id = EXCLUDED.gym_class_id,
                    status = EXCLUDED.status,
                    assisted = EXCLUDED.assisted,
                    cancelled_at = EXCLUDED.cancelled_at",
            )
            .bind(booking.id)
            .bind(booking.user_id)
            .bind(booking.gym_class_id)
            .bind(booking.status.as_str())
            .bind(booking.assisted)
            .bind(booking.created_at)
            .bind(booking.cancelled_at)
            .execute(conn)
            .await?;
        }
        Write::DeleteBooking(id) => {
            let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
                .bind(id)
                .execute(conn)
                .await?;
            expect_row(result.rows_affected(), names::BOOKINGS)?;
        }
        Write::InsertCredit(credit) => {
            sqlx::query(
                "INSERT INTO credits (id, user_id, amount, expires_at, created_at)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(credit.id)
            .bind(credit.user_id)
            .bind(credit.amount)
            .bind(credit.expires_at)
            .bind(credit.created_at)
            .execute(conn)
            .await?;
        }
        Write::ReassignCredit { id, user_id } => {
            let result = sqlx::query("UPDATE credits SET user_id = $2 WHERE id = $1")
                .bind(id)
                .bind(user_id)
                .execute(conn)
                .await?;
            expect_row(result.rows_affected(), names::CREDITS)?;
        }
        Write::PutFixedSchedule(schedule) => {
            sqlx::query(
                "INSERT INTO fixed_schedules (id, user_id, day_of_week, start_time, cancelled_at)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (id) DO UPDATE SET
                    user_id = EXCLUDED.user_id,
                    day_of_week = EXCLUDED.day_of_week,
                    start_time = EXCLUDED.start_time,
                    cancelled_at = EXCLUDED.cancelled_at",
            )
            .bind(schedule.id)
            .bind(schedule.user_id)
            .bind(schedule.day_of_week.as_str())
            .bind(schedule.start_time)
            .bind(schedule.cancelled_at)
            .execute(conn)
            .await?;
        }
        Write::DeleteFixedSchedule(id) => {
            let result = sqlx::query("DELETE FROM fixed_schedules WHERE id = $1")
                .bind(id)
                .execute(conn)
                .await?;
            expect_row(result.rows_affected(), names::FIXED_SCHEDULES)?;
        }
        Write::PutSetting(setting) => {
            sqlx::query(
                "INSERT INTO settings (key, value, updated_at) VALUES ($1, $2, $3)
                 ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at",
            )
            .bind(&setting.key)
            .bind(&setting.value)
            .bind(setting.updated_at)
            .execute(conn)
            .await?;
        }
    }
    Ok(())
}

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>;

fn bind_user<'q>(query: PgQuery<'q>, user: &'q User) -> PgQuery<'q> {
    query
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.dni)
        .bind(&user.phone)
        .bind(user.provider.as_str())
        .bind(&user.social_id)
        .bind(&user.medical_certificate_url)
        .bind(user.is_admin)
        .bind(user.disabled)
        .bind(user.is_trial)
        .bind(user.is_deleted)
        .bind(user.has_given_feedback)
        .bind(&user.feedback_sentiment)
        .bind(&user.fcm_token)
        .bind(user.created_at)
}

fn bind_class<'q>(query: PgQuery<'q>, class: &'q GymClass) -> std::result::Result<PgQuery<'q>, sqlx::Error> {
    Ok(query
        .bind(class.id)
        .bind(&class.name)
        .bind(&class.instructor)
        .bind(class.start_time)
        .bind(to_i32(class.duration_minutes)?)
        .bind(to_i32(class.max_slots)?)
        .bind(class.recurrence_group)
        .bind(class.is_recurring)
        .bind(class.cancelled_at)
        .bind(class.created_at))
}
