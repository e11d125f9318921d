// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JSON response shapes shared by the client and admin routes.

use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::{Booking, Credit, FixedSchedule, GymClass, Instructor, User};
use crate::services::catalog::{Attendee, ClassSummary};
use crate::services::merge::MergeReport;
use crate::time_utils::format_utc_rfc3339;

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub dni: Option<String>,
    pub phone: Option<String>,
    pub provider: String,
    pub medical_certificate_url: Option<String>,
    pub is_admin: bool,
    pub is_trial: bool,
    pub disabled: bool,
    pub has_given_feedback: bool,
    /// Display balance, never negative
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub credits: i64,
    pub created_at: String,
}

impl UserResponse {
    pub fn new(user: &User, credits: i64) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            dni: user.dni.clone(),
            phone: user.phone.clone(),
            provider: user.provider.as_str().to_string(),
            medical_certificate_url: user.medical_certificate_url.clone(),
            is_admin: user.is_admin,
            is_trial: user.is_trial,
            disabled: user.disabled,
            has_given_feedback: user.has_given_feedback,
            credits,
            created_at: format_utc_rfc3339(user.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ClassResponse {
    pub id: String,
    pub name: String,
    pub instructor: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_minutes: u32,
    pub max_slots: u32,
    pub recurrence_group: Option<String>,
    pub is_recurring: bool,
    pub cancelled: bool,
}

impl From<&GymClass> for ClassResponse {
    fn from(class: &GymClass) -> Self {
        Self {
            id: class.id.to_string(),
            name: class.name.clone(),
            instructor: class.instructor.clone(),
            start_time: format_utc_rfc3339(class.start_time),
            end_time: format_utc_rfc3339(class.end_time()),
            duration_minutes: class.duration_minutes,
            max_slots: class.max_slots,
            recurrence_group: class.recurrence_group.map(|g| g.to_string()),
            is_recurring: class.is_recurring,
            cancelled: class.is_cancelled(),
        }
    }
}

/// A class as listed in the timetable.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ClassListing {
    #[serde(flatten)]
    #[cfg_attr(feature = "binding-generation", ts(flatten))]
    pub class: ClassResponse,
    pub booked_slots: u32,
    pub available_slots: u32,
    pub is_full: bool,
    /// The caller holds a confirmed booking
    pub is_booked: bool,
}

impl From<&ClassSummary> for ClassListing {
    fn from(summary: &ClassSummary) -> Self {
        Self {
            class: ClassResponse::from(&summary.class),
            booked_slots: summary.confirmed as u32,
            available_slots: summary.available as u32,
            is_full: summary.available == 0,
            is_booked: summary
                .viewer_booking
                .as_ref()
                .is_some_and(Booking::is_confirmed),
        }
    }
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct BookingResponse {
    pub id: String,
    pub user_id: String,
    pub gym_class_id: String,
    pub status: String,
    pub assisted: bool,
    pub created_at: String,
    pub cancelled_at: Option<String>,
}

impl From<&Booking> for BookingResponse {
    fn from(booking: &Booking) -> Self {
        Self {
            id: booking.id.to_string(),
            user_id: booking.user_id.to_string(),
            gym_class_id: booking.gym_class_id.to_string(),
            status: booking.status.as_str().to_string(),
            assisted: booking.assisted,
            created_at: format_utc_rfc3339(booking.created_at),
            cancelled_at: booking.cancelled_at.map(format_utc_rfc3339),
        }
    }
}

/// A booking together with the class it is for.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct BookingWithClass {
    pub booking: BookingResponse,
    pub class: ClassResponse,
}

impl From<&(Booking, GymClass)> for BookingWithClass {
    fn from((booking, class): &(Booking, GymClass)) -> Self {
        Self {
            booking: BookingResponse::from(booking),
            class: ClassResponse::from(class),
        }
    }
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AttendeeResponse {
    pub booking: BookingResponse,
    pub full_name: Option<String>,
    pub dni: Option<String>,
}

impl From<&Attendee> for AttendeeResponse {
    fn from(attendee: &Attendee) -> Self {
        Self {
            booking: BookingResponse::from(&attendee.booking),
            full_name: attendee.full_name.clone(),
            dni: attendee.dni.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CreditResponse {
    pub id: String,
    pub amount: i32,
    pub expires_at: Option<String>,
    pub created_at: String,
}

impl From<&Credit> for CreditResponse {
    fn from(credit: &Credit) -> Self {
        Self {
            id: credit.id.to_string(),
            amount: credit.amount,
            expires_at: credit.expires_at.map(format_utc_rfc3339),
            created_at: format_utc_rfc3339(credit.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct FixedScheduleResponse {
    pub id: String,
    pub user_id: String,
    pub day_of_week: String,
    /// Studio wall-clock time, `HH:MM`
    pub start_time: String,
    pub active: bool,
}

impl From<&FixedSchedule> for FixedScheduleResponse {
    fn from(rule: &FixedSchedule) -> Self {
        Self {
            id: rule.id.to_string(),
            user_id: rule.user_id.to_string(),
            day_of_week: rule.day_of_week.as_str().to_string(),
            start_time: rule.start_time.format("%H:%M").to_string(),
            active: rule.is_active(),
        }
    }
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct InstructorResponse {
    pub id: String,
    pub name: String,
    pub is_active: bool,
}

impl From<&Instructor> for InstructorResponse {
    fn from(instructor: &Instructor) -> Self {
        Self {
            id: instructor.id.to_string(),
            name: instructor.name.clone(),
            is_active: instructor.is_active,
        }
    }
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MergeSummary {
    pub bookings_moved: u32,
    pub bookings_dropped: u32,
    pub credits_moved: u32,
    pub schedules_moved: u32,
    pub schedules_dropped: u32,
}

impl From<&MergeReport> for MergeSummary {
    fn from(report: &MergeReport) -> Self {
        Self {
            bookings_moved: report.bookings_moved as u32,
            bookings_dropped: report.bookings_dropped as u32,
            credits_moved: report.credits_moved as u32,
            schedules_moved: report.schedules_moved as u32,
            schedules_dropped: report.schedules_dropped as u32,
        }
    }
}

/// Result of cancelling a single booking.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CancelBookingResponse {
    pub booking: BookingResponse,
    pub refunded: bool,
}
