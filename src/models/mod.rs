// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod booking;
pub mod credit;
pub mod fixed_schedule;
pub mod gym_class;
pub mod setting;
pub mod user;

pub use booking::{Booking, BookingStatus};
pub use credit::Credit;
pub use fixed_schedule::{DayOfWeek, FixedSchedule};
pub use gym_class::{GymClass, Instructor};
pub use setting::Setting;
pub use user::{Provider, User};
