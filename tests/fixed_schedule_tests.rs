// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Standing weekly reservations: auto-booking, holidays, backfill and
//! release on cancel.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use pilates_booking::error::AppError;
use pilates_booking::models::{DayOfWeek, GymClass};
use pilates_booking::services::catalog::NewClass;
use pilates_booking::services::identity::UserRef;
use pilates_booking::services::HolidayCalendar;

mod common;
use common::TestApp;

/// Monday 18:00 in the studio.
fn monday_evening() -> DateTime<Utc> {
    "2026-05-04T21:00:00Z".parse().unwrap()
}

fn six_pm() -> NaiveTime {
    NaiveTime::from_hms_opt(18, 0, 0).unwrap()
}

fn shadow(dni: &str, name: &str) -> UserRef {
    UserRef::Dni {
        dni: dni.to_string(),
        full_name: Some(name.to_string()),
        is_trial: false,
    }
}

async fn recurring_class(app: &TestApp, start: DateTime<Utc>, max_slots: u32) -> Vec<GymClass> {
    app.state
        .catalog
        .create_class(NewClass {
            name: None,
            instructor: "Laura".to_string(),
            start_time: start,
            duration_minutes: None,
            max_slots: Some(max_slots),
            is_recurring: true,
        })
        .await
        .unwrap()
        .classes
}

#[tokio::test]
async fn test_recurring_class_creates_twelve_weekly_instances() {
    let app = TestApp::new();
    let classes = recurring_class(&app, monday_evening(), 8).await;

    assert_eq!(classes.len(), 12);
    assert!(classes[0].is_recurring);
    assert!(classes[1..].iter().all(|c| !c.is_recurring));
    let group = classes[0].recurrence_group;
    assert!(group.is_some());
    assert!(classes.iter().all(|c| c.recurrence_group == group));
    for pair in classes.windows(2) {
        assert_eq!(pair[1].start_time - pair[0].start_time, Duration::weeks(1));
    }
    assert_eq!(classes[0].name, "Clase");
}

#[tokio::test]
async fn test_new_classes_auto_book_rule_owners_and_credit_holidays() {
    let app = TestApp::new();
    let created = app
        .state
        .schedules
        .create(shadow("30111222", "Carla"), DayOfWeek::Monday, six_pm())
        .await
        .unwrap();
    assert!(created.user_created);
    assert_eq!(created.bookings_created, 0);
    let carla = created.user.id;

    let result = app
        .state
        .catalog
        .create_class(NewClass {
            name: Some("Mat".to_string()),
            instructor: "Laura".to_string(),
            start_time: monday_evening(),
            duration_minutes: Some(50),
            max_slots: Some(8),
            is_recurring: true,
        })
        .await
        .unwrap();

    // 2026-05-25 is a holiday: one credit instead of a booking.
    assert_eq!(result.auto_booking.bookings_created, 11);
    assert_eq!(result.auto_booking.holiday_credits, 1);
    assert_eq!(app.balance(carla).await, 1);

    let holiday: DateTime<Utc> = "2026-05-25T21:00:00Z".parse().unwrap();
    for class in &result.classes {
        let booking = app.state.db.find_booking(carla, class.id).await.unwrap();
        if class.start_time == holiday {
            assert!(booking.is_none());
        } else {
            assert!(booking.is_some_and(|b| b.is_confirmed()));
        }
    }
}

#[tokio::test]
async fn test_fixed_bookings_ignore_capacity_and_credits() {
    let app = TestApp::with_holidays(HolidayCalendar::empty());
    let ana = app.member("ana@example.com", "Ana").await;
    let bea = app.member("bea@example.com", "Bea").await;
    for user in [&ana, &bea] {
        app.state
            .schedules
            .create(UserRef::Existing(user.id), DayOfWeek::Monday, six_pm())
            .await
            .unwrap();
    }

    let class = app.class_at(monday_evening(), 1).await;

    assert_eq!(app.state.db.confirmed_count(class.id).await.unwrap(), 2);
    assert_eq!(app.balance(ana.id).await, 0);
    assert_eq!(app.balance(bea.id).await, 0);
}

#[tokio::test]
async fn test_rule_matches_studio_wall_clock() {
    let app = TestApp::with_holidays(HolidayCalendar::empty());
    let ana = app.member("ana@example.com", "Ana").await;
    // 21:00 is the UTC hour, not the studio hour.
    app.state
        .schedules
        .create(
            UserRef::Existing(ana.id),
            DayOfWeek::Monday,
            NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
        )
        .await
        .unwrap();

    let class = app.class_at(monday_evening(), 8).await;
    assert!(app.state.db.find_booking(ana.id, class.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_new_rule_backfills_existing_classes() {
    let app = TestApp::with_holidays(HolidayCalendar::empty());
    let classes = recurring_class(&app, monday_evening(), 8).await;
    app.state
        .catalog
        .cancel_class(classes[3].id, false)
        .await
        .unwrap();

    let created = app
        .state
        .schedules
        .create(shadow("30111222", "Carla"), DayOfWeek::Monday, six_pm())
        .await
        .unwrap();

    // Cancelled classes are skipped.
    assert_eq!(created.bookings_created, 11);
    assert!(app
        .state
        .db
        .find_booking(created.user.id, classes[3].id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_backfill_skips_classes_already_held() {
    let app = TestApp::with_holidays(HolidayCalendar::empty());
    let ana = app.member("ana@example.com", "Ana").await;
    app.grant(ana.id, 1).await;
    let class = app.class_at(monday_evening(), 8).await;
    let booked = app.state.allocator.book(ana.id, class.id).await.unwrap();
    app.state
        .cancellations
        .cancel_booking(booked.booking.id, ana.id)
        .await
        .unwrap();

    // A cancelled row still counts as held.
    let created = app
        .state
        .schedules
        .create(UserRef::Existing(ana.id), DayOfWeek::Monday, six_pm())
        .await
        .unwrap();
    assert_eq!(created.bookings_created, 0);
}

#[tokio::test]
async fn test_duplicate_rule_conflicts_and_cancelled_rule_reactivates() {
    let app = TestApp::with_holidays(HolidayCalendar::empty());
    let ana = app.member("ana@example.com", "Ana").await;

    let first = app
        .state
        .schedules
        .create(UserRef::Existing(ana.id), DayOfWeek::Monday, six_pm())
        .await
        .unwrap();
    let err = app
        .state
        .schedules
        .create(UserRef::Existing(ana.id), DayOfWeek::Monday, six_pm())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    app.state.schedules.cancel(first.schedule.id).await.unwrap();
    let err = app
        .state
        .schedules
        .cancel(first.schedule.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let again = app
        .state
        .schedules
        .create(UserRef::Existing(ana.id), DayOfWeek::Monday, six_pm())
        .await
        .unwrap();
    assert!(again.reactivated);
    assert_eq!(again.schedule.id, first.schedule.id);
    assert_eq!(app.state.schedules.list_for_user(ana.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_cancel_rule_releases_upcoming_bookings_with_refund() {
    let app = TestApp::new();
    let created = app
        .state
        .schedules
        .create(shadow("30111222", "Carla"), DayOfWeek::Monday, six_pm())
        .await
        .unwrap();
    let carla = created.user.id;
    let classes = recurring_class(&app, monday_evening(), 8).await;
    assert_eq!(app.balance(carla).await, 1);

    // Past the first two Mondays.
    app.clock.advance(Duration::days(8));
    let cancelled = app
        .state
        .schedules
        .cancel(created.schedule.id)
        .await
        .unwrap();

    assert_eq!(cancelled.bookings_cancelled, 9);
    assert_eq!(cancelled.credits_refunded, 9);
    assert!(!cancelled.schedule.is_active());
    assert_eq!(app.balance(carla).await, 10);

    // Past bookings are untouched.
    let past = app.state.db.find_booking(carla, classes[0].id).await.unwrap().unwrap();
    assert!(past.is_confirmed());
}

#[tokio::test]
async fn test_series_cancel_releases_without_refund() {
    let app = TestApp::with_holidays(HolidayCalendar::empty());
    let ana = app.member("ana@example.com", "Ana").await;
    app.state
        .schedules
        .create(UserRef::Existing(ana.id), DayOfWeek::Monday, six_pm())
        .await
        .unwrap();
    let classes = recurring_class(&app, monday_evening(), 8).await;

    app.clock.advance(Duration::days(8));
    let outcome = app
        .state
        .catalog
        .cancel_class(classes[5].id, true)
        .await
        .unwrap();

    assert_eq!(outcome.classes_cancelled, 10);
    assert_eq!(outcome.bookings_cancelled, 10);
    assert_eq!(outcome.credits_refunded, 0);
    assert_eq!(app.balance(ana.id).await, 0);
    assert!(!app.state.db.get_class(classes[0].id).await.unwrap().unwrap().is_cancelled());
    assert!(app.state.db.get_class(classes[11].id).await.unwrap().unwrap().is_cancelled());
}

#[tokio::test]
async fn test_single_cancel_refunds_and_notifies() {
    let app = TestApp::new();
    let ana = app.member("ana@example.com", "Ana").await;
    app.state
        .accounts
        .set_fcm_token(ana.id, Some("device-1".to_string()))
        .await
        .unwrap();
    app.grant(ana.id, 1).await;
    let class = app.class_in_hours(24, 8).await;
    app.state.allocator.book(ana.id, class.id).await.unwrap();

    let outcome = app.state.catalog.cancel_class(class.id, false).await.unwrap();

    assert_eq!(outcome.credits_refunded, 1);
    assert_eq!(app.balance(ana.id).await, 1);
    let sent = app.notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, vec!["device-1".to_string()]);
}

#[tokio::test]
async fn test_class_in_the_past_is_rejected() {
    let app = TestApp::new();
    let err = app
        .state
        .catalog
        .create_class(NewClass {
            name: None,
            instructor: "Laura".to_string(),
            start_time: app.clock_now() - Duration::minutes(1),
            duration_minutes: None,
            max_slots: None,
            is_recurring: true,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::BadRequest(_)));
    assert!(app.state.db.classes_between(None, None, true).await.unwrap().is_empty());
}
