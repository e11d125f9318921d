// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Booking rules: the rejection order, credit debits and capacity under
//! concurrent load.

use chrono::Duration;
use pilates_booking::error::AppError;
use pilates_booking::models::setting::PAUSE_RESERVATIONS;
use pilates_booking::services::identity::UserRef;
use pilates_booking::services::settings::update_setting;

mod common;
use common::TestApp;

#[tokio::test]
async fn test_book_debits_one_credit() {
    let app = TestApp::new();
    let ana = app.member("ana@example.com", "Ana").await;
    app.grant(ana.id, 3).await;
    let class = app.class_in_hours(24, 8).await;

    let outcome = app.state.allocator.book(ana.id, class.id).await.unwrap();

    assert!(outcome.booking.is_confirmed());
    assert!(!outcome.reactivated);
    assert_eq!(outcome.remaining_credits, 2);
    assert_eq!(app.balance(ana.id).await, 2);
    assert_eq!(app.state.db.confirmed_count(class.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_trial_member_cannot_book() {
    let app = TestApp::new();
    let ana = app.member("ana@example.com", "Ana").await;
    app.grant(ana.id, 3).await;
    app.state
        .members
        .toggle(ana.id, pilates_booking::services::members::Flag::Trial)
        .await
        .unwrap();
    let class = app.class_in_hours(24, 8).await;

    let err = app.state.allocator.book(ana.id, class.id).await.unwrap_err();
    assert!(matches!(err, AppError::TrialRestricted));
    assert_eq!(app.balance(ana.id).await, 3);
}

#[tokio::test]
async fn test_paused_reservations_reject_bookings() {
    let app = TestApp::new();
    let ana = app.member("ana@example.com", "Ana").await;
    app.grant(ana.id, 3).await;
    let class = app.class_in_hours(24, 8).await;

    update_setting(&app.state.db, app.clock.as_ref(), PAUSE_RESERVATIONS, "TRUE")
        .await
        .unwrap();
    let err = app.state.allocator.book(ana.id, class.id).await.unwrap_err();
    assert!(matches!(err, AppError::ReservationsPaused));

    update_setting(&app.state.db, app.clock.as_ref(), PAUSE_RESERVATIONS, "false")
        .await
        .unwrap();
    app.state.allocator.book(ana.id, class.id).await.unwrap();
}

#[tokio::test]
async fn test_trial_check_precedes_pause_check() {
    let app = TestApp::new();
    let ana = app.member("ana@example.com", "Ana").await;
    app.state
        .members
        .toggle(ana.id, pilates_booking::services::members::Flag::Trial)
        .await
        .unwrap();
    update_setting(&app.state.db, app.clock.as_ref(), PAUSE_RESERVATIONS, "true")
        .await
        .unwrap();
    let class = app.class_in_hours(24, 8).await;

    let err = app.state.allocator.book(ana.id, class.id).await.unwrap_err();
    assert!(matches!(err, AppError::TrialRestricted));
}

#[tokio::test]
async fn test_unknown_and_cancelled_classes_are_not_found() {
    let app = TestApp::new();
    let ana = app.member("ana@example.com", "Ana").await;
    app.grant(ana.id, 3).await;

    let err = app
        .state
        .allocator
        .book(ana.id, uuid::Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let class = app.class_in_hours(24, 8).await;
    app.state.catalog.cancel_class(class.id, false).await.unwrap();
    let err = app.state.allocator.book(ana.id, class.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_started_class_rejected() {
    let app = TestApp::new();
    let ana = app.member("ana@example.com", "Ana").await;
    app.grant(ana.id, 3).await;
    let class = app.class_in_hours(1, 8).await;

    app.clock.advance(Duration::hours(1));
    let err = app.state.allocator.book(ana.id, class.id).await.unwrap_err();
    assert!(matches!(err, AppError::ClassStarted));
}

#[tokio::test]
async fn test_double_booking_is_conflict_and_not_charged() {
    let app = TestApp::new();
    let ana = app.member("ana@example.com", "Ana").await;
    app.grant(ana.id, 3).await;
    let class = app.class_in_hours(24, 8).await;

    app.state.allocator.book(ana.id, class.id).await.unwrap();
    let err = app.state.allocator.book(ana.id, class.id).await.unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(app.balance(ana.id).await, 2);
}

#[tokio::test]
async fn test_no_credits_checked_before_capacity() {
    let app = TestApp::new();
    let ana = app.member("ana@example.com", "Ana").await;
    let bea = app.member("bea@example.com", "Bea").await;
    app.grant(bea.id, 1).await;
    let class = app.class_in_hours(24, 1).await;
    app.state.allocator.book(bea.id, class.id).await.unwrap();

    // Full class and no credits: the credit check wins.
    let err = app.state.allocator.book(ana.id, class.id).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientCredits));

    app.grant(ana.id, 1).await;
    let err = app.state.allocator.book(ana.id, class.id).await.unwrap_err();
    assert!(matches!(err, AppError::ClassFull));
    assert_eq!(app.balance(ana.id).await, 1);
}

#[tokio::test]
async fn test_expired_credits_do_not_count() {
    let app = TestApp::new();
    let ana = app.member("ana@example.com", "Ana").await;
    let expiry = app.clock_now() + Duration::hours(2);
    app.state
        .ledger
        .apply_entry(ana.id, 1, Some(expiry))
        .await
        .unwrap();
    let class = app.class_in_hours(24, 8).await;

    app.clock.advance(Duration::hours(3));
    let err = app.state.allocator.book(ana.id, class.id).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientCredits));
}

#[tokio::test]
async fn test_rebooking_reactivates_cancelled_row() {
    let app = TestApp::new();
    let ana = app.member("ana@example.com", "Ana").await;
    app.grant(ana.id, 2).await;
    let class = app.class_in_hours(24, 8).await;

    let first = app.state.allocator.book(ana.id, class.id).await.unwrap();
    app.state
        .cancellations
        .cancel_booking(first.booking.id, ana.id)
        .await
        .unwrap();

    let second = app.state.allocator.book(ana.id, class.id).await.unwrap();
    assert!(second.reactivated);
    assert_eq!(second.booking.id, first.booking.id);
    assert_eq!(app.state.db.bookings_for_class(class.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_manual_book_skips_credits_but_respects_capacity() {
    let app = TestApp::new();
    let ana = app.member("ana@example.com", "Ana").await;
    let class = app.class_in_hours(24, 1).await;

    let outcome = app
        .state
        .allocator
        .manual_book(UserRef::Existing(ana.id), class.id)
        .await
        .unwrap();
    assert!(outcome.booking.is_confirmed());
    assert!(!outcome.user_created);
    assert_eq!(app.balance(ana.id).await, 0);

    let err = app
        .state
        .allocator
        .manual_book(UserRef::Existing(ana.id), class.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let bea = app.member("bea@example.com", "Bea").await;
    let err = app
        .state
        .allocator
        .manual_book(UserRef::Existing(bea.id), class.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ClassFull));
}

#[tokio::test]
async fn test_manual_book_creates_shadow_member_from_dni() {
    let app = TestApp::new();
    let class = app.class_in_hours(24, 8).await;

    let outcome = app
        .state
        .allocator
        .manual_book(
            UserRef::Dni {
                dni: "30123456".to_string(),
                full_name: Some("Carla Díaz".to_string()),
                is_trial: true,
            },
            class.id,
        )
        .await
        .unwrap();

    assert!(outcome.user_created);
    assert!(outcome.user.is_shadow());
    assert!(outcome.user.is_trial);
    assert_eq!(outcome.user.dni.as_deref(), Some("30123456"));

    // Same DNI again resolves to the same member.
    let other = app.class_in_hours(48, 8).await;
    let again = app
        .state
        .allocator
        .manual_book(
            UserRef::Dni {
                dni: "30123456".to_string(),
                full_name: None,
                is_trial: false,
            },
            other.id,
        )
        .await
        .unwrap();
    assert!(!again.user_created);
    assert_eq!(again.user.id, outcome.user.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bookings_never_overfill() {
    let app = TestApp::new();
    let class = app.class_in_hours(24, 3).await;

    let mut members = Vec::new();
    for i in 0..12 {
        let user = app
            .member(&format!("m{i}@example.com"), &format!("Member {i}"))
            .await;
        app.grant(user.id, 1).await;
        members.push(user.id);
    }

    let mut handles = Vec::new();
    for user_id in members.clone() {
        let allocator = app.state.allocator.clone();
        let class_id = class.id;
        handles.push(tokio::spawn(async move {
            allocator.book(user_id, class_id).await
        }));
    }

    let mut booked = 0;
    let mut full = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => booked += 1,
            Err(AppError::ClassFull) => full += 1,
            Err(e) => panic!("unexpected rejection: {e}"),
        }
    }

    assert_eq!(booked, 3);
    assert_eq!(full, 9);
    assert_eq!(app.state.db.confirmed_count(class.id).await.unwrap(), 3);

    let mut spent = 0;
    for user_id in members {
        if app.balance(user_id).await == 0 {
            spent += 1;
        }
    }
    assert_eq!(spent, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bookings_cannot_overspend() {
    let app = TestApp::new();
    let ana = app.member("ana@example.com", "Ana").await;
    app.grant(ana.id, 1).await;

    let mut classes = Vec::new();
    for hours in 1..=6 {
        classes.push(app.class_in_hours(24 * hours, 8).await.id);
    }

    let mut handles = Vec::new();
    for class_id in classes {
        let allocator = app.state.allocator.clone();
        let user_id = ana.id;
        handles.push(tokio::spawn(async move {
            allocator.book(user_id, class_id).await
        }));
    }

    let mut booked = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => booked += 1,
            Err(AppError::InsufficientCredits) => {}
            Err(e) => panic!("unexpected rejection: {e}"),
        }
    }

    assert_eq!(booked, 1);
    let raw = app
        .state
        .ledger
        .raw_balance_at(ana.id, app.clock_now())
        .await
        .unwrap();
    assert_eq!(raw, 0);
}
