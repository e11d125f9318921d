// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credit ledger: manual entries, expiry and the display floor.

use chrono::Duration;
use pilates_booking::error::AppError;
use uuid::Uuid;

mod common;
use common::TestApp;

#[tokio::test]
async fn test_zero_amount_is_rejected() {
    let app = TestApp::new();
    let ana = app.member("ana@example.com", "Ana").await;

    let err = app
        .state
        .ledger
        .apply_entry(ana.id, 0, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert!(app.state.ledger.entries(ana.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let app = TestApp::new();
    let err = app
        .state
        .ledger
        .apply_entry(Uuid::new_v4(), 5, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_expired_pack_stops_counting() {
    let app = TestApp::new();
    let ana = app.member("ana@example.com", "Ana").await;
    let expiry = app.clock_now() + Duration::days(30);

    app.state
        .ledger
        .apply_entry(ana.id, 8, Some(expiry))
        .await
        .unwrap();
    app.grant(ana.id, 2).await;
    assert_eq!(app.balance(ana.id).await, 10);

    app.clock.set(expiry);
    assert_eq!(app.balance(ana.id).await, 2);
}

#[tokio::test]
async fn test_correction_below_zero_is_floored_for_display() {
    let app = TestApp::new();
    let ana = app.member("ana@example.com", "Ana").await;
    app.grant(ana.id, 1).await;

    app.state
        .ledger
        .apply_entry(ana.id, -3, None)
        .await
        .unwrap();

    assert_eq!(app.balance(ana.id).await, 0);
    assert_eq!(
        app.state
            .ledger
            .raw_balance_at(ana.id, app.clock_now())
            .await
            .unwrap(),
        -2
    );

    // A later top-up has to cover the deficit first.
    app.grant(ana.id, 3).await;
    assert_eq!(app.balance(ana.id).await, 1);
    assert_eq!(app.state.ledger.entries(ana.id).await.unwrap().len(), 3);
}
