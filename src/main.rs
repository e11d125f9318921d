// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pilates studio booking API server.
//!
//! Members sign in with Google, Apple or Microsoft through Firebase, buy
//! credits at the front desk and spend them on class reservations.

use pilates_booking::{
    config::Config, db::Db, services::FirebaseVerifier, AppState, Collaborators,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        utc_offset_minutes = config.studio_utc_offset_minutes,
        "Starting pilates booking API"
    );

    let db = Db::connect(&config.database_url, config.database_max_connections).await?;
    db.migrate().await?;
    tracing::info!(
        max_connections = config.database_max_connections,
        "Database pool ready"
    );

    let verifier = FirebaseVerifier::new(&config.firebase_project_id)?;
    tracing::info!(project = %config.firebase_project_id, "Identity verifier initialized");

    tokio::fs::create_dir_all(&config.upload_dir).await?;

    // Build shared state
    let collaborators = Collaborators::local(&config, Arc::new(verifier));
    let state = Arc::new(AppState::new(config.clone(), db, collaborators));

    // Build router
    let app = pilates_booking::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pilates_booking=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
