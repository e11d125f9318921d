// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign-in with a federated identity token.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

use crate::error::Result;
use crate::middleware::ValidatedJson;
use crate::routes::views::UserResponse;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/login", post(login))
}

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "id_token is required"))]
    pub id_token: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LoginResponse {
    pub user: UserResponse,
    /// No DNI on file yet; the client should ask for one
    pub needs_profile: bool,
}

/// Exchange an identity token for the member's profile.
///
/// Creates the member on first sign-in. The same token is then sent as a
/// bearer token on every API call.
async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let identity = state.identity.verify(body.id_token.trim()).await?;
    let user = state.accounts.login(&identity).await?;
    let balance = state.ledger.balance(user.id).await?;

    tracing::info!(user_id = %user.id, provider = user.provider.as_str(), "Member signed in");

    Ok(Json(LoginResponse {
        needs_profile: user.dni.is_none(),
        user: UserResponse::new(&user, balance),
    }))
}
