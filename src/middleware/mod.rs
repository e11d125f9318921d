// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (authentication, security headers, request validation).

pub mod auth;
pub mod security;
pub mod validation;

pub use auth::{require_admin, require_auth, AuthUser};
pub use validation::ValidatedJson;
