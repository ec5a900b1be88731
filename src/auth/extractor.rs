// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated users.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is CurrentUser
//! }
//! ```
//!
//! The authentication middleware normally runs first and stashes the
//! [`CurrentUser`] in request extensions; the extractors pick it up from
//! there. When the middleware is not layered (direct handler tests, for
//! instance), they fall back to running the authenticator themselves, so
//! the decision is made exactly once either way.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::authenticator::CurrentUser;
use super::error::AuthError;
use crate::state::AppState;

/// Extractor that requires an authenticated user.
///
/// Rejects with 401 when the request is anonymous (no token, or a
/// forgiven cookie failure) and with the authenticator's own error when
/// authentication fails outright.
pub struct Auth(pub CurrentUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // First check if middleware already set the user
        if let Some(user) = parts.extensions.get::<CurrentUser>().cloned() {
            return Ok(Auth(user));
        }

        match state
            .authenticator
            .authenticate(&parts.method, &parts.headers)
            .await?
        {
            Some(user) => {
                // Cache for any further extractors on this request
                parts.extensions.insert(user.clone());
                Ok(Auth(user))
            }
            None => Err(AuthError::MissingCredentials),
        }
    }
}

/// Extractor that additionally requires the staff attribute.
pub struct StaffOnly(pub CurrentUser);

impl FromRequestParts<AppState> for StaffOnly {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if !user.is_staff() {
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(StaffOnly(user))
    }
}

/// Optional authentication extractor.
///
/// Returns `None` instead of rejecting when the request cannot be
/// authenticated, whatever the reason.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Try to authenticate, but don't fail if it doesn't work
        match Auth::from_request_parts(parts, state).await {
            Ok(Auth(user)) => Ok(OptionalAuth(Some(user))),
            Err(_) => Ok(OptionalAuth(None)),
        }
    }
}
