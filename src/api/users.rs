// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::auth::authenticator::{AuthTransport, CurrentUser};
use crate::auth::claims::Claims;
use crate::auth::error::AuthError;
use crate::auth::extractor::Auth;
use crate::state::AppState;

/// Response for GET /v1/users/me
#[derive(Debug, Serialize, ToSchema)]
pub struct UserMeResponse {
    /// Provider-issued username
    pub username: String,
    /// Transport that authenticated this request
    pub transport: AuthTransport,
    /// Whether the user may access staff-only endpoints
    pub is_staff: bool,
    /// When the local record was first created
    pub created_at: DateTime<Utc>,
    /// Attributes synced from token claims
    #[schema(value_type = Object)]
    pub attributes: BTreeMap<String, Value>,
}

impl From<CurrentUser> for UserMeResponse {
    fn from(current: CurrentUser) -> Self {
        Self {
            username: current.user.username().to_string(),
            transport: current.context.transport,
            is_staff: current.user.is_staff(),
            created_at: current.user.created_at(),
            attributes: current.user.attributes().clone(),
        }
    }
}

/// Get the current authenticated user's identity record.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User information", body = UserMeResponse),
        (status = 401, description = "Unauthorized - invalid or missing token"),
    )
)]
pub async fn get_current_user(Auth(user): Auth) -> Json<UserMeResponse> {
    Json(user.into())
}

/// Get the decoded claims of the token that authenticated this request.
///
/// Claims are re-decoded from the presented token on demand, so the
/// response always reflects the token itself.
#[utoipa::path(
    get,
    path = "/v1/users/me/claims",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Decoded token claims", body = Claims),
        (status = 401, description = "Unauthorized - invalid or missing token"),
    )
)]
pub async fn get_current_user_claims(
    State(state): State<AppState>,
    Auth(user): Auth,
) -> Result<Json<Claims>, AuthError> {
    let claims = user
        .decoded_claims(state.decoder.as_ref())
        .await
        .map_err(AuthError::InvalidToken)?;
    Ok(Json(claims))
}
