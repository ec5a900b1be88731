// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only API endpoints for operator visibility.
//!
//! These endpoints require the staff attribute and provide:
//! - User directory overview (admin view)
//! - Per-user detail including provisioned attributes
//! - Authentication audit trail queries

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

use crate::{auth::StaffOnly, error::ApiError, state::AppState, storage::AuthEvent};

/// Number of audit events returned when the query omits `limit`.
const DEFAULT_AUDIT_LIMIT: usize = 100;

/// Upper bound on a single audit query.
const MAX_AUDIT_LIMIT: usize = 1000;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response for the admin user directory.
#[derive(Debug, Serialize, ToSchema)]
pub struct AdminUserListResponse {
    /// Usernames of every provisioned user, lexicographically sorted.
    pub users: Vec<String>,
    /// Total user count.
    pub total: usize,
}

/// Detailed view of a single provisioned user.
#[derive(Debug, Serialize, ToSchema)]
pub struct AdminUserDetailResponse {
    /// Username asserted by the identity provider.
    pub username: String,
    /// When the local record was first provisioned.
    pub created_at: String,
    /// When the local record last changed.
    pub updated_at: String,
    /// Whether the user passes the staff gate.
    pub is_staff: bool,
    /// Attributes synced from token claims.
    #[schema(value_type = Object)]
    pub attributes: BTreeMap<String, Value>,
}

/// Query parameters for audit trail queries.
#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditQueryParams {
    /// Maximum number of events to return (default 100, capped at 1000).
    pub limit: Option<usize>,
}

/// Response for audit trail queries.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogResponse {
    /// Authentication events, most recent first.
    pub events: Vec<AuthEvent>,
    /// Number of events returned.
    pub total: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// List all provisioned users.
///
/// Returns the usernames of every user the server has provisioned from
/// a verified token. Staff only.
#[utoipa::path(
    get,
    path = "/v1/admin/users",
    tag = "Admin",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "All provisioned users", body = AdminUserListResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (staff required)")
    )
)]
pub async fn list_users(
    StaffOnly(_user): StaffOnly,
    State(state): State<AppState>,
) -> Result<Json<AdminUserListResponse>, ApiError> {
    let users = state.users.list_usernames()?;
    let total = users.len();

    Ok(Json(AdminUserListResponse { users, total }))
}

/// Get one user's provisioned record.
///
/// Returns timestamps, the staff flag, and all attributes synced from
/// token claims. Staff only.
#[utoipa::path(
    get,
    path = "/v1/admin/users/{username}",
    tag = "Admin",
    params(("username" = String, Path, description = "Username to look up")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User detail", body = AdminUserDetailResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (staff required)"),
        (status = 404, description = "No such user")
    )
)]
pub async fn get_user(
    StaffOnly(_user): StaffOnly,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<AdminUserDetailResponse>, ApiError> {
    let record = state
        .users
        .get(&username)?
        .ok_or_else(|| ApiError::not_found(format!("No user named {username}")))?;

    Ok(Json(AdminUserDetailResponse {
        username: record.username().to_string(),
        created_at: record.created_at().to_rfc3339(),
        updated_at: record.updated_at().to_rfc3339(),
        is_staff: record.is_staff(),
        attributes: record.attributes().clone(),
    }))
}

/// Query the authentication audit trail.
///
/// Returns the most recent authentication events, newest first. Staff only.
#[utoipa::path(
    get,
    path = "/v1/admin/audit",
    tag = "Admin",
    params(AuditQueryParams),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Recent authentication events", body = AuditLogResponse),
        (status = 400, description = "Invalid query parameters"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (staff required)")
    )
)]
pub async fn query_audit_log(
    StaffOnly(_user): StaffOnly,
    State(state): State<AppState>,
    Query(params): Query<AuditQueryParams>,
) -> Result<Json<AuditLogResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_AUDIT_LIMIT);
    if limit == 0 {
        return Err(ApiError::bad_request("limit must be at least 1"));
    }
    let limit = limit.min(MAX_AUDIT_LIMIT);

    let events = state.audit.recent(limit)?;
    let total = events.len();

    Ok(Json(AuditLogResponse { events, total }))
}

// ============================================================================
// Tests
// ============================================================================
