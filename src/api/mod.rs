// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{http::header, middleware::from_fn_with_state, routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{middleware::authenticate_request, AuthTransport, Claims},
    state::AppState,
    storage::{AuthEvent, AuthEventKind},
};

use admin::{AdminUserDetailResponse, AdminUserListResponse, AuditLogResponse};
use health::{HealthChecks, HealthResponse, ReadyResponse};
use users::UserMeResponse;

pub mod admin;
pub mod health;
pub mod users;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/users/me", get(users::get_current_user))
        .route("/users/me/claims", get(users::get_current_user_claims))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{username}", get(admin::get_user))
        .route("/admin/audit", get(admin::query_audit_log))
        .layer(from_fn_with_state(state.clone(), authenticate_request))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::new(header::HeaderName::from_static(
            "x-request-id",
        )))
        .layer(SetSensitiveRequestHeadersLayer::new([
            header::AUTHORIZATION,
            header::COOKIE,
        ]))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(
            header::HeaderName::from_static("x-request-id"),
            MakeRequestUuid,
        ))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        users::get_current_user,
        users::get_current_user_claims,
        admin::list_users,
        admin::get_user,
        admin::query_audit_log,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            UserMeResponse,
            Claims,
            AuthTransport,
            AdminUserListResponse,
            AdminUserDetailResponse,
            AuditLogResponse,
            AuthEvent,
            AuthEventKind,
            ReadyResponse,
            HealthChecks,
            HealthResponse
        )
    ),
    tags(
        (name = "Users", description = "Authenticated identity"),
        (name = "Admin", description = "Operator tooling (staff only)"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;
