// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::decoder::DecodeError;
use crate::storage::StoreError;

/// The two classes of authentication failure exposed to callers.
///
/// Everything that goes wrong while establishing *who* the caller is maps to
/// `AuthenticationFailed` (401). `PermissionDenied` (403) means the caller's
/// identity was fine but the request itself is not allowed (CSRF rejection,
/// missing staff bit).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    AuthenticationFailed,
    PermissionDenied,
}

/// Authentication error type.
///
/// Token decode failures are carried opaquely: the flow never branches on
/// what went wrong inside the decoder, only the diagnostic side channel
/// (logs, audit events) sees the detail.
#[derive(Debug)]
pub enum AuthError {
    /// No usable credentials and the endpoint requires authentication
    MissingCredentials,
    /// Token failed decoding or verification
    InvalidToken(DecodeError),
    /// Verified claims lack both `preferred_username` and `username`
    MissingUsernameClaim,
    /// The identity store failed while resolving the user
    IdentityResolution {
        username: String,
        source: StoreError,
    },
    /// Double-submit CSRF validation rejected the request
    CsrfRejected(String),
    /// Authenticated but not staff
    InsufficientPermissions,
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Classify this error as one of the two caller-visible kinds.
    pub fn kind(&self) -> AuthErrorKind {
        match self {
            AuthError::MissingCredentials
            | AuthError::InvalidToken(_)
            | AuthError::MissingUsernameClaim
            | AuthError::IdentityResolution { .. } => AuthErrorKind::AuthenticationFailed,
            AuthError::CsrfRejected(_) | AuthError::InsufficientPermissions => {
                AuthErrorKind::PermissionDenied
            }
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "missing_credentials",
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::MissingUsernameClaim => "missing_username_claim",
            AuthError::IdentityResolution { .. } => "identity_resolution_failed",
            AuthError::CsrfRejected(_) => "csrf_rejected",
            AuthError::InsufficientPermissions => "insufficient_permissions",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            AuthErrorKind::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            AuthErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingCredentials => {
                write!(f, "Authentication credentials were not provided")
            }
            // Deliberately generic: decode detail stays in the source chain
            // and the logs, never in the response body.
            AuthError::InvalidToken(_) => write!(f, "Token verification failed"),
            AuthError::MissingUsernameClaim => {
                write!(f, "JWT must include a preferred_username or username claim")
            }
            AuthError::IdentityResolution { username, .. } => {
                write!(f, "Identity resolution failed for user {username}")
            }
            AuthError::CsrfRejected(reason) => write!(f, "CSRF check failed: {reason}"),
            AuthError::InsufficientPermissions => {
                write!(f, "Insufficient permissions for this operation")
            }
        }
    }
}

impl std::error::Error for AuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AuthError::InvalidToken(e) => Some(e),
            AuthError::IdentityResolution { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
