// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The per-request authentication decision.
//!
//! [`JwtAuthenticator::authenticate`] is the single entry point: it locates
//! a token, decodes it, resolves the identity record, and applies CSRF
//! policy for cookie-borne tokens. Every request lands on exactly one
//! [`AuthOutcome`], reported to the diagnostic side channel (structured
//! logs plus the audit trail) without changing the caller-visible result.
//!
//! ## Decision Table
//!
//! | Token source | Decode/resolve | CSRF   | Result                       |
//! |--------------|----------------|--------|------------------------------|
//! | none         | -              | -      | anonymous (`None`)           |
//! | header       | ok             | skipped| authenticated                |
//! | cookie       | ok             | ok     | authenticated                |
//! | cookie       | ok             | fail   | 403, never forgiven          |
//! | header       | fail           | -      | 401, never forgiven          |
//! | cookie       | fail           | -      | 401, or `None` when forgiving|

use std::sync::Arc;

use axum::http::{Extensions, HeaderMap, Method};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use utoipa::ToSchema;

use super::claims::Claims;
use super::csrf::CsrfProtection;
use super::decoder::{DecodeError, TokenDecoder};
use super::error::AuthError;
use super::locate::TokenLocator;
use super::reconcile::{ClaimMapping, IdentityReconciler, ResolvedUser};
use crate::config::AuthSettings;
use crate::storage::{AuditSink, AuthEvent, AuthEventKind, UserRecord, UserStore};

// =============================================================================
// Outcome & Context Types
// =============================================================================

/// Which transport carried the trusted token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum AuthTransport {
    #[serde(rename = "auth-header")]
    AuthorizationHeader,
    #[serde(rename = "cookie")]
    Cookie,
}

impl AuthTransport {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthTransport::AuthorizationHeader => "auth-header",
            AuthTransport::Cookie => "cookie",
        }
    }
}

impl std::fmt::Display for AuthTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The six mutually exclusive authentication outcomes.
///
/// Exactly one is reported per request, diagnostics only: outcomes never
/// alter the caller-visible result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    NoToken,
    SuccessHeader,
    SuccessCookie,
    ForgivenFailure,
    FailedHeader,
    FailedCookie,
}

impl AuthOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthOutcome::NoToken => "no-token",
            AuthOutcome::SuccessHeader => "success-auth-header",
            AuthOutcome::SuccessCookie => "success-cookie",
            AuthOutcome::ForgivenFailure => "forgiven-failure",
            AuthOutcome::FailedHeader => "failed-auth-header",
            AuthOutcome::FailedCookie => "failed-cookie",
        }
    }
}

/// How the current request authenticated.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub transport: AuthTransport,
    /// Held for on-demand claim re-decoding. Never logged or serialized.
    raw_token: String,
}

/// An authenticated identity attached to the request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: UserRecord,
    pub context: AuthContext,
}

impl CurrentUser {
    pub fn new(user: UserRecord, transport: AuthTransport, raw_token: impl Into<String>) -> Self {
        Self {
            user,
            context: AuthContext {
                transport,
                raw_token: raw_token.into(),
            },
        }
    }

    pub fn username(&self) -> &str {
        self.user.username()
    }

    pub fn is_staff(&self) -> bool {
        self.user.is_staff()
    }

    /// Whether the trusted token arrived in a cookie.
    pub fn authenticated_via_cookie(&self) -> bool {
        self.context.transport == AuthTransport::Cookie
    }

    /// Re-decode the claims from the token that authenticated this request.
    ///
    /// Decodes on demand rather than caching: claims reflect the token,
    /// not a snapshot taken at authentication time.
    pub async fn decoded_claims(&self, decoder: &dyn TokenDecoder) -> Result<Claims, DecodeError> {
        decoder.decode(&self.context.raw_token).await
    }
}

/// Fetch the authenticated user recorded on a request, if any.
pub fn current_user(extensions: &Extensions) -> Option<&CurrentUser> {
    extensions.get::<CurrentUser>()
}

/// Whether the request authenticated through this mechanism.
pub fn is_authenticated(extensions: &Extensions) -> bool {
    current_user(extensions).is_some()
}

/// First 8 bytes of the token's SHA-256, hex encoded.
///
/// Lets logs and audit events correlate sightings of one token without
/// ever storing the token itself.
pub fn token_fingerprint(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}

// =============================================================================
// JwtAuthenticator
// =============================================================================

/// Stateless per-request authentication engine.
pub struct JwtAuthenticator {
    locator: TokenLocator,
    decoder: Arc<dyn TokenDecoder>,
    csrf: Arc<dyn CsrfProtection>,
    reconciler: IdentityReconciler,
    forgive_cookie_failures: bool,
    audit: Arc<dyn AuditSink>,
}

impl JwtAuthenticator {
    pub fn new(
        settings: &AuthSettings,
        decoder: Arc<dyn TokenDecoder>,
        csrf: Arc<dyn CsrfProtection>,
        store: Arc<dyn UserStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let mapping = ClaimMapping::new(
            settings.claim_attribute_map.clone(),
            settings.mergeable_attributes.clone(),
        );
        Self {
            locator: TokenLocator::new(
                settings.auth_scheme.as_str(),
                settings.jwt_cookie_name.as_str(),
            ),
            decoder,
            csrf,
            reconciler: IdentityReconciler::new(store, mapping),
            forgive_cookie_failures: settings.forgive_cookie_failures,
            audit,
        }
    }

    /// Authenticate one request.
    ///
    /// Returns `Ok(None)` for anonymous requests (no token, or a forgiven
    /// cookie failure), `Ok(Some)` on success, and an error otherwise. The
    /// error's kind maps to the response status: authentication failures
    /// are 401, CSRF rejections 403.
    pub async fn authenticate(
        &self,
        method: &Method,
        headers: &HeaderMap,
    ) -> Result<Option<CurrentUser>, AuthError> {
        let located = self.locator.locate(headers);
        let via_cookie = located.used_cookie_for_auth();

        let Some(raw) = located.selected() else {
            debug!(outcome = AuthOutcome::NoToken.as_str(), "no token on request");
            return Ok(None);
        };
        let raw = raw.to_string();
        let fingerprint = token_fingerprint(&raw);
        let transport = if via_cookie {
            AuthTransport::Cookie
        } else {
            AuthTransport::AuthorizationHeader
        };

        match self.decode_and_resolve(&raw).await {
            Ok(resolved) => {
                // Success path. Cookie transport must additionally pass CSRF;
                // a CSRF rejection is a hard 403, never forgiven.
                if via_cookie {
                    if let Err(rejection) = self.csrf.validate(method, headers) {
                        warn!(
                            username = resolved.record.username(),
                            token_fingerprint = %fingerprint,
                            reason = rejection.reason(),
                            "cookie-authenticated request failed CSRF validation"
                        );
                        self.record_audit(
                            AuthEvent::new(AuthEventKind::PermissionDenied)
                                .with_username(resolved.record.username())
                                .with_transport(transport.as_str())
                                .with_fingerprint(fingerprint)
                                .with_error(rejection.reason()),
                        );
                        return Err(AuthError::CsrfRejected(rejection.reason().to_string()));
                    }
                }

                let outcome = if via_cookie {
                    AuthOutcome::SuccessCookie
                } else {
                    AuthOutcome::SuccessHeader
                };
                debug!(
                    outcome = outcome.as_str(),
                    username = resolved.record.username(),
                    transport = transport.as_str(),
                    "request authenticated"
                );
                self.audit_success(&resolved, outcome, transport, &fingerprint);

                Ok(Some(CurrentUser {
                    user: resolved.record,
                    context: AuthContext {
                        transport,
                        raw_token: raw,
                    },
                }))
            }
            Err(err) => {
                let detail = error_detail(&err);
                if self.forgive_cookie_failures && via_cookie {
                    debug!(
                        outcome = AuthOutcome::ForgivenFailure.as_str(),
                        token_fingerprint = %fingerprint,
                        error = %detail,
                        "cookie authentication failed, treating request as anonymous"
                    );
                    self.record_audit(
                        AuthEvent::new(AuthEventKind::AuthFailure)
                            .with_outcome(AuthOutcome::ForgivenFailure.as_str())
                            .with_transport(transport.as_str())
                            .with_fingerprint(fingerprint)
                            .with_error(detail),
                    );
                    return Ok(None);
                }

                let outcome = if via_cookie {
                    AuthOutcome::FailedCookie
                } else {
                    AuthOutcome::FailedHeader
                };
                warn!(
                    outcome = outcome.as_str(),
                    token_fingerprint = %fingerprint,
                    error = %detail,
                    "authentication failed"
                );
                self.record_audit(
                    AuthEvent::new(AuthEventKind::AuthFailure)
                        .with_outcome(outcome.as_str())
                        .with_transport(transport.as_str())
                        .with_fingerprint(fingerprint)
                        .with_error(detail),
                );
                Err(err)
            }
        }
    }

    async fn decode_and_resolve(&self, raw: &str) -> Result<ResolvedUser, AuthError> {
        let claims = match self.decoder.decode(raw).await {
            Ok(claims) => claims,
            Err(err) => {
                debug!(error = %err, "token decode failed");
                return Err(AuthError::InvalidToken(err));
            }
        };
        self.reconciler.resolve(&claims)
    }

    fn audit_success(
        &self,
        resolved: &ResolvedUser,
        outcome: AuthOutcome,
        transport: AuthTransport,
        fingerprint: &str,
    ) {
        self.record_audit(
            AuthEvent::new(AuthEventKind::AuthSuccess)
                .with_username(resolved.record.username())
                .with_outcome(outcome.as_str())
                .with_transport(transport.as_str())
                .with_fingerprint(fingerprint),
        );
        if resolved.created {
            self.record_audit(
                AuthEvent::new(AuthEventKind::UserCreated)
                    .with_username(resolved.record.username()),
            );
        } else if resolved.updated {
            self.record_audit(
                AuthEvent::new(AuthEventKind::UserUpdated)
                    .with_username(resolved.record.username()),
            );
        }
    }

    // Audit writes are best-effort: never fail the request over them
    fn record_audit(&self, event: AuthEvent) {
        if let Err(err) = self.audit.record(&event) {
            debug!(error = %err, "failed to record auth event");
        }
    }
}

/// Underlying failure detail for the side channel. Client-facing messages
/// stay generic; this string goes to logs and audit events only.
fn error_detail(err: &AuthError) -> String {
    use std::error::Error;
    match err.source() {
        Some(source) => source.to_string(),
        None => err.to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================
