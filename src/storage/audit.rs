// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication audit trail.
//!
//! Every authentication decision and identity mutation can be recorded as
//! an [`AuthEvent`]. Recording is best-effort: a failed audit write never
//! fails the request that produced it. Events never carry raw tokens,
//! only fingerprints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::database::{AuthDatabase, StoreResult};

/// Types of auditable events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuthEventKind {
    /// A request authenticated successfully.
    AuthSuccess,
    /// Token decode or identity resolution failed (including forgiven failures).
    AuthFailure,
    /// An otherwise-valid request was rejected by a permission check
    /// (CSRF, staff gate).
    PermissionDenied,
    /// Identity resolution created a new user record.
    UserCreated,
    /// Identity resolution updated attributes on an existing record.
    UserUpdated,
}

/// A single entry in the authentication audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthEvent {
    /// Unique event ID.
    pub event_id: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub kind: AuthEventKind,
    /// Username involved, when known.
    pub username: Option<String>,
    /// Authentication outcome label, when the event maps to one.
    pub outcome: Option<String>,
    /// Credential transport ("auth-header" or "cookie").
    pub transport: Option<String>,
    /// SHA-256 prefix of the presented token. Never the token itself.
    pub token_fingerprint: Option<String>,
    /// Short failure description, when the event records one.
    pub error: Option<String>,
}

impl AuthEvent {
    /// Create a new audit event.
    pub fn new(kind: AuthEventKind) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind,
            username: None,
            outcome: None,
            transport: None,
            token_fingerprint: None,
            error: None,
        }
    }

    /// Set the username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the outcome label.
    pub fn with_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }

    /// Set the credential transport.
    pub fn with_transport(mut self, transport: impl Into<String>) -> Self {
        self.transport = Some(transport.into());
        self
    }

    /// Set the token fingerprint.
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.token_fingerprint = Some(fingerprint.into());
        self
    }

    /// Attach a failure description.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Destination for auth events.
///
/// Object-safe so the authenticator can run against `Arc<dyn AuditSink>`
/// and tests can capture events in memory.
pub trait AuditSink: Send + Sync {
    /// Record one event.
    fn record(&self, event: &AuthEvent) -> StoreResult<()>;

    /// Most recent events, newest first.
    fn recent(&self, limit: usize) -> StoreResult<Vec<AuthEvent>>;
}

impl AuditSink for AuthDatabase {
    fn record(&self, event: &AuthEvent) -> StoreResult<()> {
        self.append_event(event)
    }

    fn recent(&self, limit: usize) -> StoreResult<Vec<AuthEvent>> {
        self.recent_events(limit)
    }
}
