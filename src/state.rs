// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared application state.
//!
//! Everything request handling needs hangs off [`AppState`]: settings,
//! the token decoder, the identity store, the audit sink, and the
//! authenticator wired from all of them. Components sit behind `Arc<dyn>`
//! seams so tests can substitute instrumented implementations.

use std::sync::Arc;

use crate::auth::authenticator::JwtAuthenticator;
use crate::auth::csrf::{CsrfProtection, DoubleSubmitCsrf};
use crate::auth::decoder::TokenDecoder;
use crate::auth::jwks::JwksManager;
use crate::config::AuthSettings;
use crate::storage::{AuditSink, UserStore};

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<AuthSettings>,
    pub decoder: Arc<dyn TokenDecoder>,
    pub users: Arc<dyn UserStore>,
    pub audit: Arc<dyn AuditSink>,
    /// Present only when JWKS verification is configured.
    pub jwks: Option<Arc<JwksManager>>,
    pub authenticator: Arc<JwtAuthenticator>,
}

impl AppState {
    /// Wire up state from its components.
    ///
    /// The CSRF check is the standard double-submit comparison against the
    /// configured cookie and header names.
    pub fn new(
        settings: AuthSettings,
        decoder: Arc<dyn TokenDecoder>,
        users: Arc<dyn UserStore>,
        audit: Arc<dyn AuditSink>,
        jwks: Option<Arc<JwksManager>>,
    ) -> Self {
        let csrf: Arc<dyn CsrfProtection> = Arc::new(DoubleSubmitCsrf::new(
            settings.csrf_cookie_name.as_str(),
            settings.csrf_header_name.as_str(),
        ));
        let authenticator = Arc::new(JwtAuthenticator::new(
            &settings,
            decoder.clone(),
            csrf,
            users.clone(),
            audit.clone(),
        ));
        Self {
            settings: Arc::new(settings),
            decoder,
            users,
            audit,
            jwks,
            authenticator,
        }
    }
}
