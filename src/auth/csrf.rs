// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Double-submit CSRF validation for cookie-authenticated requests.
//!
//! Header-borne bearer tokens are a deliberate client action and need no
//! CSRF protection; cookies ride along with every browser request, so a
//! cookie-authenticated mutation must also prove it can read the CSRF
//! cookie by echoing it in a request header.
//!
//! Behind a trait so the authentication flow can be tested with counting
//! fakes (the flow must provably never invoke this for header tokens).

use axum::http::{HeaderMap, Method};

use super::locate::cookie_value;

/// Why a CSRF check rejected the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrfRejection {
    MissingCookie,
    MissingHeader,
    Mismatch,
}

impl CsrfRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            CsrfRejection::MissingCookie => "CSRF cookie not set",
            CsrfRejection::MissingHeader => "CSRF token missing",
            CsrfRejection::Mismatch => "CSRF token incorrect",
        }
    }
}

impl std::fmt::Display for CsrfRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.reason())
    }
}

/// CSRF check invoked for cookie-authenticated requests.
pub trait CsrfProtection: Send + Sync {
    fn validate(&self, method: &Method, headers: &HeaderMap) -> Result<(), CsrfRejection>;
}

/// Standard double-submit check.
///
/// Safe methods (GET, HEAD, OPTIONS, TRACE) pass unconditionally. For all
/// other methods the CSRF cookie and the CSRF header must both be present
/// and equal under constant-time comparison.
#[derive(Debug, Clone)]
pub struct DoubleSubmitCsrf {
    cookie_name: String,
    header_name: String,
}

impl DoubleSubmitCsrf {
    pub fn new(cookie_name: impl Into<String>, header_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            header_name: header_name.into(),
        }
    }
}

fn is_safe_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

impl CsrfProtection for DoubleSubmitCsrf {
    fn validate(&self, method: &Method, headers: &HeaderMap) -> Result<(), CsrfRejection> {
        if is_safe_method(method) {
            return Ok(());
        }

        let cookie = cookie_value(headers, &self.cookie_name)
            .ok_or(CsrfRejection::MissingCookie)?;

        let submitted = headers
            .get(self.header_name.as_str())
            .and_then(|v| v.to_str().ok())
            .ok_or(CsrfRejection::MissingHeader)?;

        // Constant-time comparison; length mismatch also reads as unequal
        ring::constant_time::verify_slices_are_equal(cookie.as_bytes(), submitted.as_bytes())
            .map_err(|_| CsrfRejection::Mismatch)
    }
}
