// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token location: which transport is carrying the JWT?
//!
//! A request may carry a token in the `Authorization` header, in a named
//! cookie, or both. The header wins when both are present. Whether the
//! *cookie* is the transport actually being trusted matters downstream:
//! cookie-borne tokens get CSRF enforcement and are eligible for the
//! forgiving failure policy, header-borne tokens get neither.
//!
//! Extraction never fails: malformed headers, non-UTF8 bytes, or a missing
//! cookie jar all read as "no token on that transport".

use axum::http::{header, HeaderMap};

/// Candidate tokens found on a request, one slot per transport.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocatedTokens {
    pub header: Option<String>,
    pub cookie: Option<String>,
}

impl LocatedTokens {
    /// The token the authentication flow will decode. Header precedence.
    pub fn selected(&self) -> Option<&str> {
        self.header.as_deref().or(self.cookie.as_deref())
    }

    /// True iff a cookie token exists and matches the selected token.
    ///
    /// Textual equality against the selected token keeps this consistent
    /// with the precedence rule: when header and cookie carry the same
    /// text, the request counts as cookie-authenticated.
    pub fn used_cookie_for_auth(&self) -> bool {
        match (self.cookie.as_deref(), self.selected()) {
            (Some(cookie), Some(selected)) => cookie == selected,
            _ => false,
        }
    }
}

/// Extracts candidate tokens from the configured header scheme and cookie.
#[derive(Debug, Clone)]
pub struct TokenLocator {
    scheme: String,
    cookie_name: String,
}

impl TokenLocator {
    pub fn new(scheme: impl Into<String>, cookie_name: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            cookie_name: cookie_name.into(),
        }
    }

    /// Extract candidate tokens from both transports.
    pub fn locate(&self, headers: &HeaderMap) -> LocatedTokens {
        LocatedTokens {
            header: self.token_from_header(headers),
            cookie: self.token_from_cookie(headers),
        }
    }

    /// Shorthand for `locate(...).used_cookie_for_auth()`.
    pub fn used_cookie_for_auth(&self, headers: &HeaderMap) -> bool {
        self.locate(headers).used_cookie_for_auth()
    }

    /// Parse `Authorization: <scheme> <token>`.
    ///
    /// Scheme comparison is case-insensitive. A missing scheme, missing
    /// token, or trailing junk yields `None` rather than an error.
    fn token_from_header(&self, headers: &HeaderMap) -> Option<String> {
        let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        let mut parts = value.split_whitespace();
        let scheme = parts.next()?;
        let token = parts.next()?;
        if parts.next().is_some() {
            return None;
        }
        if !scheme.eq_ignore_ascii_case(&self.scheme) {
            return None;
        }
        Some(token.to_string())
    }

    fn token_from_cookie(&self, headers: &HeaderMap) -> Option<String> {
        cookie_value(headers, &self.cookie_name)
    }
}

/// Find the named cookie across all `Cookie` headers. First match wins,
/// empty values read as absent. Shared with the CSRF check.
pub(crate) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    for value in headers.get_all(header::COOKIE) {
        let s = match value.to_str() {
            Ok(s) => s,
            Err(_) => continue,
        };
        for part in s.split(';') {
            let p = part.trim();
            if let Some(eq) = p.find('=') {
                let (k, v) = p.split_at(eq);
                if k == name && v.len() > 1 {
                    return Some(v[1..].to_string());
                }
            }
        }
    }
    None
}
