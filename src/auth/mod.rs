// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! JWT authentication against an external identity provider, with local
//! identity reconciliation.
//!
//! ## Auth Flow
//!
//! 1. The identity provider issues a JWT; clients present it either as
//!    `Authorization: Bearer <JWT>` or in the configured auth cookie
//! 2. Token location picks the trusted transport (header wins)
//! 3. The decoder verifies the token:
//!    - Production: signature verified against the provider's JWKS
//!    - Development (`dev` feature): structure and expiry checks only
//! 4. Identity reconciliation maps claims onto the stored user record
//!    (`preferred_username`/`username` → record key, configured claim
//!    attributes synced on every request)
//! 5. Cookie-authenticated requests additionally pass double-submit CSRF
//!
//! ## Security
//!
//! - Decode failures are opaque to clients; the reason only reaches logs
//!   and the audit trail
//! - Cookie transport gets CSRF enforcement, header transport does not
//! - CSRF rejections are 403s and are never forgiven
//! - JWKS is fetched over HTTPS and cached with TTL
//! - Clock skew tolerance is 60 seconds
//! - Raw tokens never appear in logs or audit events, only fingerprints

pub mod authenticator;
pub mod claims;
pub mod csrf;
pub mod decoder;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod locate;
pub mod middleware;
pub mod reconcile;

pub use authenticator::{
    current_user, is_authenticated, AuthOutcome, AuthTransport, CurrentUser, JwtAuthenticator,
};
pub use claims::Claims;
pub use csrf::{CsrfProtection, DoubleSubmitCsrf};
#[cfg(feature = "dev")]
pub use decoder::InsecureDecoder;
pub use decoder::{DecodeError, JwksDecoder, TokenDecoder};
pub use error::{AuthError, AuthErrorKind};
pub use extractor::{Auth, OptionalAuth, StaffOnly};
pub use jwks::JwksManager;
pub use locate::TokenLocator;
pub use reconcile::{ClaimMapping, IdentityReconciler};
