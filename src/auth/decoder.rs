// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token decoding boundary.
//!
//! The authentication flow only sees the `TokenDecoder` trait and treats
//! every `DecodeError` the same way: the request is not authenticated. The
//! flow never branches on *why* decoding failed (expired vs malformed vs
//! keys unavailable); that detail exists for logs and audit events only.
//!
//! ## Authentication Modes
//!
//! - **Production** (`JWT_JWKS_URL` set): `JwksDecoder`, full signature
//!   verification against the identity provider's key set
//! - **Development** (`dev` feature, no JWKS URL): `InsecureDecoder`,
//!   structure and expiry checks only (no signature check)

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use jsonwebtoken::{decode, decode_header, Validation};

use super::claims::Claims;
use super::jwks::JwksManager;

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Opaque decode failure.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The token itself failed validation (signature, expiry, structure).
    #[error("token validation failed: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// Verification keys could not be obtained or used.
    #[error("signing keys unavailable: {0}")]
    Keys(String),
}

/// Boxed future returned by [`TokenDecoder::decode`].
pub type DecodeFuture<'a> = Pin<Box<dyn Future<Output = Result<Claims, DecodeError>> + Send + 'a>>;

/// Verifies a raw token and produces its claims.
///
/// Object-safe so the application state can hold `Arc<dyn TokenDecoder>`
/// and tests can substitute instrumented fakes.
pub trait TokenDecoder: Send + Sync {
    fn decode<'a>(&'a self, raw: &'a str) -> DecodeFuture<'a>;
}

/// Production decoder: JWKS-backed signature verification.
pub struct JwksDecoder {
    jwks: Arc<JwksManager>,
    issuer: Option<String>,
    audience: Option<String>,
}

impl JwksDecoder {
    pub fn new(jwks: Arc<JwksManager>) -> Self {
        Self {
            jwks,
            issuer: None,
            audience: None,
        }
    }

    /// Require the `iss` claim to match.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Require the `aud` claim to match.
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    async fn decode_verified(&self, raw: &str) -> Result<Claims, DecodeError> {
        // Decode header to get kid (key ID)
        let header = decode_header(raw)?;

        let (decoding_key, algorithm) = match &header.kid {
            Some(kid) => self.jwks.get_decoding_key(kid).await?,
            // No kid in header, try any key
            None => self.jwks.get_any_decoding_key().await?,
        };

        let mut validation = Validation::new(algorithm);
        validation.leeway = CLOCK_SKEW_LEEWAY;

        if let Some(ref issuer) = self.issuer {
            validation.set_issuer(&[issuer]);
        }

        if let Some(ref audience) = self.audience {
            validation.set_audience(&[audience]);
        } else {
            validation.validate_aud = false;
        }

        let token_data = decode::<Claims>(raw, &decoding_key, &validation)?;
        Ok(token_data.claims)
    }
}

impl TokenDecoder for JwksDecoder {
    fn decode<'a>(&'a self, raw: &'a str) -> DecodeFuture<'a> {
        Box::pin(self.decode_verified(raw))
    }
}

/// Development decoder: no signature verification.
///
/// WARNING: only compiled with the `dev` feature and only selected when no
/// JWKS URL is configured. Expiry is still honored.
#[cfg(feature = "dev")]
pub struct InsecureDecoder;

#[cfg(feature = "dev")]
impl InsecureDecoder {
    fn decode_unverified(raw: &str) -> Result<Claims, DecodeError> {
        let token_data = jsonwebtoken::dangerous::insecure_decode::<Claims>(raw)?;
        let claims = token_data.claims;

        // Check expiration manually since signature validation is skipped
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;

        if let Some(exp) = claims.get("exp").and_then(|v| v.as_i64()) {
            if exp > 0 && exp < now - CLOCK_SKEW_LEEWAY as i64 {
                return Err(DecodeError::Jwt(
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature.into(),
                ));
            }
        }

        Ok(claims)
    }
}

#[cfg(feature = "dev")]
impl TokenDecoder for InsecureDecoder {
    fn decode<'a>(&'a self, raw: &'a str) -> DecodeFuture<'a> {
        let result = Self::decode_unverified(raw);
        Box::pin(async move { result })
    }
}
