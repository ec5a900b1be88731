// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values, and the
//! typed configuration loaded from the environment at startup. Parsing is
//! strict: a malformed value is a startup error, never a silent fallback.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Root directory for the identity database | `/data` |
//! | `JWT_JWKS_URL` | JWKS endpoint for JWT verification | Required for production |
//! | `JWT_ISSUER` | Expected JWT issuer claim | Optional |
//! | `JWT_AUDIENCE` | Expected JWT audience claim | Optional |
//! | `JWT_AUTH_SCHEME` | `Authorization` header scheme | `Bearer` |
//! | `JWT_COOKIE_NAME` | Cookie carrying the JWT | `auth_token` |
//! | `CSRF_COOKIE_NAME` | Cookie carrying the CSRF token | `csrf_token` |
//! | `CSRF_HEADER_NAME` | Header echoing the CSRF token | `x-csrf-token` |
//! | `JWT_FORGIVE_COOKIE_FAILURES` | Treat invalid cookie tokens as anonymous | `false` |
//! | `JWT_CLAIM_ATTRIBUTE_MAP` | Ordered `claim:attribute` pairs | see below |
//! | `JWT_MERGEABLE_ATTRIBUTES` | Attributes merged key-by-key | empty |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::collections::HashSet;
use std::env;
use std::path::PathBuf;

use url::Url;

// =============================================================================
// Environment Variable Names
// =============================================================================

/// Root directory for the identity database.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
/// JWKS endpoint of the identity provider. When unset, the server refuses
/// to start unless built with the `dev` feature.
pub const JWKS_URL_ENV: &str = "JWT_JWKS_URL";
pub const ISSUER_ENV: &str = "JWT_ISSUER";
pub const AUDIENCE_ENV: &str = "JWT_AUDIENCE";
pub const AUTH_SCHEME_ENV: &str = "JWT_AUTH_SCHEME";
pub const JWT_COOKIE_ENV: &str = "JWT_COOKIE_NAME";
pub const CSRF_COOKIE_ENV: &str = "CSRF_COOKIE_NAME";
pub const CSRF_HEADER_ENV: &str = "CSRF_HEADER_NAME";
pub const FORGIVE_COOKIE_FAILURES_ENV: &str = "JWT_FORGIVE_COOKIE_FAILURES";
/// Ordered `claim:attribute` pairs, comma separated.
pub const CLAIM_ATTRIBUTE_MAP_ENV: &str = "JWT_CLAIM_ATTRIBUTE_MAP";
/// Comma-separated attribute names merged key-by-key instead of overwritten.
pub const MERGEABLE_ATTRIBUTES_ENV: &str = "JWT_MERGEABLE_ATTRIBUTES";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

// =============================================================================
// Defaults
// =============================================================================

pub const DEFAULT_DATA_DIR: &str = "/data";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_AUTH_SCHEME: &str = "Bearer";
pub const DEFAULT_JWT_COOKIE: &str = "auth_token";
pub const DEFAULT_CSRF_COOKIE: &str = "csrf_token";
pub const DEFAULT_CSRF_HEADER: &str = "x-csrf-token";
pub const DEFAULT_CLAIM_ATTRIBUTE_MAP: &str = "administrator:is_staff,email:email,name:full_name";
/// Database file name under `DATA_DIR`.
pub const DATABASE_FILE: &str = "auth.redb";

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be a valid port number, got {1:?}")]
    InvalidPort(&'static str, String),

    #[error("{0} is not a valid URL: {1:?}")]
    InvalidUrl(&'static str, String),

    #[error("{0} entry {1:?} must be formatted as claim:attribute")]
    InvalidMapEntry(&'static str, String),

    #[error("{0} must be a boolean (true/false/1/0/yes/no), got {1:?}")]
    InvalidBool(&'static str, String),
}

// =============================================================================
// AuthSettings
// =============================================================================

/// Authentication behavior knobs, independent of the server runtime.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// `Authorization` header scheme (case-insensitive match).
    pub auth_scheme: String,
    /// Cookie carrying the JWT.
    pub jwt_cookie_name: String,
    /// Cookie carrying the CSRF token.
    pub csrf_cookie_name: String,
    /// Header echoing the CSRF token.
    pub csrf_header_name: String,
    /// Treat invalid cookie tokens as anonymous instead of rejecting.
    pub forgive_cookie_failures: bool,
    /// Ordered `(claim, attribute)` pairs synced at authentication time.
    pub claim_attribute_map: Vec<(String, String)>,
    /// Attributes merged key-by-key instead of overwritten.
    pub mergeable_attributes: HashSet<String>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            auth_scheme: DEFAULT_AUTH_SCHEME.to_string(),
            jwt_cookie_name: DEFAULT_JWT_COOKIE.to_string(),
            csrf_cookie_name: DEFAULT_CSRF_COOKIE.to_string(),
            csrf_header_name: DEFAULT_CSRF_HEADER.to_string(),
            forgive_cookie_failures: false,
            claim_attribute_map: vec![
                ("administrator".to_string(), "is_staff".to_string()),
                ("email".to_string(), "email".to_string()),
                ("name".to_string(), "full_name".to_string()),
            ],
            mergeable_attributes: HashSet::new(),
        }
    }
}

impl AuthSettings {
    /// Load from the environment, falling back to defaults per variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            auth_scheme: env_or(AUTH_SCHEME_ENV, DEFAULT_AUTH_SCHEME),
            jwt_cookie_name: env_or(JWT_COOKIE_ENV, DEFAULT_JWT_COOKIE),
            csrf_cookie_name: env_or(CSRF_COOKIE_ENV, DEFAULT_CSRF_COOKIE),
            csrf_header_name: env_or(CSRF_HEADER_ENV, DEFAULT_CSRF_HEADER),
            forgive_cookie_failures: match env::var(FORGIVE_COOKIE_FAILURES_ENV) {
                Ok(raw) => parse_bool(FORGIVE_COOKIE_FAILURES_ENV, &raw)?,
                Err(_) => false,
            },
            claim_attribute_map: match env::var(CLAIM_ATTRIBUTE_MAP_ENV) {
                Ok(raw) => parse_claim_attribute_map(CLAIM_ATTRIBUTE_MAP_ENV, &raw)?,
                Err(_) => defaults.claim_attribute_map,
            },
            mergeable_attributes: match env::var(MERGEABLE_ATTRIBUTES_ENV) {
                Ok(raw) => parse_name_set(&raw),
                Err(_) => HashSet::new(),
            },
        })
    }
}

// =============================================================================
// ServerConfig
// =============================================================================

/// Full server configuration loaded at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// JWKS endpoint. `None` only makes sense with the `dev` feature.
    pub jwks_url: Option<Url>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub auth: AuthSettings,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match env::var(PORT_ENV) {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(PORT_ENV, raw.clone()))?,
            Err(_) => DEFAULT_PORT,
        };

        let jwks_url = match env::var(JWKS_URL_ENV) {
            Ok(raw) => Some(
                Url::parse(&raw).map_err(|_| ConfigError::InvalidUrl(JWKS_URL_ENV, raw.clone()))?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            host: env_or(HOST_ENV, DEFAULT_HOST),
            port,
            data_dir: PathBuf::from(env_or(DATA_DIR_ENV, DEFAULT_DATA_DIR)),
            jwks_url,
            issuer: env::var(ISSUER_ENV).ok(),
            audience: env::var(AUDIENCE_ENV).ok(),
            auth: AuthSettings::from_env()?,
        })
    }

    /// Path of the redb database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }
}

// =============================================================================
// Parsing helpers
// =============================================================================

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Parse ordered `claim:attribute` pairs. Empty segments (from trailing
/// commas) are tolerated; a non-empty segment without both sides is an
/// error.
pub fn parse_claim_attribute_map(
    name: &'static str,
    raw: &str,
) -> Result<Vec<(String, String)>, ConfigError> {
    let mut pairs = Vec::new();
    for segment in raw.split(',') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let (claim, attribute) = segment
            .split_once(':')
            .ok_or_else(|| ConfigError::InvalidMapEntry(name, segment.to_string()))?;
        let (claim, attribute) = (claim.trim(), attribute.trim());
        if claim.is_empty() || attribute.is_empty() {
            return Err(ConfigError::InvalidMapEntry(name, segment.to_string()));
        }
        pairs.push((claim.to_string(), attribute.to_string()));
    }
    Ok(pairs)
}

/// Parse a comma-separated name set, ignoring empty segments.
pub fn parse_name_set(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidBool(name, raw.to_string())),
    }
}

// =============================================================================
// Tests
// =============================================================================
