// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Auth - JWT Authentication Service
//!
//! This crate provides a standalone authentication service that verifies
//! JWTs issued by an external identity provider, provisions local user
//! records from token claims, and guards its API with header- or
//! cookie-presented tokens (the latter behind double-submit CSRF checks).
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token location, verification, CSRF, and identity sync
//! - `storage` - User records and audit trail (redb)
//! - `jwks_refresher` - Background verification-key refresh

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod jwks_refresher;
pub mod state;
pub mod storage;
