// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Identity Storage Module
//!
//! Persistent storage for identity records and the authentication audit
//! trail, backed by **redb** (embedded, pure-Rust, ACID). The database
//! lives under `DATA_DIR` (default `/data`).
//!
//! ## Storage Layout
//!
//! ```text
//! /data/
//!   auth.redb           # Single-file redb database
//!     users             #   username -> UserRecord (JSON)
//!     auth_events       #   !timestamp|event_id -> AuthEvent (JSON)
//! ```
//!
//! ## Important Notes
//!
//! - redb serializes writers, so fetch-or-create is atomic without
//!   application-level locking
//! - Audit keys embed an inverted timestamp so forward scans run
//!   newest-first
//! - Raw tokens are never persisted, only fingerprints

pub mod audit;
pub mod database;
pub mod users;

pub use audit::{AuditSink, AuthEvent, AuthEventKind};
pub use database::{AuthDatabase, StoreError, StoreResult};
pub use users::{UserRecord, UserStore, STAFF_ATTRIBUTE};
