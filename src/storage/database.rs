// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded identity database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: username → serialized UserRecord
//! - `auth_events`: composite key (!timestamp_be|event_id) → serialized AuthEvent

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::audit::AuthEvent;
use super::users::UserRecord;

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: username → serialized UserRecord (JSON bytes).
const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Audit trail: composite key → serialized AuthEvent (JSON bytes).
/// Key format: `!timestamp_be|event_id` so forward scans run newest-first.
const AUTH_EVENTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("auth_events");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    /// Non-redb backend failure. Used by alternative store implementations
    /// and failure-injecting test doubles.
    #[error("{0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Build a composite key for the auth_events table.
///
/// Format: `inverted_timestamp_be_bytes | event_id`
///
/// The inverted timestamp ensures newest-first ordering when scanning
/// forward; the event id disambiguates events in the same millisecond.
fn make_event_key(timestamp_millis: i64, event_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + 1 + event_id.len());
    key.extend_from_slice(&(!timestamp_millis as u64).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(event_id.as_bytes());
    key
}

// =============================================================================
// AuthDatabase
// =============================================================================

/// Embedded ACID identity database.
///
/// redb serializes writers, so `get_or_create_user` is atomic from the
/// caller's view: two concurrent requests for a brand-new username cannot
/// create duplicate records.
pub struct AuthDatabase {
    db: Database,
}

impl AuthDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(AUTH_EVENTS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    // =========================================================================
    // User CRUD
    // =========================================================================

    /// Fetch the record for `username`, creating an empty one if absent.
    ///
    /// Returns the record and whether it was created by this call. Runs in
    /// a single write transaction.
    pub fn get_or_create_user(&self, username: &str) -> StoreResult<(UserRecord, bool)> {
        let write_txn = self.db.begin_write()?;
        let result = {
            let mut table = write_txn.open_table(USERS)?;

            // Read existing bytes before mutating (access guard borrows the table)
            let existing_bytes = match table.get(username)? {
                Some(guard) => Some(guard.value().to_vec()),
                None => None,
            };

            match existing_bytes {
                Some(bytes) => {
                    let record: UserRecord = serde_json::from_slice(&bytes)?;
                    (record, false)
                }
                None => {
                    let record = UserRecord::new(username);
                    let json = serde_json::to_vec(&record)?;
                    table.insert(username, json.as_slice())?;
                    (record, true)
                }
            }
        };
        write_txn.commit()?;
        Ok(result)
    }

    /// Look up a single user by username.
    pub fn get_user(&self, username: &str) -> StoreResult<Option<UserRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        match table.get(username)? {
            Some(value) => {
                let record: UserRecord = serde_json::from_slice(value.value())?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Persist a user record, overwriting any stored version.
    pub fn save_user(&self, record: &UserRecord) -> StoreResult<()> {
        let json = serde_json::to_vec(record)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(USERS)?;
            table.insert(record.username(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// List all usernames in ascending order.
    pub fn list_usernames(&self) -> StoreResult<Vec<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        let mut usernames = Vec::new();
        for entry in table.iter()? {
            let entry = entry?;
            usernames.push(entry.0.value().to_string());
        }
        Ok(usernames)
    }

    /// Count stored user records.
    pub fn count_users(&self) -> StoreResult<usize> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        let mut count = 0;
        for entry in table.iter()? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    // =========================================================================
    // Auth event trail
    // =========================================================================

    /// Append an auth event to the trail.
    pub fn append_event(&self, event: &AuthEvent) -> StoreResult<()> {
        let json = serde_json::to_vec(event)?;
        let key = make_event_key(event.timestamp.timestamp_millis(), &event.event_id);
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(AUTH_EVENTS)?;
            table.insert(key.as_slice(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Read the most recent auth events, newest first.
    pub fn recent_events(&self, limit: usize) -> StoreResult<Vec<AuthEvent>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(AUTH_EVENTS)?;
        let mut events = Vec::with_capacity(limit);
        for entry in table.iter()? {
            let entry = entry?;
            let event: AuthEvent = serde_json::from_slice(entry.1.value())?;
            events.push(event);
            if events.len() >= limit {
                break;
            }
        }
        Ok(events)
    }

    /// Cheap readiness probe: open a read transaction against the users table.
    pub fn health_check(&self) -> StoreResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(USERS)?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
