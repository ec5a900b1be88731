// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity records and the store abstraction over them.
//!
//! A [`UserRecord`] is the locally persisted projection of an identity:
//! the provider-issued username plus a bag of attributes synced from
//! token claims. Attribute names are local (e.g. `is_staff`), decoupled
//! from the claim names they are sourced from.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::database::{AuthDatabase, StoreResult};

/// Attribute gating access to the admin API surface.
pub const STAFF_ATTRIBUTE: &str = "is_staff";

// =============================================================================
// UserRecord
// =============================================================================

/// Locally persisted identity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserRecord {
    /// Provider-issued username (primary key, never rewritten).
    username: String,
    /// When this record was first created locally.
    created_at: DateTime<Utc>,
    /// Last time an attribute write went through.
    updated_at: DateTime<Utc>,
    /// Attributes synced from token claims, keyed by local attribute name.
    #[schema(value_type = Object)]
    attributes: BTreeMap<String, Value>,
}

impl UserRecord {
    /// Create an empty record for `username`.
    pub fn new(username: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            username: username.into(),
            created_at: now,
            updated_at: now,
            attributes: BTreeMap::new(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Look up a single attribute by local name.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// All attributes, sorted by name.
    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    /// Set an attribute, returning whether the stored value changed.
    ///
    /// Writing a value identical to the current one is a no-op and does
    /// not bump `updated_at`.
    pub fn set_attribute(&mut self, name: &str, value: Value) -> bool {
        if self.attributes.get(name) == Some(&value) {
            return false;
        }
        self.attributes.insert(name.to_string(), value);
        self.updated_at = Utc::now();
        true
    }

    /// Whether this user may access staff-only endpoints.
    pub fn is_staff(&self) -> bool {
        matches!(self.attribute(STAFF_ATTRIBUTE), Some(Value::Bool(true)))
    }
}

// =============================================================================
// UserStore
// =============================================================================

/// Persistence seam for identity records.
///
/// Object-safe so request handling can run against `Arc<dyn UserStore>`
/// and tests can substitute counting or failure-injecting doubles.
pub trait UserStore: Send + Sync {
    /// Fetch the record for `username`, creating an empty one if absent.
    /// The boolean reports whether this call created the record.
    fn get_or_create(&self, username: &str) -> StoreResult<(UserRecord, bool)>;

    /// Look up a record without creating it.
    fn get(&self, username: &str) -> StoreResult<Option<UserRecord>>;

    /// Persist a record, overwriting the stored version.
    fn save(&self, record: &UserRecord) -> StoreResult<()>;

    /// All usernames in ascending order.
    fn list_usernames(&self) -> StoreResult<Vec<String>>;

    /// Number of stored records.
    fn count(&self) -> StoreResult<usize>;
}

impl UserStore for AuthDatabase {
    fn get_or_create(&self, username: &str) -> StoreResult<(UserRecord, bool)> {
        self.get_or_create_user(username)
    }

    fn get(&self, username: &str) -> StoreResult<Option<UserRecord>> {
        self.get_user(username)
    }

    fn save(&self, record: &UserRecord) -> StoreResult<()> {
        self.save_user(record)
    }

    fn list_usernames(&self) -> StoreResult<Vec<String>> {
        self.list_usernames()
    }

    fn count(&self) -> StoreResult<usize> {
        self.count_users()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_record_has_no_attributes() {
        let record = UserRecord::new("jdoe");
        assert_eq!(record.username(), "jdoe");
        assert!(record.attributes().is_empty());
        assert!(!record.is_staff());
    }

    #[test]
    fn set_attribute_reports_change() {
        let mut record = UserRecord::new("jdoe");
        assert!(record.set_attribute("email", json!("jdoe@example.com")));
        assert_eq!(record.attribute("email"), Some(&json!("jdoe@example.com")));
    }

    #[test]
    fn set_identical_attribute_is_noop() {
        let mut record = UserRecord::new("jdoe");
        record.set_attribute("email", json!("jdoe@example.com"));
        let updated_at = record.updated_at();

        assert!(!record.set_attribute("email", json!("jdoe@example.com")));
        assert_eq!(record.updated_at(), updated_at);
    }

    #[test]
    fn set_different_attribute_bumps_updated_at() {
        let mut record = UserRecord::new("jdoe");
        record.set_attribute("email", json!("old@example.com"));
        let before = record.updated_at();

        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(record.set_attribute("email", json!("new@example.com")));
        assert!(record.updated_at() > before);
    }

    #[test]
    fn is_staff_requires_boolean_true() {
        let mut record = UserRecord::new("jdoe");
        assert!(!record.is_staff());

        record.set_attribute(STAFF_ATTRIBUTE, json!("true"));
        assert!(!record.is_staff(), "String 'true' is not staff");

        record.set_attribute(STAFF_ATTRIBUTE, json!(true));
        assert!(record.is_staff());

        record.set_attribute(STAFF_ATTRIBUTE, json!(false));
        assert!(!record.is_staff());
    }

    #[test]
    fn record_roundtrips_through_json() {
        let mut record = UserRecord::new("jdoe");
        record.set_attribute("full_name", json!("Jane Doe"));
        record.set_attribute("profile", json!({"theme": "dark", "locale": "en"}));

        let json = serde_json::to_string(&record).unwrap();
        let loaded: UserRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, record);
    }
}
