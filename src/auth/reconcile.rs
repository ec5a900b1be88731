// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity reconciliation: map verified token claims onto a stored
//! [`UserRecord`], creating the record on first sight.
//!
//! Reconciliation is driven by a configured [`ClaimMapping`] of
//! `claim name -> attribute name` pairs, applied in declaration order.
//! Attributes named in the mergeable set are treated as JSON objects and
//! merged key-by-key (additively, keys are never deleted); all other
//! attributes are overwritten wholesale when the claim value differs.
//!
//! The record is saved at most once per reconciliation, and only when an
//! attribute actually changed.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::claims::Claims;
use super::error::AuthError;
use crate::storage::{UserRecord, UserStore};

// =============================================================================
// ClaimMapping
// =============================================================================

/// Ordered claim-to-attribute mapping plus the set of mergeable attributes.
#[derive(Debug, Clone, Default)]
pub struct ClaimMapping {
    pairs: Vec<(String, String)>,
    mergeable: HashSet<String>,
}

impl ClaimMapping {
    pub fn new(pairs: Vec<(String, String)>, mergeable: HashSet<String>) -> Self {
        Self { pairs, mergeable }
    }

    /// Mapping entries in declaration order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(c, a)| (c.as_str(), a.as_str()))
    }

    /// Whether `attribute` is merged key-by-key instead of overwritten.
    pub fn is_mergeable(&self, attribute: &str) -> bool {
        self.mergeable.contains(attribute)
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

// =============================================================================
// IdentityReconciler
// =============================================================================

/// Result of one reconciliation pass.
#[derive(Debug, Clone)]
pub struct ResolvedUser {
    pub record: UserRecord,
    /// Whether this pass created the record.
    pub created: bool,
    /// Whether this pass changed (and saved) any attributes.
    pub updated: bool,
}

/// Resolves verified claims to a local identity record.
#[derive(Clone)]
pub struct IdentityReconciler {
    store: Arc<dyn UserStore>,
    mapping: ClaimMapping,
}

impl IdentityReconciler {
    pub fn new(store: Arc<dyn UserStore>, mapping: ClaimMapping) -> Self {
        Self { store, mapping }
    }

    /// Resolve `claims` to a stored user record.
    ///
    /// Fails with [`AuthError::MissingUsernameClaim`] before touching the
    /// store when the token carries no username. Store failures surface as
    /// [`AuthError::IdentityResolution`] naming the username; the backend
    /// cause stays in the error source chain and is never shown to clients.
    pub fn resolve(&self, claims: &Claims) -> Result<ResolvedUser, AuthError> {
        let username = claims.username().ok_or(AuthError::MissingUsernameClaim)?;

        let (mut record, created) =
            self.store
                .get_or_create(username)
                .map_err(|source| AuthError::IdentityResolution {
                    username: username.to_string(),
                    source,
                })?;
        if created {
            info!(username, "created identity record");
        }

        let updated = apply_claim_mapping(&mut record, claims, &self.mapping);
        if updated {
            self.store
                .save(&record)
                .map_err(|source| AuthError::IdentityResolution {
                    username: username.to_string(),
                    source,
                })?;
            debug!(username, "synced identity attributes from claims");
        }

        Ok(ResolvedUser {
            record,
            created,
            updated,
        })
    }
}

// =============================================================================
// Mapping application
// =============================================================================

/// Apply the claim mapping to `record` in declaration order.
///
/// Returns whether any attribute changed. Absent and null claim values
/// never clear an existing attribute.
fn apply_claim_mapping(record: &mut UserRecord, claims: &Claims, mapping: &ClaimMapping) -> bool {
    let mut changed = false;
    for (claim, attribute) in mapping.pairs() {
        let payload = claims.get(claim);
        if mapping.is_mergeable(attribute) {
            changed |= merge_attribute(record, attribute, payload);
        } else if let Some(value) = payload {
            if !value.is_null() {
                changed |= record.set_attribute(attribute, value.clone());
            }
        }
    }
    changed
}

/// Merge an object-valued claim into a mergeable attribute.
///
/// Empty or absent payloads are skipped outright. When the current value
/// is a non-empty object, incoming keys are inserted or overwritten and
/// existing keys never deleted; otherwise the payload replaces the value
/// wholesale.
fn merge_attribute(record: &mut UserRecord, attribute: &str, payload: Option<&Value>) -> bool {
    let incoming = match payload {
        Some(Value::Object(map)) if !map.is_empty() => map,
        Some(Value::Object(_)) | Some(Value::Null) | None => return false,
        Some(other) => {
            warn!(
                attribute,
                value_type = value_type_name(other),
                "mergeable attribute received non-object claim value, skipping"
            );
            return false;
        }
    };

    let current = record.attribute(attribute).cloned();
    match current {
        Some(Value::Object(current_map)) if !current_map.is_empty() => {
            let mut merged = current_map;
            for (key, value) in incoming {
                if merged.get(key) != Some(value) {
                    debug!(attribute, key, "merging claim key into identity attribute");
                    merged.insert(key.clone(), value.clone());
                }
            }
            record.set_attribute(attribute, Value::Object(merged))
        }
        Some(existing) if !existing.is_null() && !existing.is_object() => {
            warn!(
                attribute,
                "mergeable attribute held non-object value, replacing wholesale"
            );
            record.set_attribute(attribute, Value::Object(incoming.clone()))
        }
        // Absent, null, or empty object: take the payload wholesale
        _ => record.set_attribute(attribute, Value::Object(incoming.clone())),
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{StoreError, StoreResult};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory store that counts calls and can inject failures.
    #[derive(Default)]
    struct MemoryStore {
        users: Mutex<BTreeMap<String, UserRecord>>,
        get_or_create_calls: AtomicUsize,
        save_calls: AtomicUsize,
        fail_get_or_create: bool,
        fail_save: bool,
    }

    impl MemoryStore {
        fn with_user(record: UserRecord) -> Self {
            let store = Self::default();
            store
                .users
                .lock()
                .unwrap()
                .insert(record.username().to_string(), record);
            store
        }

        fn saves(&self) -> usize {
            self.save_calls.load(Ordering::SeqCst)
        }

        fn lookups(&self) -> usize {
            self.get_or_create_calls.load(Ordering::SeqCst)
        }
    }

    impl UserStore for MemoryStore {
        fn get_or_create(&self, username: &str) -> StoreResult<(UserRecord, bool)> {
            self.get_or_create_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_get_or_create {
                return Err(StoreError::Backend("database offline".to_string()));
            }
            let mut users = self.users.lock().unwrap();
            match users.get(username) {
                Some(record) => Ok((record.clone(), false)),
                None => {
                    let record = UserRecord::new(username);
                    users.insert(username.to_string(), record.clone());
                    Ok((record, true))
                }
            }
        }

        fn get(&self, username: &str) -> StoreResult<Option<UserRecord>> {
            Ok(self.users.lock().unwrap().get(username).cloned())
        }

        fn save(&self, record: &UserRecord) -> StoreResult<()> {
            self.save_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_save {
                return Err(StoreError::Backend("disk full".to_string()));
            }
            self.users
                .lock()
                .unwrap()
                .insert(record.username().to_string(), record.clone());
            Ok(())
        }

        fn list_usernames(&self) -> StoreResult<Vec<String>> {
            Ok(self.users.lock().unwrap().keys().cloned().collect())
        }

        fn count(&self) -> StoreResult<usize> {
            Ok(self.users.lock().unwrap().len())
        }
    }

    fn mapping(pairs: &[(&str, &str)], mergeable: &[&str]) -> ClaimMapping {
        ClaimMapping::new(
            pairs
                .iter()
                .map(|(c, a)| (c.to_string(), a.to_string()))
                .collect(),
            mergeable.iter().map(|a| a.to_string()).collect(),
        )
    }

    fn claims(value: serde_json::Value) -> Claims {
        Claims::try_from(value).unwrap()
    }

    fn reconciler(store: Arc<MemoryStore>, mapping: ClaimMapping) -> IdentityReconciler {
        IdentityReconciler::new(store, mapping)
    }

    #[test]
    fn missing_username_fails_before_store_access() {
        let store = Arc::new(MemoryStore::default());
        let r = reconciler(store.clone(), mapping(&[("email", "email")], &[]));

        let err = r
            .resolve(&claims(json!({"email": "jdoe@example.com"})))
            .unwrap_err();

        assert!(matches!(err, AuthError::MissingUsernameClaim));
        assert_eq!(store.lookups(), 0, "Store must not be touched");
        assert_eq!(store.saves(), 0);
    }

    #[test]
    fn creates_record_and_syncs_attributes() {
        let store = Arc::new(MemoryStore::default());
        let r = reconciler(store.clone(), mapping(&[("email", "email")], &[]));

        let resolved = r
            .resolve(&claims(json!({
                "preferred_username": "jdoe",
                "email": "jdoe@example.com"
            })))
            .unwrap();

        assert!(resolved.created);
        assert!(resolved.updated);
        assert_eq!(resolved.record.username(), "jdoe");
        assert_eq!(
            resolved.record.attribute("email"),
            Some(&json!("jdoe@example.com"))
        );
        assert_eq!(store.saves(), 1);
    }

    #[test]
    fn scalar_change_saves_exactly_once() {
        let mut existing = UserRecord::new("jdoe");
        existing.set_attribute("email", json!("old@example.com"));
        let store = Arc::new(MemoryStore::with_user(existing));
        let r = reconciler(store.clone(), mapping(&[("email", "email")], &[]));

        let resolved = r
            .resolve(&claims(json!({
                "preferred_username": "jdoe",
                "email": "new@example.com"
            })))
            .unwrap();

        assert!(!resolved.created);
        assert!(resolved.updated);
        assert_eq!(
            resolved.record.attribute("email"),
            Some(&json!("new@example.com"))
        );
        assert_eq!(store.saves(), 1);
    }

    #[test]
    fn identical_scalar_does_not_save() {
        let mut existing = UserRecord::new("jdoe");
        existing.set_attribute("email", json!("jdoe@example.com"));
        let store = Arc::new(MemoryStore::with_user(existing));
        let r = reconciler(store.clone(), mapping(&[("email", "email")], &[]));

        let resolved = r
            .resolve(&claims(json!({
                "preferred_username": "jdoe",
                "email": "jdoe@example.com"
            })))
            .unwrap();

        assert!(!resolved.updated);
        assert_eq!(store.saves(), 0);
    }

    #[test]
    fn null_scalar_never_clears_attribute() {
        let mut existing = UserRecord::new("jdoe");
        existing.set_attribute("email", json!("jdoe@example.com"));
        let store = Arc::new(MemoryStore::with_user(existing));
        let r = reconciler(store.clone(), mapping(&[("email", "email")], &[]));

        let resolved = r
            .resolve(&claims(json!({
                "preferred_username": "jdoe",
                "email": null
            })))
            .unwrap();

        assert!(!resolved.updated);
        assert_eq!(
            resolved.record.attribute("email"),
            Some(&json!("jdoe@example.com"))
        );
        assert_eq!(store.saves(), 0);
    }

    #[test]
    fn absent_claim_leaves_attribute_untouched() {
        let mut existing = UserRecord::new("jdoe");
        existing.set_attribute("email", json!("jdoe@example.com"));
        let store = Arc::new(MemoryStore::with_user(existing));
        let r = reconciler(store.clone(), mapping(&[("email", "email")], &[]));

        let resolved = r
            .resolve(&claims(json!({"preferred_username": "jdoe"})))
            .unwrap();

        assert!(!resolved.updated);
        assert_eq!(
            resolved.record.attribute("email"),
            Some(&json!("jdoe@example.com"))
        );
    }

    #[test]
    fn mergeable_merges_key_by_key() {
        let mut existing = UserRecord::new("jdoe");
        existing.set_attribute("profile", json!({"a": 1}));
        let store = Arc::new(MemoryStore::with_user(existing));
        let r = reconciler(
            store.clone(),
            mapping(&[("profile", "profile")], &["profile"]),
        );

        let resolved = r
            .resolve(&claims(json!({
                "preferred_username": "jdoe",
                "profile": {"a": 2, "b": 3}
            })))
            .unwrap();

        assert!(resolved.updated);
        assert_eq!(
            resolved.record.attribute("profile"),
            Some(&json!({"a": 2, "b": 3}))
        );
        assert_eq!(store.saves(), 1);
    }

    #[test]
    fn mergeable_preserves_unrelated_keys() {
        let mut existing = UserRecord::new("jdoe");
        existing.set_attribute("profile", json!({"a": 1, "z": 9}));
        let store = Arc::new(MemoryStore::with_user(existing));
        let r = reconciler(
            store.clone(),
            mapping(&[("profile", "profile")], &["profile"]),
        );

        let resolved = r
            .resolve(&claims(json!({
                "preferred_username": "jdoe",
                "profile": {"a": 1, "b": 2}
            })))
            .unwrap();

        assert!(resolved.updated);
        assert_eq!(
            resolved.record.attribute("profile"),
            Some(&json!({"a": 1, "b": 2, "z": 9}))
        );
    }

    #[test]
    fn empty_mergeable_payload_is_skipped() {
        let mut existing = UserRecord::new("jdoe");
        existing.set_attribute("profile", json!({"a": 1}));
        let store = Arc::new(MemoryStore::with_user(existing));
        let r = reconciler(
            store.clone(),
            mapping(&[("profile", "profile")], &["profile"]),
        );

        let resolved = r
            .resolve(&claims(json!({
                "preferred_username": "jdoe",
                "profile": {}
            })))
            .unwrap();

        assert!(!resolved.updated);
        assert_eq!(resolved.record.attribute("profile"), Some(&json!({"a": 1})));
        assert_eq!(store.saves(), 0);
    }

    #[test]
    fn mergeable_without_current_value_takes_payload_wholesale() {
        let store = Arc::new(MemoryStore::default());
        let r = reconciler(
            store.clone(),
            mapping(&[("profile", "profile")], &["profile"]),
        );

        let resolved = r
            .resolve(&claims(json!({
                "preferred_username": "jdoe",
                "profile": {"theme": "dark"}
            })))
            .unwrap();

        assert!(resolved.updated);
        assert_eq!(
            resolved.record.attribute("profile"),
            Some(&json!({"theme": "dark"}))
        );
    }

    #[test]
    fn mergeable_non_object_payload_is_skipped() {
        let mut existing = UserRecord::new("jdoe");
        existing.set_attribute("profile", json!({"a": 1}));
        let store = Arc::new(MemoryStore::with_user(existing));
        let r = reconciler(
            store.clone(),
            mapping(&[("profile", "profile")], &["profile"]),
        );

        let resolved = r
            .resolve(&claims(json!({
                "preferred_username": "jdoe",
                "profile": "not-an-object"
            })))
            .unwrap();

        assert!(!resolved.updated);
        assert_eq!(resolved.record.attribute("profile"), Some(&json!({"a": 1})));
    }

    #[test]
    fn mergeable_replaces_non_object_current_value() {
        let mut existing = UserRecord::new("jdoe");
        existing.set_attribute("profile", json!("legacy-string"));
        let store = Arc::new(MemoryStore::with_user(existing));
        let r = reconciler(
            store.clone(),
            mapping(&[("profile", "profile")], &["profile"]),
        );

        let resolved = r
            .resolve(&claims(json!({
                "preferred_username": "jdoe",
                "profile": {"theme": "dark"}
            })))
            .unwrap();

        assert!(resolved.updated);
        assert_eq!(
            resolved.record.attribute("profile"),
            Some(&json!({"theme": "dark"}))
        );
    }

    #[test]
    fn identical_mergeable_payload_does_not_save() {
        let mut existing = UserRecord::new("jdoe");
        existing.set_attribute("profile", json!({"a": 1, "b": 2}));
        let store = Arc::new(MemoryStore::with_user(existing));
        let r = reconciler(
            store.clone(),
            mapping(&[("profile", "profile")], &["profile"]),
        );

        let resolved = r
            .resolve(&claims(json!({
                "preferred_username": "jdoe",
                "profile": {"a": 1, "b": 2}
            })))
            .unwrap();

        assert!(!resolved.updated);
        assert_eq!(store.saves(), 0);
    }

    #[test]
    fn multiple_changes_still_save_once() {
        let store = Arc::new(MemoryStore::default());
        let r = reconciler(
            store.clone(),
            mapping(
                &[
                    ("administrator", "is_staff"),
                    ("email", "email"),
                    ("name", "full_name"),
                ],
                &[],
            ),
        );

        let resolved = r
            .resolve(&claims(json!({
                "preferred_username": "jdoe",
                "administrator": true,
                "email": "jdoe@example.com",
                "name": "Jane Doe"
            })))
            .unwrap();

        assert!(resolved.updated);
        assert!(resolved.record.is_staff());
        assert_eq!(
            resolved.record.attribute("full_name"),
            Some(&json!("Jane Doe"))
        );
        assert_eq!(store.saves(), 1, "All changes must batch into one save");
    }

    #[test]
    fn mapping_order_determines_final_value() {
        let store = Arc::new(MemoryStore::default());
        // Two claims feed the same attribute; the later entry wins
        let r = reconciler(
            store.clone(),
            mapping(&[("nickname", "display"), ("name", "display")], &[]),
        );

        let resolved = r
            .resolve(&claims(json!({
                "preferred_username": "jdoe",
                "nickname": "jd",
                "name": "Jane Doe"
            })))
            .unwrap();

        assert_eq!(resolved.record.attribute("display"), Some(&json!("Jane Doe")));
    }

    #[test]
    fn lookup_failure_wraps_into_identity_resolution() {
        let store = Arc::new(MemoryStore {
            fail_get_or_create: true,
            ..Default::default()
        });
        let r = reconciler(store, mapping(&[("email", "email")], &[]));

        let err = r
            .resolve(&claims(json!({"preferred_username": "jdoe"})))
            .unwrap_err();

        match err {
            AuthError::IdentityResolution { ref username, .. } => {
                assert_eq!(username, "jdoe");
            }
            other => panic!("Expected IdentityResolution, got {other:?}"),
        }
        assert!(err.to_string().contains("jdoe"));
    }

    #[test]
    fn save_failure_wraps_into_identity_resolution() {
        let store = Arc::new(MemoryStore {
            fail_save: true,
            ..Default::default()
        });
        let r = reconciler(store, mapping(&[("email", "email")], &[]));

        let err = r
            .resolve(&claims(json!({
                "preferred_username": "jdoe",
                "email": "jdoe@example.com"
            })))
            .unwrap_err();

        assert!(matches!(err, AuthError::IdentityResolution { .. }));
        use std::error::Error;
        assert!(err.source().is_some(), "Backend cause must be preserved");
    }

    #[test]
    fn empty_mapping_resolves_without_saving() {
        let store = Arc::new(MemoryStore::default());
        let r = reconciler(store.clone(), ClaimMapping::default());

        let resolved = r
            .resolve(&claims(json!({
                "preferred_username": "jdoe",
                "email": "ignored@example.com"
            })))
            .unwrap();

        assert!(resolved.created);
        assert!(!resolved.updated);
        assert!(resolved.record.attributes().is_empty());
        assert_eq!(store.saves(), 0);
    }
}
