// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Decoded JWT claims.
//!
//! Claims are kept as an open JSON object rather than a fixed struct: which
//! claims matter is decided by the configured claim→attribute mapping, not
//! by this type. Only the username claims have hardcoded meaning.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Primary username claim. Checked first.
pub const PREFERRED_USERNAME_CLAIM: &str = "preferred_username";

/// Fallback username claim.
pub const USERNAME_CLAIM: &str = "username";

/// A verified token's claim set.
///
/// Ephemeral: produced per request by the decoder and dropped once identity
/// reconciliation is done. Never persisted or cached; callers that need the
/// claims later re-decode the raw token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct Claims(serde_json::Map<String, Value>);

impl Claims {
    /// Look up a claim by name.
    pub fn get(&self, claim: &str) -> Option<&Value> {
        self.0.get(claim)
    }

    /// Select the username for this claim set.
    ///
    /// `preferred_username` wins; `username` is the fallback. A claim that
    /// is missing, not a string, or an empty string does not count, so an
    /// empty `preferred_username` falls through to `username`.
    pub fn username(&self) -> Option<&str> {
        self.string_claim(PREFERRED_USERNAME_CLAIM)
            .or_else(|| self.string_claim(USERNAME_CLAIM))
    }

    fn string_claim(&self, claim: &str) -> Option<&str> {
        match self.0.get(claim) {
            Some(Value::String(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }
}

impl From<serde_json::Map<String, Value>> for Claims {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Claims {
    type Error = Value;

    /// Wrap a JSON value, rejecting anything that is not an object.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}
