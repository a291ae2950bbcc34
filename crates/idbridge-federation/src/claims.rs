//! Claim sanitization
//!
//! Custom claims attached to a minted token must never collide with the
//! identity directory's protocol-reserved fields, no matter what the caller
//! supplies. Sanitization is purely subtractive: reserved keys are dropped,
//! everything else passes through untouched, and nothing is ever added or
//! coerced.
//!
//! The reserved list is a versioned contract with the directory - changing
//! it changes the shape of every token minted afterwards - so it lives here
//! as a single constant rather than being assembled at runtime.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Top-level claim names reserved by the session-token protocol
///
/// `claims` is the nested custom-claims container, `tenant_id` the tenant
/// field, and `platform` the directory's own reserved container.
pub const RESERVED_CLAIMS: [&str; 11] = [
    "iss",
    "aud",
    "sub",
    "iat",
    "exp",
    "nbf",
    "jti",
    "uid",
    "claims",
    "tenant_id",
    "platform",
];

/// A claim map with all reserved names removed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SanitizedClaims(Map<String, Value>);

impl SanitizedClaims {
    /// View the underlying map
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume into the underlying map
    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    /// Whether any claims survived sanitization
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of claims in the set
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Whether a claim name is reserved
#[must_use]
pub fn is_reserved(name: &str) -> bool {
    RESERVED_CLAIMS.contains(&name)
}

/// Filter a claim map against the reserved-name set
///
/// Pure and subtractive: the input is not mutated, unknown claims pass
/// through unchanged, and an empty input yields an empty output.
#[must_use]
pub fn sanitize(claims: &Map<String, Value>) -> SanitizedClaims {
    let filtered = claims
        .iter()
        .filter(|(name, _)| !is_reserved(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    SanitizedClaims(filtered)
}
