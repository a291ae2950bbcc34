//! Identity directory interface
//!
//! The directory is an external collaborator: it stores user records and
//! signs first-party session tokens. This module owns the seam - an async
//! trait plus typed errors - and two implementations:
//!
//! - [`memory::MemoryDirectory`] - in-process backend for development and
//!   tests, signing with a symmetric dev key
//! - [`http::HttpDirectory`] - JSON-over-HTTP client for a real directory
//!   service, with bounded request timeouts
//!
//! The trait deliberately exposes the create-if-absent race as data:
//! [`ProvisionOutcome`] tags whether a create call actually created the
//! record or lost a benign race to a concurrent caller, so the resolver's
//! idempotence contract is visible in types rather than buried in a caught
//! exception.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::claims::SanitizedClaims;

/// A user record held by the identity directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Internal user identifier
    pub uid: String,
    /// Email, when one is known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Outcome of an ensure-exists create call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// The record did not exist and was created
    Created(UserRecord),
    /// A concurrent caller created it first; the existing record is
    /// returned and the race is benign
    AlreadyExists(UserRecord),
}

impl ProvisionOutcome {
    /// The record, regardless of who created it
    #[must_use]
    pub fn into_record(self) -> UserRecord {
        match self {
            Self::Created(record) | Self::AlreadyExists(record) => record,
        }
    }
}

/// Failures raised by a directory backend
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The directory could not be reached (network failure or timeout)
    #[error("directory unreachable: {0}")]
    Unreachable(String),

    /// The directory answered but rejected the request
    #[error("directory rejected the request: {0}")]
    Rejected(String),

    /// Token signing failed
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// The identity directory seam
///
/// Implementations must be safe for concurrent use; the bridge calls them
/// from many requests at once.
#[async_trait]
pub trait IdentityDirectory: Send + Sync + std::fmt::Debug {
    /// Look a user up by internal id
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] when the backend fails; an absent user is
    /// `Ok(None)`, not an error.
    async fn get_user(&self, uid: &str) -> Result<Option<UserRecord>, DirectoryError>;

    /// Create a user record if one does not exist
    ///
    /// Losing a creation race to a concurrent caller is reported as
    /// [`ProvisionOutcome::AlreadyExists`], never as an error.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] for any failure other than the benign
    /// already-exists race.
    async fn create_user(
        &self,
        uid: &str,
        email: Option<&str>,
    ) -> Result<ProvisionOutcome, DirectoryError>;

    /// Sign a session token for a user with the given custom claims
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] when the backend fails or refuses to
    /// sign.
    async fn create_signed_token(
        &self,
        uid: &str,
        claims: &SanitizedClaims,
    ) -> Result<String, DirectoryError>;
}
