//! Identity resolution
//!
//! Maps a verified provider subject onto a stable internal user id and
//! lazily provisions the matching directory record. The transform is a
//! frozen external contract: `federated:{subject}`. The `federated:` prefix
//! namespaces provider identities away from locally created accounts (and
//! from any other prefix), and changing the delimiter after identities have
//! been minted would fragment identity history.

use std::sync::Arc;

use tracing::{debug, info};

use crate::directory::{IdentityDirectory, ProvisionOutcome};
use crate::error::{FederationError, FederationResult};

/// Namespace prefix for provider-federated identities (frozen)
pub const PROVIDER_LABEL: &str = "federated";
/// Delimiter between namespace and subject (frozen)
pub const UID_DELIMITER: char = ':';

/// Build the internal user id for a provider subject
///
/// Deterministic and stable across calls and restarts.
#[must_use]
pub fn federated_uid(subject: &str) -> String {
    format!("{PROVIDER_LABEL}{UID_DELIMITER}{subject}")
}

/// A provider identity resolved to an internal user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    /// Internal user identifier (`federated:{subject}`)
    pub uid: String,
    /// Email carried by the verified token, when present
    pub email: Option<String>,
}

/// Resolves verified subjects to internal identities
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    directory: Arc<dyn IdentityDirectory>,
}

impl IdentityResolver {
    /// Create a resolver over the given directory
    #[must_use]
    pub fn new(directory: Arc<dyn IdentityDirectory>) -> Self {
        Self { directory }
    }

    /// Resolve a subject, creating the directory record if absent
    ///
    /// Idempotent under concurrent duplicate calls: the create-if-absent
    /// race is reported by the directory as a tagged
    /// [`ProvisionOutcome::AlreadyExists`] and swallowed here; any other
    /// directory failure propagates.
    ///
    /// # Errors
    ///
    /// Returns [`FederationError::IdentityProvisioningFailed`] when the
    /// directory lookup or creation fails for any non-benign reason.
    pub async fn resolve(
        &self,
        subject: &str,
        email: Option<String>,
    ) -> FederationResult<ResolvedIdentity> {
        let uid = federated_uid(subject);

        let existing = self
            .directory
            .get_user(&uid)
            .await
            .map_err(|e| FederationError::IdentityProvisioningFailed(e.to_string()))?;

        if existing.is_none() {
            let outcome = self
                .directory
                .create_user(&uid, email.as_deref())
                .await
                .map_err(|e| FederationError::IdentityProvisioningFailed(e.to_string()))?;
            match outcome {
                ProvisionOutcome::Created(_) => {
                    info!(uid = %uid, "provisioned directory record for new identity");
                }
                ProvisionOutcome::AlreadyExists(_) => {
                    debug!(uid = %uid, "lost provisioning race, record already exists");
                }
            }
        }

        Ok(ResolvedIdentity { uid, email })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::memory::MemoryDirectory;

    #[test]
    fn uid_transform_is_deterministic() {
        assert_eq!(federated_uid("user-42"), "federated:user-42");
        assert_eq!(federated_uid("user-42"), federated_uid("user-42"));
    }

    #[tokio::test]
    async fn resolve_provisions_once() {
        let directory = Arc::new(MemoryDirectory::new(b"secret"));
        let resolver = IdentityResolver::new(directory.clone());

        let first = resolver
            .resolve("user-42", Some("u@example.com".into()))
            .await
            .unwrap();
        let second = resolver
            .resolve("user-42", Some("u@example.com".into()))
            .await
            .unwrap();

        assert_eq!(first.uid, "federated:user-42");
        assert_eq!(first, second);
        assert_eq!(directory.user_count().await, 1);
    }

    #[tokio::test]
    async fn resolve_is_idempotent_under_concurrency() {
        let directory = Arc::new(MemoryDirectory::new(b"secret"));
        let resolver = IdentityResolver::new(directory.clone());

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let resolver = resolver.clone();
                tokio::spawn(async move { resolver.resolve("user-42", None).await })
            })
            .collect();

        for task in tasks {
            let identity = task.await.unwrap().unwrap();
            assert_eq!(identity.uid, "federated:user-42");
        }
        assert_eq!(directory.user_count().await, 1);
    }
}
