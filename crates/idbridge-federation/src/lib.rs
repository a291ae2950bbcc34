//! # idbridge-federation - OIDC-to-session-token bridge core
//!
//! Accepts an identity token issued by a third-party OpenID-Connect
//! provider, verifies it against the provider's rotating public key set,
//! derives a stable internal identity, and mints a first-party session
//! token carrying a sanitized claim set.
//!
//! ## Architecture
//!
//! - [`jwks`] - remote key-set fetching and caching (single-flight refresh,
//!   graceful degradation when the endpoint is down)
//! - [`verifier`] - signature and claim validation producing
//!   [`VerifiedToken`]
//! - [`identity`] - deterministic `federated:{sub}` uid derivation and
//!   lazy, idempotent directory provisioning
//! - [`claims`] - subtractive sanitization against the reserved-name set
//! - [`issuer`] - session-token minting through the directory
//! - [`directory`] - the identity-directory seam (trait, in-memory and
//!   HTTP backends)
//! - [`config`] - environment-sourced configuration, fail-closed audience
//!   handling
//! - [`error`] - the failure taxonomy and its boundary classification
//!
//! ## Pipeline
//!
//! ```text
//! Received -> Parsed -> SignatureChecked -> ClaimsChecked
//!          -> IdentityResolved -> ClaimsSanitized -> Issued
//! ```
//!
//! Linear, no branching states: any failure is terminal for that request
//! and surfaces as a single [`FederationError`]. There are no partial
//! results and no internal retries.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use idbridge_federation::{
//!     FederationBridge, FederationConfig, directory::memory::MemoryDirectory,
//! };
//!
//! # tokio_test::block_on(async {
//! let config = FederationConfig::new(
//!     "https://idp.example.com",
//!     "client-7731",
//!     "https://idp.example.com/.well-known/jwks.json",
//! );
//! let directory = Arc::new(MemoryDirectory::new(b"dev-secret"));
//! let bridge = FederationBridge::new(config, directory);
//!
//! let minted = bridge.verify_and_mint("eyJhbGciOi...").await?;
//! println!("minted session token for {}", minted.uid);
//! # Ok::<(), idbridge_federation::FederationError>(())
//! # });
//! ```

pub mod claims;
pub mod config;
pub mod directory;
pub mod error;
pub mod identity;
pub mod issuer;
pub mod jwks;
pub mod verifier;

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::info;

#[doc(inline)]
pub use claims::{RESERVED_CLAIMS, SanitizedClaims, sanitize};
#[doc(inline)]
pub use config::{AUDIENCE_PLACEHOLDER, FederationConfig};
#[doc(inline)]
pub use error::{FailureClass, FederationError, FederationResult};
#[doc(inline)]
pub use identity::{IdentityResolver, PROVIDER_LABEL, ResolvedIdentity, federated_uid};
#[doc(inline)]
pub use issuer::{MintedToken, TokenIssuer};
#[doc(inline)]
pub use jwks::KeySetCache;
#[doc(inline)]
pub use verifier::{TokenHeader, TokenVerifier, VerifiedClaims, VerifiedToken};

use directory::IdentityDirectory;

/// The verification and minting pipeline as one facade
///
/// Owns a [`TokenVerifier`] (with its shared [`KeySetCache`]), an
/// [`IdentityResolver`], and a [`TokenIssuer`], and runs them in order.
/// Cheap to clone; clones share the key-set cache.
#[derive(Debug, Clone)]
pub struct FederationBridge {
    config: FederationConfig,
    verifier: TokenVerifier,
    resolver: IdentityResolver,
    issuer: TokenIssuer,
}

impl FederationBridge {
    /// Assemble the pipeline from configuration and a directory backend
    #[must_use]
    pub fn new(config: FederationConfig, directory: Arc<dyn IdentityDirectory>) -> Self {
        let key_set = Arc::new(KeySetCache::from_config(&config));
        let verifier = TokenVerifier::new(&config, key_set);
        let resolver = IdentityResolver::new(directory.clone());
        let issuer = TokenIssuer::new(directory);
        Self {
            config,
            verifier,
            resolver,
            issuer,
        }
    }

    /// Assemble the pipeline with an externally built key-set cache
    ///
    /// Lets several bridges (or tests) share one cache.
    #[must_use]
    pub fn with_key_set(
        config: FederationConfig,
        directory: Arc<dyn IdentityDirectory>,
        key_set: Arc<KeySetCache>,
    ) -> Self {
        let verifier = TokenVerifier::new(&config, key_set);
        let resolver = IdentityResolver::new(directory.clone());
        let issuer = TokenIssuer::new(directory);
        Self {
            config,
            verifier,
            resolver,
            issuer,
        }
    }

    /// Verify a token without minting anything
    ///
    /// # Errors
    ///
    /// Propagates every verification failure from
    /// [`TokenVerifier::verify`].
    pub async fn verify(&self, token: &str) -> FederationResult<VerifiedToken> {
        self.verifier.verify(token).await
    }

    /// Run the full pipeline: verify, resolve, sanitize, mint
    ///
    /// Fails closed with [`FederationError::ConfigurationInvalid`] before
    /// any verification work when the audience is still the placeholder.
    ///
    /// # Errors
    ///
    /// Returns the first failure encountered along the pipeline; there is
    /// no partial success.
    pub async fn verify_and_mint(&self, token: &str) -> FederationResult<MintedToken> {
        self.config.ensure_mint_configured()?;

        let verified = self.verifier.verify(token).await?;
        let identity = self
            .resolver
            .resolve(&verified.claims.sub, verified.claims.email.clone())
            .await?;

        let claims = sanitize(&base_claims(&verified));
        let minted = self.issuer.issue(&identity, &claims).await?;

        info!(uid = %minted.uid, "verify-and-mint pipeline completed");
        Ok(minted)
    }

    /// The configuration this bridge runs with
    #[must_use]
    pub fn config(&self) -> &FederationConfig {
        &self.config
    }
}

/// Build the claim set attached to a minted token
///
/// Carries the provider label, the email, and the provider's email-verified
/// attestation (strict `== true`). Authorization flags (roles, org ids)
/// would be added here.
fn base_claims(verified: &VerifiedToken) -> Map<String, Value> {
    let mut claims = Map::new();
    claims.insert(
        "provider".to_string(),
        Value::String(PROVIDER_LABEL.to_string()),
    );
    if let Some(email) = &verified.claims.email {
        claims.insert("email".to_string(), Value::String(email.clone()));
    }
    claims.insert(
        "email_verified".to_string(),
        Value::Bool(verified.claims.email_verified),
    );
    claims
}

#[cfg(test)]
mod tests {
    use super::*;
    use directory::memory::MemoryDirectory;

    fn bridge_with_audience(audience: &str) -> FederationBridge {
        let config = FederationConfig::new(
            "https://idp.example.com",
            audience,
            "https://idp.example.com/jwks",
        );
        FederationBridge::new(config, Arc::new(MemoryDirectory::new(b"secret")))
    }

    #[tokio::test]
    async fn placeholder_audience_fails_before_verification() {
        let bridge = bridge_with_audience(AUDIENCE_PLACEHOLDER);
        // Even a syntactically hopeless token must not be inspected first.
        let err = bridge.verify_and_mint("garbage").await.unwrap_err();
        assert!(matches!(err, FederationError::ConfigurationInvalid(_)));
    }

    #[tokio::test]
    async fn verify_only_path_does_not_require_minting_config() {
        let bridge = bridge_with_audience(AUDIENCE_PLACEHOLDER);
        // The verify-only path still runs; this token just fails to parse.
        let err = bridge.verify("garbage").await.unwrap_err();
        assert!(matches!(err, FederationError::MalformedToken(_)));
    }
}
