//! Session-token issuance
//!
//! Thin delegation to the identity directory's signer. No retries live
//! here; the endpoint layer decides what to do with a failed mint.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::claims::SanitizedClaims;
use crate::directory::IdentityDirectory;
use crate::error::{FederationError, FederationResult};
use crate::identity::ResolvedIdentity;

/// A signed session token handed back to the caller
///
/// The token string is an opaque capability - nothing here parses it.
#[derive(Debug, Clone, Serialize)]
pub struct MintedToken {
    /// The signed session token
    pub token: String,
    /// Internal user id the token was minted for
    pub uid: String,
    /// Email echoed from the verified identity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Requests signed session tokens from the identity directory
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    directory: Arc<dyn IdentityDirectory>,
}

impl TokenIssuer {
    /// Create an issuer over the given directory
    #[must_use]
    pub fn new(directory: Arc<dyn IdentityDirectory>) -> Self {
        Self { directory }
    }

    /// Mint a session token for a resolved identity
    ///
    /// # Errors
    ///
    /// Returns [`FederationError::TokenMintingFailed`] when the directory
    /// fails or refuses to sign.
    pub async fn issue(
        &self,
        identity: &ResolvedIdentity,
        claims: &SanitizedClaims,
    ) -> FederationResult<MintedToken> {
        let token = self
            .directory
            .create_signed_token(&identity.uid, claims)
            .await
            .map_err(|e| FederationError::TokenMintingFailed(e.to_string()))?;

        debug!(uid = %identity.uid, claim_count = claims.len(), "session token minted");

        Ok(MintedToken {
            token,
            uid: identity.uid.clone(),
            email: identity.email.clone(),
        })
    }
}
