//! Error taxonomy for the federation core
//!
//! Every failure the verification/minting pipeline can produce is a variant
//! here. Errors are terminal for the request that raised them: there are no
//! partial results and no internal retries. The boundary layer maps each
//! variant to a caller-visible outcome through [`FailureClass`], which keeps
//! "misconfigured service" distinguishable from "bad or expired token".

use thiserror::Error;

/// Result alias for federation operations
pub type FederationResult<T> = Result<T, FederationError>;

/// Failures raised by the verification and minting pipeline
#[derive(Debug, Error)]
pub enum FederationError {
    /// The token could not be parsed into header/payload/signature, or its
    /// header is unusable (unknown algorithm, missing key id)
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// Signature verification against the resolved key failed
    #[error("token signature invalid: {0}")]
    SignatureInvalid(String),

    /// The `iss` claim does not match the configured issuer
    #[error("issuer mismatch: expected {expected}, token carries {found}")]
    IssuerMismatch {
        /// The configured issuer
        expected: String,
        /// The issuer the token carried (empty if absent)
        found: String,
    },

    /// The `aud` claim does not match the configured audience
    #[error("audience mismatch: expected {expected}, token carries {found}")]
    AudienceMismatch {
        /// The configured audience
        expected: String,
        /// The audience the token carried (empty if absent)
        found: String,
    },

    /// The token's expiry has passed (`exp == now` counts as expired)
    #[error("token has expired")]
    Expired,

    /// The token's validity window has not started yet
    #[error("token not yet valid")]
    NotYetValid,

    /// The `sub` claim is absent or empty after otherwise-successful
    /// verification
    #[error("token missing subject claim")]
    MissingSubject,

    /// The remote key set could not be fetched and no usable cached key
    /// exists
    #[error("key set unavailable: {0}")]
    KeySetUnavailable(String),

    /// The requested key id is absent from the key set after one refresh
    /// attempt
    #[error("verification key '{0}' not found in key set")]
    KeyNotFound(String),

    /// The identity directory rejected or failed the ensure-exists call
    #[error("identity provisioning failed: {0}")]
    IdentityProvisioningFailed(String),

    /// The identity directory failed to sign a session token
    #[error("token minting failed: {0}")]
    TokenMintingFailed(String),

    /// Required configuration is missing or still set to a placeholder
    #[error("configuration invalid: {0}")]
    ConfigurationInvalid(String),
}

/// Caller-visible classification of a [`FederationError`]
///
/// The endpoint layer maps these to transport status codes. Verification
/// failures are deliberately collapsed into one class so callers cannot
/// probe which individual check rejected a forged token, while operators
/// still see the precise variant in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The caller supplied unusable input
    InvalidArgument,
    /// The service is missing required configuration
    FailedPrecondition,
    /// The presented token failed verification
    Unauthenticated,
    /// An external collaborator (key-set source, identity directory) failed
    Unavailable,
}

impl FederationError {
    /// Classify this error for boundary mapping
    #[must_use]
    pub fn class(&self) -> FailureClass {
        match self {
            Self::MalformedToken(_)
            | Self::SignatureInvalid(_)
            | Self::IssuerMismatch { .. }
            | Self::AudienceMismatch { .. }
            | Self::Expired
            | Self::NotYetValid
            | Self::MissingSubject
            | Self::KeyNotFound(_) => FailureClass::Unauthenticated,
            Self::ConfigurationInvalid(_) => FailureClass::FailedPrecondition,
            Self::KeySetUnavailable(_)
            | Self::IdentityProvisioningFailed(_)
            | Self::TokenMintingFailed(_) => FailureClass::Unavailable,
        }
    }
}
