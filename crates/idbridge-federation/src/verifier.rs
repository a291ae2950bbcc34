//! Token verification
//!
//! Validates a presented identity token end to end: parse, resolve the
//! signing key through the [`KeySetCache`], check the signature, then run
//! the semantic claim checks (issuer, audience, time window, subject).
//! Parsing always precedes the semantic checks; beyond that the checks are
//! order-independent and every one of them is mandatory.
//!
//! The expiry boundary is strict: a token whose `exp` equals the current
//! second is already expired. Clock-skew tolerance applies only to the
//! issued-at claim, so a provider clock slightly ahead of ours does not
//! reject freshly issued tokens.

use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{Algorithm, TokenData, Validation, decode, decode_header};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::FederationConfig;
use crate::error::{FederationError, FederationResult};
use crate::jwks::KeySetCache;

/// Signature algorithms accepted from the provider
///
/// Only asymmetric algorithms: a symmetric token cannot be verified against
/// a public key set, and accepting one would open the classic
/// HS256-with-public-key confusion attack.
const ALLOWED_ALGORITHMS: &[Algorithm] = &[Algorithm::RS256, Algorithm::PS256, Algorithm::ES256];

/// Audience claim, which providers serialize as a string or an array
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Audience {
    /// Single audience value
    Single(String),
    /// Multiple audience values
    Multiple(Vec<String>),
}

impl Audience {
    /// Whether the claim names the given audience
    #[must_use]
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Self::Single(aud) => aud == audience,
            Self::Multiple(auds) => auds.iter().any(|aud| aud == audience),
        }
    }

    fn display(&self) -> String {
        match self {
            Self::Single(aud) => aud.clone(),
            Self::Multiple(auds) => auds.join(","),
        }
    }
}

/// Raw claim payload as decoded from the token
#[derive(Debug, Deserialize)]
struct RawClaims {
    sub: Option<String>,
    iss: Option<String>,
    aud: Option<Audience>,
    exp: Option<i64>,
    nbf: Option<i64>,
    iat: Option<i64>,
    email: Option<String>,
    email_verified: Option<bool>,
    #[serde(flatten)]
    additional: Map<String, Value>,
}

/// Decoded token header echoed to verify-only callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenHeader {
    /// Signing algorithm
    pub alg: String,
    /// Key id the token was signed with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Token type, usually "JWT"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

/// The validated output of a verification call
///
/// Constructed once per call and discarded after use; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct VerifiedClaims {
    /// Subject - required, non-empty
    pub sub: String,
    /// Issuer - equals the configured issuer
    pub iss: String,
    /// Audience - names the configured audience
    pub aud: Audience,
    /// Expiry (Unix seconds)
    pub exp: i64,
    /// Issued-at (Unix seconds), when the token carried one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Not-before (Unix seconds), when the token carried one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    /// Email, when the token carried one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Whether the provider attests the email as verified
    ///
    /// Strict semantics: anything other than a literal `true` is `false`.
    pub email_verified: bool,
    /// Every other claim the token carried
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

/// A verified token: decoded header plus validated claims
#[derive(Debug, Clone, Serialize)]
pub struct VerifiedToken {
    /// Decoded protected header
    pub header: TokenHeader,
    /// Validated claim set
    pub claims: VerifiedClaims,
}

/// Verifier for provider-issued identity tokens
///
/// Stateless apart from the shared [`KeySetCache`]; safe to call
/// concurrently.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    /// Expected `iss` value
    expected_issuer: String,
    /// Expected `aud` value
    expected_audience: String,
    /// Shared key-set cache
    key_set: Arc<KeySetCache>,
    /// Clock-skew tolerance for the issued-at check, in seconds
    clock_skew_secs: i64,
}

impl TokenVerifier {
    /// Create a verifier from configuration and a shared key-set cache
    #[must_use]
    pub fn new(config: &FederationConfig, key_set: Arc<KeySetCache>) -> Self {
        Self {
            expected_issuer: config.issuer_url.clone(),
            expected_audience: config.audience.clone(),
            key_set,
            clock_skew_secs: config.clock_skew.as_secs() as i64,
        }
    }

    /// Verify a presented token
    ///
    /// # Errors
    ///
    /// - [`FederationError::MalformedToken`] - unparseable token, missing
    ///   key id, or algorithm outside the allowlist
    /// - [`FederationError::KeyNotFound`] / [`FederationError::KeySetUnavailable`] -
    ///   from the key-set lookup
    /// - [`FederationError::SignatureInvalid`] - signature check failed
    /// - [`FederationError::IssuerMismatch`] / [`FederationError::AudienceMismatch`] /
    ///   [`FederationError::Expired`] / [`FederationError::NotYetValid`] /
    ///   [`FederationError::MissingSubject`] - semantic claim checks
    pub async fn verify(&self, token: &str) -> FederationResult<VerifiedToken> {
        // Parse: everything semantic depends on this succeeding.
        let header = decode_header(token).map_err(|e| {
            debug!(error = %e, "failed to decode token header");
            FederationError::MalformedToken(format!("undecodable header: {e}"))
        })?;

        if !ALLOWED_ALGORITHMS.contains(&header.alg) {
            warn!(algorithm = ?header.alg, "token algorithm not allowed");
            return Err(FederationError::MalformedToken(format!(
                "algorithm {:?} not allowed",
                header.alg
            )));
        }

        let key_id = header.kid.clone().ok_or_else(|| {
            FederationError::MalformedToken("header carries no key id".to_string())
        })?;

        let decoding_key = self.key_set.verification_key(&key_id).await?;

        // Signature only; the semantic checks below own every claim rule so
        // each failure maps to its own error variant and the expiry
        // boundary stays strict.
        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let token_data: TokenData<RawClaims> =
            decode(token, &decoding_key, &validation).map_err(|e| {
                use jsonwebtoken::errors::ErrorKind;
                match e.kind() {
                    ErrorKind::Base64(_)
                    | ErrorKind::Json(_)
                    | ErrorKind::Utf8(_)
                    | ErrorKind::InvalidToken => {
                        FederationError::MalformedToken(format!("undecodable payload: {e}"))
                    }
                    _ => {
                        warn!(key_id, error = %e, "token signature verification failed");
                        FederationError::SignatureInvalid(e.to_string())
                    }
                }
            })?;

        let claims = self.check_claims(token_data.claims)?;

        debug!(
            subject = %claims.sub,
            issuer = %claims.iss,
            key_id,
            "token verified"
        );

        Ok(VerifiedToken {
            header: TokenHeader {
                alg: format!("{:?}", header.alg),
                kid: Some(key_id),
                typ: header.typ,
            },
            claims,
        })
    }

    /// Run the semantic claim checks over a signature-verified payload
    fn check_claims(&self, raw: RawClaims) -> FederationResult<VerifiedClaims> {
        let now = Utc::now().timestamp();

        let iss = raw.iss.unwrap_or_default();
        if iss != self.expected_issuer {
            return Err(FederationError::IssuerMismatch {
                expected: self.expected_issuer.clone(),
                found: iss,
            });
        }

        let aud = raw.aud.ok_or_else(|| FederationError::AudienceMismatch {
            expected: self.expected_audience.clone(),
            found: String::new(),
        })?;
        if !aud.contains(&self.expected_audience) {
            return Err(FederationError::AudienceMismatch {
                expected: self.expected_audience.clone(),
                found: aud.display(),
            });
        }

        let exp = raw
            .exp
            .ok_or_else(|| FederationError::MalformedToken("missing exp claim".to_string()))?;
        if now >= exp {
            return Err(FederationError::Expired);
        }
        if let Some(nbf) = raw.nbf
            && now < nbf
        {
            return Err(FederationError::NotYetValid);
        }
        if let Some(iat) = raw.iat
            && iat > now + self.clock_skew_secs
        {
            return Err(FederationError::NotYetValid);
        }

        let sub = match raw.sub {
            Some(sub) if !sub.is_empty() => sub,
            _ => return Err(FederationError::MissingSubject),
        };

        Ok(VerifiedClaims {
            sub,
            iss,
            aud,
            exp,
            iat: raw.iat,
            nbf: raw.nbf,
            email: raw.email,
            email_verified: raw.email_verified == Some(true),
            additional: raw.additional,
        })
    }

    /// The issuer this verifier expects
    #[must_use]
    pub fn expected_issuer(&self) -> &str {
        &self.expected_issuer
    }

    /// The audience this verifier expects
    #[must_use]
    pub fn expected_audience(&self) -> &str {
        &self.expected_audience
    }
}
