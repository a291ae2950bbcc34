//! Federation configuration
//!
//! Configuration is environment-sourced and validated once at startup. The
//! issuer and key-set URLs are fixed for the lifetime of the process; the
//! audience must be explicitly configured - the placeholder default is
//! treated as "not configured" and makes every mint request fail closed
//! with a precondition error before any verification work happens.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{FederationError, FederationResult};

/// Sentinel audience value meaning "not configured"
///
/// Deployments must replace this with the client id the provider issues
/// tokens for. While the audience still carries this value, minting is
/// disabled.
pub const AUDIENCE_PLACEHOLDER: &str = "REPLACE_WITH_AUDIENCE";

/// Environment variable for the provider issuer URL
pub const ENV_ISSUER_URL: &str = "IDBRIDGE_ISSUER_URL";
/// Environment variable for the expected audience
pub const ENV_AUDIENCE: &str = "IDBRIDGE_AUDIENCE";
/// Environment variable for the provider JWKS URL
pub const ENV_JWKS_URL: &str = "IDBRIDGE_JWKS_URL";

fn default_cache_ttl() -> Duration {
    Duration::from_secs(600)
}

fn default_min_refresh_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_clock_skew() -> Duration {
    Duration::from_secs(60)
}

/// Configuration for the verification and minting pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederationConfig {
    /// Issuer the `iss` claim must equal (fixed per deployment)
    pub issuer_url: String,
    /// Audience the `aud` claim must equal
    ///
    /// Defaults to [`AUDIENCE_PLACEHOLDER`], which disables minting.
    pub audience: String,
    /// Well-known URL the public key set is fetched from (fixed per
    /// deployment)
    pub jwks_url: String,
    /// How long a fetched key set stays fresh
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: Duration,
    /// Minimum interval between key-set refreshes on cache misses
    #[serde(default = "default_min_refresh_interval")]
    pub min_refresh_interval: Duration,
    /// Clock-skew tolerance applied to the issued-at claim
    #[serde(default = "default_clock_skew")]
    pub clock_skew: Duration,
}

impl FederationConfig {
    /// Build a configuration with defaults for the tunables
    #[must_use]
    pub fn new(
        issuer_url: impl Into<String>,
        audience: impl Into<String>,
        jwks_url: impl Into<String>,
    ) -> Self {
        Self {
            issuer_url: issuer_url.into(),
            audience: audience.into(),
            jwks_url: jwks_url.into(),
            cache_ttl: default_cache_ttl(),
            min_refresh_interval: default_min_refresh_interval(),
            clock_skew: default_clock_skew(),
        }
    }

    /// Load configuration from the environment
    ///
    /// `IDBRIDGE_ISSUER_URL` and `IDBRIDGE_JWKS_URL` are required;
    /// `IDBRIDGE_AUDIENCE` falls back to the placeholder, leaving the
    /// service able to answer verify-only requests but refusing to mint.
    ///
    /// # Errors
    ///
    /// Returns [`FederationError::ConfigurationInvalid`] when a required
    /// variable is missing or not a valid URL.
    pub fn from_env() -> FederationResult<Self> {
        let issuer_url = env::var(ENV_ISSUER_URL).map_err(|_| {
            FederationError::ConfigurationInvalid(format!("{ENV_ISSUER_URL} is not set"))
        })?;
        let jwks_url = env::var(ENV_JWKS_URL).map_err(|_| {
            FederationError::ConfigurationInvalid(format!("{ENV_JWKS_URL} is not set"))
        })?;
        let audience =
            env::var(ENV_AUDIENCE).unwrap_or_else(|_| AUDIENCE_PLACEHOLDER.to_string());

        let config = Self::new(issuer_url, audience, jwks_url);
        config.validate()?;
        Ok(config)
    }

    /// Validate the fixed endpoints
    ///
    /// # Errors
    ///
    /// Returns [`FederationError::ConfigurationInvalid`] when the issuer or
    /// key-set URL cannot be parsed.
    pub fn validate(&self) -> FederationResult<()> {
        Url::parse(&self.issuer_url).map_err(|e| {
            FederationError::ConfigurationInvalid(format!(
                "issuer URL '{}' is not a valid URL: {e}",
                self.issuer_url
            ))
        })?;
        Url::parse(&self.jwks_url).map_err(|e| {
            FederationError::ConfigurationInvalid(format!(
                "JWKS URL '{}' is not a valid URL: {e}",
                self.jwks_url
            ))
        })?;
        Ok(())
    }

    /// Whether an audience has been explicitly configured
    #[must_use]
    pub fn audience_is_configured(&self) -> bool {
        !self.audience.is_empty() && self.audience != AUDIENCE_PLACEHOLDER
    }

    /// Fail closed when the audience is still the placeholder
    ///
    /// Called by the minting path before any verification work.
    ///
    /// # Errors
    ///
    /// Returns [`FederationError::ConfigurationInvalid`] when the audience
    /// is unset.
    pub fn ensure_mint_configured(&self) -> FederationResult<()> {
        if self.audience_is_configured() {
            Ok(())
        } else {
            Err(FederationError::ConfigurationInvalid(format!(
                "audience is not configured; set {ENV_AUDIENCE}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_audience(audience: &str) -> FederationConfig {
        FederationConfig::new(
            "https://idp.example.com",
            audience,
            "https://idp.example.com/.well-known/jwks.json",
        )
    }

    #[test]
    fn placeholder_audience_is_not_configured() {
        let config = config_with_audience(AUDIENCE_PLACEHOLDER);
        assert!(!config.audience_is_configured());
        assert!(matches!(
            config.ensure_mint_configured(),
            Err(FederationError::ConfigurationInvalid(_))
        ));
    }

    #[test]
    fn empty_audience_is_not_configured() {
        let config = config_with_audience("");
        assert!(!config.audience_is_configured());
    }

    #[test]
    fn explicit_audience_is_configured() {
        let config = config_with_audience("client-7731");
        assert!(config.audience_is_configured());
        assert!(config.ensure_mint_configured().is_ok());
    }

    #[test]
    fn invalid_issuer_url_is_rejected() {
        let config = FederationConfig::new("not a url", "client", "https://idp.example.com/jwks");
        assert!(matches!(
            config.validate(),
            Err(FederationError::ConfigurationInvalid(_))
        ));
    }

    #[test]
    fn defaults_match_contract() {
        let config = config_with_audience("client");
        assert_eq!(config.cache_ttl, Duration::from_secs(600));
        assert_eq!(config.min_refresh_interval, Duration::from_secs(5));
        assert_eq!(config.clock_skew, Duration::from_secs(60));
    }
}
