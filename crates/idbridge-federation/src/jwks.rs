//! Remote key-set fetching and caching
//!
//! The identity provider publishes its public signing keys at a fixed
//! well-known URL. This module caches that key set and transparently
//! refreshes it when a requested key id is missing, which is how provider
//! key rotation shows up from our side.
//!
//! Behavior under contention and failure:
//!
//! - Concurrent misses collapse into a single in-flight refresh; waiters
//!   re-check the cache instead of issuing their own fetch.
//! - Refreshes are rate limited by a minimum interval so repeated misses
//!   for a genuinely unknown key id cannot hammer the endpoint.
//! - A failed fetch never discards the prior set: already-known key ids
//!   keep verifying from the stale copy until the endpoint recovers.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::JwkSet;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::FederationConfig;
use crate::error::{FederationError, FederationResult};

/// Fetch timeout for the key-set endpoint
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// A fetched key set with staleness metadata
#[derive(Debug, Clone)]
struct CachedKeySet {
    keys: JwkSet,
    fetched_at: SystemTime,
    ttl: Duration,
}

impl CachedKeySet {
    /// Whether this set is still within its staleness window
    fn is_fresh(&self) -> bool {
        match SystemTime::now().duration_since(self.fetched_at) {
            Ok(age) => age < self.ttl,
            Err(_) => false, // clock went backwards, treat as stale
        }
    }

    fn contains(&self, key_id: &str) -> bool {
        self.keys.find(key_id).is_some()
    }
}

/// Process-wide cache for the provider's public key set
///
/// Clones share the same underlying cache, so one instance can serve every
/// concurrent verification without coordination beyond the internal locks.
///
/// # Example
///
/// ```rust,no_run
/// # use idbridge_federation::jwks::KeySetCache;
/// # tokio_test::block_on(async {
/// let cache = KeySetCache::new(
///     "https://idp.example.com/.well-known/jwks.json".to_string(),
/// );
/// let key = cache.verification_key("key-2026-01").await?;
/// # Ok::<(), idbridge_federation::FederationError>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct KeySetCache {
    /// Key-set endpoint URL
    jwks_url: String,
    /// Cached key set
    cache: Arc<RwLock<Option<CachedKeySet>>>,
    /// HTTP client
    http_client: reqwest::Client,
    /// Cache TTL
    cache_ttl: Duration,
    /// Minimum interval between refresh fetches
    min_refresh_interval: Duration,
    /// When the last fetch was attempted (success or failure)
    last_refresh: Arc<RwLock<Option<SystemTime>>>,
    /// Single-flight gate: only one caller fetches at a time
    refresh_gate: Arc<Mutex<()>>,
}

impl KeySetCache {
    /// Create a cache with default TTL (10 minutes) and refresh interval
    /// (5 seconds)
    #[must_use]
    pub fn new(jwks_url: String) -> Self {
        Self {
            jwks_url,
            cache: Arc::new(RwLock::new(None)),
            http_client: reqwest::Client::builder()
                .timeout(FETCH_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            cache_ttl: Duration::from_secs(600),
            min_refresh_interval: Duration::from_secs(5),
            last_refresh: Arc::new(RwLock::new(None)),
            refresh_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Create a cache using the TTL and refresh interval from configuration
    #[must_use]
    pub fn from_config(config: &FederationConfig) -> Self {
        let mut cache = Self::new(config.jwks_url.clone());
        cache.cache_ttl = config.cache_ttl;
        cache.min_refresh_interval = config.min_refresh_interval;
        cache
    }

    /// Resolve a verification key by key id
    ///
    /// Serves from the cache when fresh; otherwise performs (or waits on)
    /// one refresh and re-checks. A key id still absent after that refresh
    /// is reported as [`FederationError::KeyNotFound`].
    ///
    /// # Errors
    ///
    /// - [`FederationError::KeyNotFound`] - the id is absent from the
    ///   current set after one refresh attempt
    /// - [`FederationError::KeySetUnavailable`] - the endpoint could not be
    ///   reached and no cached copy carries the id
    /// - [`FederationError::SignatureInvalid`] - the matching JWK cannot be
    ///   turned into a decoding key
    pub async fn verification_key(&self, key_id: &str) -> FederationResult<DecodingKey> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref()
                && cached.is_fresh()
                && let Some(jwk) = cached.keys.find(key_id)
            {
                debug!(key_id, "serving verification key from cache");
                return decoding_key(key_id, jwk);
            }
        }

        // Miss or stale cache: refresh under the single-flight gate.
        self.refresh_and_find(key_id).await
    }

    /// Refresh the key set (single-flight, rate limited) and look the key
    /// id up again
    async fn refresh_and_find(&self, key_id: &str) -> FederationResult<DecodingKey> {
        let _gate = self.refresh_gate.lock().await;

        // A caller that held the gate before us may already have refreshed;
        // honoring the minimum interval here is also what collapses
        // concurrent misses into one fetch.
        let recently_refreshed = {
            let last = self.last_refresh.read().await;
            match *last {
                Some(at) => SystemTime::now()
                    .duration_since(at)
                    .map(|since| since < self.min_refresh_interval)
                    .unwrap_or(false),
                None => false,
            }
        };

        let fetch_result = if recently_refreshed {
            debug!(
                jwks_url = %self.jwks_url,
                key_id,
                "skipping key-set fetch, refreshed within the minimum interval"
            );
            Ok(())
        } else {
            self.fetch_and_store().await
        };

        let cache = self.cache.read().await;
        match (fetch_result, cache.as_ref()) {
            // Refresh happened (or was recent): the cache is the current
            // truth for this key id.
            (Ok(()), Some(cached)) => match cached.keys.find(key_id) {
                Some(jwk) => decoding_key(key_id, jwk),
                None => Err(FederationError::KeyNotFound(key_id.to_string())),
            },
            (Ok(()), None) => Err(FederationError::KeyNotFound(key_id.to_string())),
            // Refresh failed: a stale set still serves the ids it knows.
            (Err(err), Some(cached)) => match cached.keys.find(key_id) {
                Some(jwk) => {
                    warn!(
                        jwks_url = %self.jwks_url,
                        key_id,
                        error = %err,
                        "key-set refresh failed, serving key from stale cache"
                    );
                    decoding_key(key_id, jwk)
                }
                None => Err(err),
            },
            (Err(err), None) => Err(err),
        }
    }

    /// Fetch the key set from the endpoint and replace the cached copy
    async fn fetch_and_store(&self) -> FederationResult<()> {
        info!(jwks_url = %self.jwks_url, "fetching key set");

        // Record the attempt before the outcome is known so a failing
        // endpoint is not hammered by every concurrent miss.
        {
            let mut last = self.last_refresh.write().await;
            *last = Some(SystemTime::now());
        }

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                warn!(jwks_url = %self.jwks_url, error = %e, "key-set fetch failed");
                FederationError::KeySetUnavailable(format!("fetch failed: {e}"))
            })?;

        if !response.status().is_success() {
            warn!(
                jwks_url = %self.jwks_url,
                status = %response.status(),
                "key-set endpoint returned error status"
            );
            return Err(FederationError::KeySetUnavailable(format!(
                "endpoint returned status {}",
                response.status()
            )));
        }

        let keys: JwkSet = response.json().await.map_err(|e| {
            warn!(jwks_url = %self.jwks_url, error = %e, "key-set response is not a valid JWKS");
            FederationError::KeySetUnavailable(format!("invalid key-set document: {e}"))
        })?;

        info!(
            jwks_url = %self.jwks_url,
            key_count = keys.keys.len(),
            "key set refreshed"
        );

        let mut cache = self.cache.write().await;
        *cache = Some(CachedKeySet {
            keys,
            fetched_at: SystemTime::now(),
            ttl: self.cache_ttl,
        });
        Ok(())
    }

    /// The configured key-set endpoint
    #[must_use]
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Whether any key set is currently cached (fresh or stale)
    pub async fn is_populated(&self) -> bool {
        self.cache.read().await.is_some()
    }

    /// Drop the cached set and the refresh timestamp
    ///
    /// Forces the next lookup to fetch. Intended for tests and operational
    /// tooling; the cache is otherwise never torn down mid-process.
    pub async fn clear(&self) {
        *self.cache.write().await = None;
        *self.last_refresh.write().await = None;
        debug!(jwks_url = %self.jwks_url, "key-set cache cleared");
    }
}

fn decoding_key(key_id: &str, jwk: &jsonwebtoken::jwk::Jwk) -> FederationResult<DecodingKey> {
    DecodingKey::from_jwk(jwk).map_err(|e| {
        warn!(key_id, error = %e, "cached JWK cannot be used as a decoding key");
        FederationError::SignatureInvalid(format!("unusable verification key '{key_id}': {e}"))
    })
}
