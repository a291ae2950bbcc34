//! In-process identity directory
//!
//! Development backend: user records live in a map, session tokens are
//! signed with a symmetric dev key. Not suitable for production - the
//! signing key never rotates and records do not survive a restart - but it
//! makes the whole pipeline runnable and testable without a directory
//! deployment.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{DirectoryError, IdentityDirectory, ProvisionOutcome, UserRecord};
use crate::claims::SanitizedClaims;

/// Issuer stamped into dev-signed session tokens
const DEV_ISSUER: &str = "idbridge-dev";
/// Session token lifetime in seconds
const TOKEN_LIFETIME_SECS: i64 = 3600;

/// In-memory directory backend
pub struct MemoryDirectory {
    users: RwLock<HashMap<String, UserRecord>>,
    signing_key: EncodingKey,
}

impl std::fmt::Debug for MemoryDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDirectory")
            .field("signing_key", &"<EncodingKey>")
            .finish_non_exhaustive()
    }
}

impl MemoryDirectory {
    /// Create a directory signing with the given symmetric secret
    #[must_use]
    pub fn new(signing_secret: &[u8]) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            signing_key: EncodingKey::from_secret(signing_secret),
        }
    }

    /// Number of records currently held
    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl IdentityDirectory for MemoryDirectory {
    async fn get_user(&self, uid: &str) -> Result<Option<UserRecord>, DirectoryError> {
        Ok(self.users.read().await.get(uid).cloned())
    }

    async fn create_user(
        &self,
        uid: &str,
        email: Option<&str>,
    ) -> Result<ProvisionOutcome, DirectoryError> {
        let mut users = self.users.write().await;
        if let Some(existing) = users.get(uid) {
            debug!(uid, "create lost the race, record already exists");
            return Ok(ProvisionOutcome::AlreadyExists(existing.clone()));
        }
        let record = UserRecord {
            uid: uid.to_string(),
            email: email.map(str::to_string),
        };
        users.insert(uid.to_string(), record.clone());
        debug!(uid, "user record created");
        Ok(ProvisionOutcome::Created(record))
    }

    async fn create_signed_token(
        &self,
        uid: &str,
        claims: &SanitizedClaims,
    ) -> Result<String, DirectoryError> {
        let now = Utc::now().timestamp();
        let payload = json!({
            "iss": DEV_ISSUER,
            "sub": uid,
            "aud": DEV_ISSUER,
            "uid": uid,
            "iat": now,
            "exp": now + TOKEN_LIFETIME_SECS,
            "jti": Uuid::new_v4().to_string(),
            "claims": claims,
        });
        encode(&Header::new(Algorithm::HS256), &payload, &self.signing_key)
            .map_err(|e| DirectoryError::Signing(e.to_string()))
    }
}
