//! HTTP identity directory client
//!
//! JSON client for a directory service exposing:
//!
//! - `GET  /v1/users/{uid}` - 200 with a user record, 404 when absent
//! - `POST /v1/users` - 201 on create, 409 when the record already exists
//! - `POST /v1/tokens` - 200 with a signed session token
//!
//! Every request is bounded by a client-level timeout; expiry surfaces as
//! [`DirectoryError::Unreachable`] rather than a hung request. No retries
//! happen here - retry policy belongs to the caller.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{DirectoryError, IdentityDirectory, ProvisionOutcome, UserRecord};
use crate::claims::SanitizedClaims;

/// Request timeout for directory calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP directory backend
#[derive(Debug, Clone)]
pub struct HttpDirectory {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

impl HttpDirectory {
    /// Create a client for the directory at `base_url`
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl IdentityDirectory for HttpDirectory {
    async fn get_user(&self, uid: &str) -> Result<Option<UserRecord>, DirectoryError> {
        let response = self
            .client
            .get(self.url(&format!("/v1/users/{uid}")))
            .send()
            .await
            .map_err(|e| DirectoryError::Unreachable(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let record: UserRecord = response
                    .json()
                    .await
                    .map_err(|e| DirectoryError::Rejected(format!("invalid user record: {e}")))?;
                Ok(Some(record))
            }
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            status => Err(DirectoryError::Rejected(format!(
                "user lookup returned status {status}"
            ))),
        }
    }

    async fn create_user(
        &self,
        uid: &str,
        email: Option<&str>,
    ) -> Result<ProvisionOutcome, DirectoryError> {
        let response = self
            .client
            .post(self.url("/v1/users"))
            .json(&json!({ "uid": uid, "email": email }))
            .send()
            .await
            .map_err(|e| DirectoryError::Unreachable(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let record: UserRecord = response
                    .json()
                    .await
                    .map_err(|e| DirectoryError::Rejected(format!("invalid user record: {e}")))?;
                debug!(uid, "user record created in directory");
                Ok(ProvisionOutcome::Created(record))
            }
            reqwest::StatusCode::CONFLICT => {
                // Benign race: a concurrent request created the record
                // between our lookup and this create.
                debug!(uid, "directory reports user already exists");
                Ok(ProvisionOutcome::AlreadyExists(UserRecord {
                    uid: uid.to_string(),
                    email: email.map(str::to_string),
                }))
            }
            status => {
                warn!(uid, %status, "directory rejected user creation");
                Err(DirectoryError::Rejected(format!(
                    "user creation returned status {status}"
                )))
            }
        }
    }

    async fn create_signed_token(
        &self,
        uid: &str,
        claims: &SanitizedClaims,
    ) -> Result<String, DirectoryError> {
        let response = self
            .client
            .post(self.url("/v1/tokens"))
            .json(&json!({ "uid": uid, "claims": claims }))
            .send()
            .await
            .map_err(|e| DirectoryError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DirectoryError::Signing(format!(
                "token endpoint returned status {}",
                response.status()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| DirectoryError::Signing(format!("invalid token response: {e}")))?;
        Ok(body.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let directory = HttpDirectory::new("https://directory.internal/");
        assert_eq!(
            directory.url("/v1/users/abc"),
            "https://directory.internal/v1/users/abc"
        );
    }
}
