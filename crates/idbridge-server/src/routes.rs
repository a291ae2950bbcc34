//! HTTP endpoints
//!
//! Two entry points over the federation pipeline:
//!
//! - `POST /v1/tokens/mint` - verify the presented token and mint a
//!   first-party session token
//! - `POST /v1/tokens/verify` - verify only; echoes the decoded header and
//!   claim payload
//!
//! Both accept `{ "id_token": "..." }`. A missing or empty token is an
//! invalid-argument failure before the pipeline runs.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use idbridge_federation::{FederationBridge, TokenHeader, VerifiedClaims};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;

/// Shared application state
#[derive(Debug, Clone)]
pub struct AppState {
    /// The verification and minting pipeline
    pub bridge: Arc<FederationBridge>,
}

/// Request body for both token endpoints
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    /// The provider-issued identity token
    #[serde(default)]
    pub id_token: Option<String>,
}

impl TokenRequest {
    fn token(&self) -> Result<&str, ApiError> {
        match self.id_token.as_deref() {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(ApiError::MissingIdToken),
        }
    }
}

/// Response body for `tokens/mint`
#[derive(Debug, Serialize)]
pub struct MintResponse {
    /// The minted session token (opaque capability)
    pub token: String,
    /// Internal user id
    pub uid: String,
    /// Email echoed from the verified token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Response body for `tokens/verify`
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    /// Always `true`; failures never reach a response body
    pub valid: bool,
    /// Decoded token header
    pub header: TokenHeader,
    /// Validated claim payload
    pub claims: VerifiedClaims,
}

/// Build the service router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/tokens/mint", post(mint))
        .route("/v1/tokens/verify", post(verify))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn mint(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<MintResponse>, ApiError> {
    let token = request.token()?;
    let minted = state.bridge.verify_and_mint(token).await?;
    debug!(uid = %minted.uid, "mint request served");
    Ok(Json(MintResponse {
        token: minted.token,
        uid: minted.uid,
        email: minted.email,
    }))
}

async fn verify(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let token = request.token()?;
    let verified = state.bridge.verify(token).await?;
    debug!(subject = %verified.claims.sub, "verify request served");
    Ok(Json(VerifyResponse {
        valid: true,
        header: verified.header,
        claims: verified.claims,
    }))
}
