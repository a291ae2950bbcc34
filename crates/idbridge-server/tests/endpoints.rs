//! Endpoint tests
//!
//! Drives the router directly with `tower::ServiceExt::oneshot`, backed by
//! the in-process dev directory and a wiremock JWKS endpoint.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use idbridge_federation::directory::memory::MemoryDirectory;
use idbridge_federation::{AUDIENCE_PLACEHOLDER, FederationBridge, FederationConfig};
use idbridge_server::{AppState, router};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use rsa::RsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ISSUER: &str = "https://idp.example.com";
const AUDIENCE: &str = "client-7731";
const KID: &str = "key-1";

struct TestIdp {
    _server: MockServer,
    jwks_url: String,
    private_pem: Vec<u8>,
}

impl TestIdp {
    /// Start a mock provider serving a fresh RSA key under `KID`
    async fn start() -> Self {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("Failed to generate RSA key");
        let public_key = private_key.to_public_key();
        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .expect("Failed to encode private key")
            .as_bytes()
            .to_vec();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "keys": [{
                    "kty": "RSA",
                    "kid": KID,
                    "use": "sig",
                    "alg": "RS256",
                    "n": URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
                    "e": URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
                }]
            })))
            .mount(&server)
            .await;

        let jwks_url = format!("{}/jwks", server.uri());
        Self {
            _server: server,
            jwks_url,
            private_pem,
        }
    }

    fn sign(&self, sub: &str) -> String {
        let now = Utc::now().timestamp();
        let claims = json!({
            "sub": sub,
            "iss": ISSUER,
            "aud": AUDIENCE,
            "exp": now + 300,
            "iat": now,
            "email": "u@example.com",
        });
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(KID.to_string());
        let key = EncodingKey::from_rsa_pem(&self.private_pem).expect("Invalid RSA key PEM");
        encode(&header, &claims, &key).expect("Failed to encode test JWT")
    }
}

fn app(audience: &str, jwks_url: &str) -> Router {
    let config = FederationConfig::new(ISSUER, audience, jwks_url);
    let bridge = FederationBridge::new(config, Arc::new(MemoryDirectory::new(b"test-secret")));
    router(AppState {
        bridge: Arc::new(bridge),
    })
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn missing_id_token_is_invalid_argument() {
    let idp = TestIdp::start().await;
    let app = app(AUDIENCE, &idp.jwks_url);

    let (status, body) = post_json(app, "/v1/tokens/mint", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid-argument");
}

#[tokio::test]
async fn malformed_token_is_unauthenticated() {
    let idp = TestIdp::start().await;
    let app = app(AUDIENCE, &idp.jwks_url);

    let (status, body) =
        post_json(app, "/v1/tokens/verify", json!({"id_token": "not-a-jwt"})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");
}

#[tokio::test]
async fn placeholder_audience_is_failed_precondition() {
    let idp = TestIdp::start().await;
    let token = idp.sign("user-42");
    let app = app(AUDIENCE_PLACEHOLDER, &idp.jwks_url);

    let (status, body) = post_json(app, "/v1/tokens/mint", json!({"id_token": token})).await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(body["error"], "failed-precondition");
}

#[tokio::test]
async fn mint_returns_token_uid_and_email() {
    let idp = TestIdp::start().await;
    let token = idp.sign("user-42");
    let app = app(AUDIENCE, &idp.jwks_url);

    let (status, body) = post_json(app, "/v1/tokens/mint", json!({"id_token": token})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["uid"], "federated:user-42");
    assert_eq!(body["email"], "u@example.com");
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn verify_echoes_header_and_claims() {
    let idp = TestIdp::start().await;
    let token = idp.sign("user-42");
    let app = app(AUDIENCE, &idp.jwks_url);

    let (status, body) = post_json(app, "/v1/tokens/verify", json!({"id_token": token})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["header"]["kid"], KID);
    assert_eq!(body["claims"]["sub"], "user-42");
    assert_eq!(body["claims"]["iss"], ISSUER);
    // Verify-only never mints anything.
    assert!(body.get("token").is_none());
}

#[tokio::test]
async fn health_endpoint_answers() {
    let idp = TestIdp::start().await;
    let app = app(AUDIENCE, &idp.jwks_url);

    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
