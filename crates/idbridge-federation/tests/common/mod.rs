//! Shared test infrastructure for federation integration tests
//!
//! Provides a mock identity provider (wiremock), RSA test key pairs in both
//! PEM and JWK form, and token builders for exercising the verification
//! pipeline against realistic RS256-signed tokens.

#![allow(dead_code)]

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use rsa::RsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ISSUER: &str = "https://idp.example.com";
pub const AUDIENCE: &str = "client-7731";

/// An RSA signing key with its public JWK representation
pub struct TestKey {
    pub kid: String,
    pub private_pem: Vec<u8>,
    pub jwk: Value,
}

impl TestKey {
    /// Generate a fresh 2048-bit RSA key pair under the given key id
    pub fn generate(kid: &str) -> Self {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("Failed to generate RSA key");
        let public_key = private_key.to_public_key();

        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .expect("Failed to encode private key")
            .as_bytes()
            .to_vec();

        let jwk = json!({
            "kty": "RSA",
            "kid": kid,
            "use": "sig",
            "alg": "RS256",
            "n": URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
            "e": URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
        });

        Self {
            kid: kid.to_string(),
            private_pem,
            jwk,
        }
    }

    /// Sign claims as an RS256 token carrying this key's id
    pub fn sign(&self, claims: &Value) -> String {
        self.sign_with_kid(Some(&self.kid), claims)
    }

    /// Sign claims with an explicit (or absent) key id in the header
    pub fn sign_with_kid(&self, kid: Option<&str>, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = kid.map(str::to_string);
        let key =
            EncodingKey::from_rsa_pem(&self.private_pem).expect("Invalid RSA private key PEM");
        encode(&header, claims, &key).expect("Failed to encode test JWT")
    }
}

/// Mock identity provider serving a JWKS endpoint
pub struct MockIdp {
    pub server: MockServer,
    pub jwks_url: String,
}

impl MockIdp {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let jwks_url = format!("{}/jwks", server.uri());
        Self { server, jwks_url }
    }

    /// Serve the given keys from the JWKS endpoint
    pub async fn mock_jwks(&self, keys: &[&TestKey]) {
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "keys": keys.iter().map(|k| k.jwk.clone()).collect::<Vec<_>>()
            })))
            .mount(&self.server)
            .await;
    }

    /// Serve the given keys, but only for the first `n` requests
    pub async fn mock_jwks_up_to(&self, keys: &[&TestKey], n: u64) {
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "keys": keys.iter().map(|k| k.jwk.clone()).collect::<Vec<_>>()
            })))
            .up_to_n_times(n)
            .mount(&self.server)
            .await;
    }

    /// Serve an error status from the JWKS endpoint
    pub async fn mock_jwks_error(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Number of requests the JWKS endpoint has served
    pub async fn jwks_request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|reqs| reqs.iter().filter(|r| r.url.path() == "/jwks").count())
            .unwrap_or(0)
    }
}

/// Current Unix timestamp
pub fn now() -> i64 {
    Utc::now().timestamp()
}

/// Standard claims for a token valid for `exp_offset_secs` from now
pub fn claims(sub: &str, exp_offset_secs: i64) -> Value {
    let now = now();
    json!({
        "sub": sub,
        "iss": ISSUER,
        "aud": AUDIENCE,
        "exp": now + exp_offset_secs,
        "iat": now,
        "nbf": now,
    })
}
