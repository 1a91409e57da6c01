//! Common test utilities for integration tests
//!
//! Provides a mock key-set endpoint, RSA signing keys with self-signed `x5c`
//! certificates, and token minting helpers.

#![allow(dead_code)]

use std::sync::{Arc, OnceLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use quillpad_auth::jwt::KeySetCache;
use quillpad_auth::{AuthorizationService, AuthorizerConfig, AuthorizerConfigBuilder};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub const PRIMARY_KID: &str = "key-2026-10";
pub const ROTATED_KID: &str = "key-2026-11";

/// RSA signing key plus its self-signed certificate (base64 DER)
pub struct TestKey {
    pub private_pem: Vec<u8>,
    pub certificate: String,
}

impl TestKey {
    fn generate() -> Self {
        use rsa::RsaPrivateKey;
        use rsa::pkcs8::{EncodePrivateKey, LineEnding};

        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("Failed to generate RSA key");
        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .expect("Failed to encode private key")
            .as_bytes()
            .to_vec();

        let key_pair = rcgen::KeyPair::from_pem(
            std::str::from_utf8(&private_pem).expect("PEM is ASCII"),
        )
        .expect("rcgen rejected RSA key");
        let params = rcgen::CertificateParams::new(vec!["issuer.test".to_string()])
            .expect("Invalid certificate params");
        let cert = params
            .self_signed(&key_pair)
            .expect("Failed to self-sign certificate");

        Self {
            private_pem,
            certificate: STANDARD.encode(cert.der().to_vec()),
        }
    }

    /// JWK entry publishing this key under `kid`
    pub fn jwk(&self, kid: &str) -> serde_json::Value {
        json!({
            "kty": "RSA",
            "kid": kid,
            "use": "sig",
            "alg": "RS256",
            "x5c": [self.certificate],
        })
    }

    /// RS256 token over `claims`
    pub fn sign(&self, kid: &str, claims: &serde_json::Value) -> String {
        self.sign_with(Algorithm::RS256, kid, claims)
    }

    /// Token over `claims` with an RSA algorithm of choice
    pub fn sign_with(&self, algorithm: Algorithm, kid: &str, claims: &serde_json::Value) -> String {
        let key = EncodingKey::from_rsa_pem(&self.private_pem).expect("Invalid RSA key");
        let mut header = Header::new(algorithm);
        header.typ = Some("JWT".to_string());
        header.kid = Some(kid.to_string());
        encode(&header, claims, &key).expect("Failed to encode test JWT")
    }
}

/// Issuer key, generated once per test binary
pub fn issuer_key() -> &'static TestKey {
    static KEY: OnceLock<TestKey> = OnceLock::new();
    KEY.get_or_init(TestKey::generate)
}

/// Second key (rotation target or attacker key)
pub fn other_key() -> &'static TestKey {
    static KEY: OnceLock<TestKey> = OnceLock::new();
    KEY.get_or_init(TestKey::generate)
}

/// Get current Unix timestamp
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs()
}

/// Claims for `sub` expiring `exp_offset_secs` from now
pub fn claims(sub: &str, exp_offset_secs: i64) -> serde_json::Value {
    let now = current_timestamp();
    json!({
        "sub": sub,
        "iat": now,
        "exp": (now as i64 + exp_offset_secs) as u64,
    })
}

/// `Bearer <token>`
pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Unsigned token with arbitrary header JSON
pub fn forge(header: serde_json::Value, claims: &serde_json::Value, signature: &str) -> String {
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string()),
        signature
    )
}

/// Mock issuer key-set endpoint
pub struct MockJwksServer {
    pub server: MockServer,
    pub jwks_endpoint: String,
}

impl MockJwksServer {
    /// Start a server with no mocks mounted
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let jwks_endpoint = format!("{}/.well-known/jwks.json", server.uri());
        Self {
            server,
            jwks_endpoint,
        }
    }

    /// Start a server publishing the issuer key under [`PRIMARY_KID`]
    pub async fn with_issuer_key() -> Self {
        let server = Self::start().await;
        server.mock_jwks(vec![issuer_key().jwk(PRIMARY_KID)]).await;
        server
    }

    /// Serve `{"keys": keys}`
    pub async fn mock_jwks(&self, keys: Vec<serde_json::Value>) {
        self.mock_response(ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })))
            .await;
    }

    /// Serve `{"keys": keys}` after `delay`
    pub async fn mock_jwks_delayed(&self, keys: Vec<serde_json::Value>, delay: Duration) {
        self.mock_response(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "keys": keys }))
                .set_delay(delay),
        )
        .await;
    }

    /// Serve an arbitrary response
    pub async fn mock_response(&self, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Drop all mocks (request history is cleared too)
    pub async fn reset(&self) {
        self.server.reset().await;
    }

    /// Number of key-set fetches received so far
    pub async fn fetch_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }

    /// Config builder pointed at this server
    pub fn config(&self) -> AuthorizerConfigBuilder {
        AuthorizerConfig::builder(&self.jwks_endpoint)
    }

    /// Service with default settings
    pub fn service(&self) -> AuthorizationService {
        service_for(self.config().build().expect("valid config"))
    }
}

/// HTTP-backed service for `config`
pub fn service_for(config: AuthorizerConfig) -> AuthorizationService {
    let cache = Arc::new(KeySetCache::from_config(&config).expect("HTTP client"));
    AuthorizationService::new(config, cache)
}
