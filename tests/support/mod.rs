//! Shared helpers for the integration tests. Generates throwaway keypairs
//! at test time rather than committing fixture files, so each test run is
//! self-consistent regardless of what fixture bytes happen to be on disk.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use gpg_signing_service::audit::AuditStore;
use gpg_signing_service::config::{Secret, ServiceConfig};
use gpg_signing_service::decrypted_cache::DecryptedKeyCache;
use gpg_signing_service::dispatcher::AppState;
use gpg_signing_service::jwks::{Jwk, JwksCache};
use gpg_signing_service::key_store::KeyStore;
use gpg_signing_service::rate_limiter::RateLimiter;
use jsonwebtoken::{encode, EncodingKey, Header};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde::Serialize;
use std::time::Duration;

pub const TEST_ISSUER: &str = "https://issuer.test";
pub const TEST_AUDIENCE: &str = "gpg-signing-service";

/// An RSA keypair plus its JWK representation, generated fresh per test.
pub struct TestRsaKey {
    pub encoding_key: EncodingKey,
    pub kid: String,
    pub jwk: Jwk,
}

pub fn generate_rsa_key(kid: &str) -> TestRsaKey {
    let mut rng = rand::rngs::OsRng;
    let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("RSA keygen");
    let der = private_key.to_pkcs1_der().expect("encode pkcs1 der");
    let encoding_key = EncodingKey::from_rsa_der(der.as_bytes());

    let public_key = private_key.to_public_key();
    let n = URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be());
    let e = URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be());

    TestRsaKey {
        encoding_key,
        kid: kid.to_string(),
        jwk: Jwk::Rsa {
            kid: Some(kid.to_string()),
            use_: Some("sig".to_string()),
            n,
            e,
        },
    }
}

#[derive(Serialize)]
pub struct TestClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub nbf: Option<i64>,
}

pub fn sign_token(key: &TestRsaKey, claims: &TestClaims) -> String {
    let mut header = Header::new(jsonwebtoken::Algorithm::RS256);
    header.kid = Some(key.kid.clone());
    encode(&header, claims, &key.encoding_key).expect("sign test token")
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

pub fn valid_claims(sub: &str) -> TestClaims {
    TestClaims {
        iss: TEST_ISSUER.to_string(),
        sub: sub.to_string(),
        aud: TEST_AUDIENCE.to_string(),
        exp: now() + 3600,
        iat: now(),
        nbf: None,
    }
}

pub fn expired_claims(sub: &str) -> TestClaims {
    TestClaims {
        iss: TEST_ISSUER.to_string(),
        sub: sub.to_string(),
        aud: TEST_AUDIENCE.to_string(),
        exp: now() - 3600,
        iat: now() - 7200,
        nbf: None,
    }
}

/// Build an `AppState` backed by temp-dir key store and an in-memory audit
/// db, with the JWKS cache pre-seeded for `TEST_ISSUER` so tests never need
/// a real HTTPS JWKS endpoint (which the SSRF guard would deny anyway for
/// any loopback test server).
pub async fn build_state(key_store_path: std::path::PathBuf, seed: Option<(&str, Vec<Jwk>)>) -> AppState {
    let jwks = JwksCache::new(Duration::from_secs(300), Duration::from_secs(5));
    if let Some((issuer, keys)) = seed {
        jwks.seed(issuer, keys);
    }

    let audit = AuditStore::open(":memory:").await.expect("open audit store");
    let key_store = KeyStore::open(key_store_path).expect("open key store");

    AppState {
        config: ServiceConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            allowed_issuers: vec![TEST_ISSUER.to_string()],
            expected_audience: TEST_AUDIENCE.to_string(),
            allowed_origins: vec![],
            default_key_id: "A1B2C3D4E5F60718".to_string(),
            key_passphrase: Secret::new("test-passphrase"),
            admin_token: Secret::new("admin-secret-token"),
            key_store_path: "unused-in-tests".to_string(),
            audit_db_path: ":memory:".to_string(),
            jwks_cache_ttl: Duration::from_secs(300),
            decrypted_key_cache_ttl: Duration::from_secs(300),
            fetch_timeout: Duration::from_secs(5),
        },
        jwks,
        rate_limiter: RateLimiter::new(),
        key_store,
        decrypted_cache: DecryptedKeyCache::new(Duration::from_secs(300)),
        audit: std::sync::Arc::new(audit),
        runtime: tokio::runtime::Handle::current(),
    }
}
