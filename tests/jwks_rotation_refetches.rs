//! Scenario 3 (§8): a rotation-miss (token presents a `kid` absent from the
//! cached set) must trigger a refresh rather than silently trusting the
//! stale cache. A real second fetch isn't exercised here: the SSRF guard
//! (§4.1) rejects any loopback address a same-process mock server could
//! bind to, by design, so this test asserts on the one thing it safely
//! can — that a rotation-miss actually attempts a refetch (observed via the
//! refetch failing against an unreachable test issuer) instead of resolving
//! straight from the stale, non-matching cached set.

mod support;

use gpg_signing_service::errors::JwksError;
use gpg_signing_service::jwks::JwksCache;
use std::time::Duration;
use support::generate_rsa_key;

#[test]
fn jwks_rotation_refetches() {
    let jwks = JwksCache::new(Duration::from_secs(300), Duration::from_millis(200));

    let stale_key = generate_rsa_key("K1");
    let issuer = "https://unreachable-issuer.invalid";
    jwks.seed(issuer, vec![stale_key.jwk.clone()]);

    // K1 is present and the entry is fresh: resolves straight from cache,
    // no refetch needed.
    let resolved = jwks.lookup(issuer, Some("K1")).expect("cached kid resolves without a refetch");
    assert_eq!(resolved.kid(), Some("K1"));

    // K2 is absent from the cached set even though the entry hasn't
    // expired: lookup must attempt a refresh rather than reporting
    // "not found" from the stale set directly. Since this issuer can't
    // really be reached, the refresh itself fails — but that failure mode
    // (a fetch error) is the signal that a refetch was attempted at all.
    let err = jwks.lookup(issuer, Some("K2")).expect_err("rotation-miss must attempt a refetch");
    assert!(matches!(err, JwksError::Fetch(_)), "expected a fetch attempt, got {err:?}");
}
