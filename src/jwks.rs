//! Issuer → key-set cache with rotation-aware refresh (§4.3).
//!
//! Entries live for [`JWKS_DEFAULT_TTL`]; a lookup that misses the cached
//! `kid` (rotation-miss) triggers a refetch even if the entry hasn't
//! expired yet, since clients legitimately present a new `kid` before the
//! issuer's previous key set ages out of the cache.

use crate::errors::{FetchError, JwksError};
use crate::fetch::fetch_with_timeout;
use crate::url_guard;
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const JWKS_DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kty")]
pub enum Jwk {
    #[serde(rename = "RSA")]
    Rsa {
        kid: Option<String>,
        #[serde(rename = "use")]
        use_: Option<String>,
        n: String,
        e: String,
    },
    #[serde(rename = "EC")]
    Ec {
        kid: Option<String>,
        #[serde(rename = "use")]
        use_: Option<String>,
        crv: String,
        x: String,
        y: String,
    },
    /// Any key type this service doesn't need to verify (e.g. `oct`),
    /// retained so a JWKS document with mixed key types still parses.
    #[serde(other)]
    Unsupported,
}

impl Jwk {
    pub fn kid(&self) -> Option<&str> {
        match self {
            Jwk::Rsa { kid, .. } | Jwk::Ec { kid, .. } => kid.as_deref(),
            Jwk::Unsupported => None,
        }
    }

    pub fn use_is_sig_or_absent(&self) -> bool {
        match self {
            Jwk::Rsa { use_, .. } | Jwk::Ec { use_, .. } => {
                use_.as_deref().map(|u| u == "sig").unwrap_or(true)
            }
            Jwk::Unsupported => true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct OidcDiscoveryDocument {
    jwks_uri: String,
}

struct CacheEntry {
    keys: Vec<Jwk>,
    fetched_at: Instant,
}

pub struct JwksCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    fetch_timeout: Duration,
    refreshing: DashMap<String, Arc<AtomicBool>>,
}

impl JwksCache {
    pub fn new(ttl: Duration, fetch_timeout: Duration) -> Self {
        JwksCache {
            entries: DashMap::new(),
            ttl,
            fetch_timeout,
            refreshing: DashMap::new(),
        }
    }

    /// Resolve a JWK for `issuer`/`expected_kid`. `expected_kid` is `None`
    /// only when the token carried no `kid`, in which case a present cache
    /// entry is returned as-is without forcing a refetch (§9 open question).
    pub fn lookup(&self, issuer: &str, expected_kid: Option<&str>) -> Result<Jwk, JwksError> {
        if let Some(entry) = self.entries.get(issuer) {
            let fresh = entry.fetched_at.elapsed() < self.ttl;
            let satisfies = match expected_kid {
                Some(kid) => entry.keys.iter().any(|k| k.kid() == Some(kid)),
                None => true,
            };
            if fresh && satisfies {
                return self.resolve_from(&entry.keys, expected_kid);
            }
        }

        let keys = self.refresh(issuer)?;
        self.resolve_from(&keys, expected_kid)
    }

    fn resolve_from(&self, keys: &[Jwk], expected_kid: Option<&str>) -> Result<Jwk, JwksError> {
        let kid = expected_kid.ok_or_else(|| JwksError::KeyNotFound("<none>".to_string()))?;
        keys.iter()
            .find(|k| k.kid() == Some(kid) && k.use_is_sig_or_absent())
            .cloned()
            .ok_or_else(|| JwksError::KeyNotFound(kid.to_string()))
    }

    fn refresh(&self, issuer: &str) -> Result<Vec<Jwk>, JwksError> {
        let flag = self
            .refreshing
            .entry(issuer.to_string())
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone();

        // Debounce concurrent refreshes for the same issuer; this is a
        // best-effort optimization, not a correctness requirement (§5).
        if flag.swap(true, Ordering::SeqCst) {
            if let Some(entry) = self.entries.get(issuer) {
                return Ok(entry.keys.clone());
            }
        }

        let result = self.fetch_and_parse(issuer);
        flag.store(false, Ordering::SeqCst);

        let keys = result?;
        self.entries.insert(
            issuer.to_string(),
            CacheEntry {
                keys: keys.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(keys)
    }

    /// Seed a cache entry directly, bypassing the network fetch. Used by
    /// integration tests to exercise rotation-miss behavior without a real
    /// HTTPS endpoint — `guard` (§4.1) would reject a loopback test server
    /// anyway, so rotation is tested at the cache layer instead.
    pub fn seed(&self, issuer: &str, keys: Vec<Jwk>) {
        self.entries.insert(
            issuer.to_string(),
            CacheEntry {
                keys,
                fetched_at: Instant::now(),
            },
        );
    }

    fn fetch_and_parse(&self, issuer: &str) -> Result<Vec<Jwk>, JwksError> {
        let discovery_url = format!("{}/.well-known/openid-configuration", issuer.trim_end_matches('/'));
        url_guard::guard(&discovery_url).map_err(FetchError::from)?;
        let discovery = fetch_with_timeout(&discovery_url, self.fetch_timeout)?;
        let doc: OidcDiscoveryDocument = serde_json::from_str(&discovery.body)
            .map_err(|e| JwksError::Parse(format!("openid-configuration: {e}")))?;

        url_guard::guard(&doc.jwks_uri).map_err(FetchError::from)?;
        let jwks_response = fetch_with_timeout(&doc.jwks_uri, self.fetch_timeout)?;
        let jwks: JwksDocument = serde_json::from_str(&jwks_response.body)
            .map_err(|e| JwksError::Parse(format!("jwks document: {e}")))?;

        Ok(jwks.keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwk_use_sig_or_absent() {
        let rsa_sig = Jwk::Rsa {
            kid: Some("k1".into()),
            use_: Some("sig".into()),
            n: "n".into(),
            e: "AQAB".into(),
        };
        assert!(rsa_sig.use_is_sig_or_absent());

        let rsa_enc = Jwk::Rsa {
            kid: Some("k2".into()),
            use_: Some("enc".into()),
            n: "n".into(),
            e: "AQAB".into(),
        };
        assert!(!rsa_enc.use_is_sig_or_absent());

        let rsa_absent = Jwk::Rsa {
            kid: Some("k3".into()),
            use_: None,
            n: "n".into(),
            e: "AQAB".into(),
        };
        assert!(rsa_absent.use_is_sig_or_absent());
    }

    #[test]
    fn parses_mixed_key_types_without_failing() {
        let doc = r#"{"keys":[
            {"kty":"oct","k":"abc"},
            {"kty":"RSA","kid":"k1","use":"sig","n":"n","e":"AQAB"}
        ]}"#;
        let parsed: JwksDocument = serde_json::from_str(doc).expect("valid JWKS");
        assert_eq!(parsed.keys.len(), 2);
        assert_eq!(parsed.keys[1].kid(), Some("k1"));
    }
}
