//! The OIDC verification pipeline (§4.4) — the service's central state
//! machine. Every Bearer token passes through [`verify`] in the exact order
//! the spec lists; any step's failure yields a specific [`OidcError`]
//! variant without leaking cryptographic detail to the client (the HTTP
//! layer maps every variant onto a generic 401).

use crate::errors::OidcError;
use crate::jwks::{Jwk, JwksCache};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

const ALLOWED_ALGORITHMS: &[&str] = &["RS256", "RS384", "RS512", "ES256", "ES384"];
const CLOCK_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn contains(&self, expected: &str) -> bool {
        match self {
            Audience::One(a) => a == expected,
            Audience::Many(list) => list.iter().any(|a| a == expected),
        }
    }
}

/// Transient per-request claims, before the verification pipeline runs.
#[derive(Debug, Clone, Deserialize)]
pub struct OidcClaims {
    pub iss: String,
    pub sub: String,
    pub aud: Audience,
    pub exp: i64,
    pub iat: Option<i64>,
    pub nbf: Option<i64>,
}

/// Nominal refinement of [`OidcClaims`] produced only once every pipeline
/// step has passed.
#[derive(Debug, Clone)]
pub struct ValidatedOidcClaims {
    pub claims: OidcClaims,
    pub identity: Identity,
}

/// The `iss:sub` correlation key used for rate limiting and audit rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(pub String);

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

struct DecodedHeader {
    alg: String,
    kid: Option<String>,
}

fn decode_segment(segment: &str) -> Result<Value, OidcError> {
    if segment.is_empty() {
        return Err(OidcError::MalformedToken);
    }
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| OidcError::MalformedToken)?;
    serde_json::from_slice(&bytes).map_err(|_| OidcError::MalformedToken)
}

fn shape_check(token: &str) -> Result<(DecodedHeader, OidcClaims), OidcError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(OidcError::MalformedToken);
    }

    let header_value = decode_segment(parts[0])?;
    let alg = header_value
        .get("alg")
        .and_then(Value::as_str)
        .ok_or(OidcError::MalformedToken)?
        .to_string();
    let kid = header_value
        .get("kid")
        .and_then(Value::as_str)
        .map(str::to_string);

    let payload_value = decode_segment(parts[1])?;
    let claims: OidcClaims =
        serde_json::from_value(payload_value).map_err(|_| OidcError::MalformedToken)?;

    Ok((DecodedHeader { alg, kid }, claims))
}

/// Run the full §4.4 pipeline over a raw `Bearer` token.
pub fn verify(
    token: &str,
    allowed_issuers: &[String],
    expected_audience: &str,
    jwks: &JwksCache,
) -> Result<ValidatedOidcClaims, OidcError> {
    // Step 1: shape.
    let (header, claims) = shape_check(token)?;

    // Step 2: algorithm whitelist.
    if !ALLOWED_ALGORITHMS.contains(&header.alg.as_str()) {
        return Err(OidcError::AlgorithmNotAllowed(header.alg));
    }

    // Step 3: issuer allow-list.
    if !allowed_issuers.iter().any(|iss| iss == &claims.iss) {
        return Err(OidcError::IssuerNotAllowed(claims.iss));
    }

    // Step 4: timing, 60s skew.
    let t = now();
    if let Some(nbf) = claims.nbf {
        if nbf > t + CLOCK_SKEW_SECS {
            return Err(OidcError::TokenNotYetValid);
        }
    }
    if claims.exp < t - CLOCK_SKEW_SECS {
        return Err(OidcError::TokenExpired);
    }

    // Step 5: audience.
    if !claims.aud.contains(expected_audience) {
        return Err(OidcError::AudienceMismatch);
    }

    // Step 6: key resolution (forces refresh on rotation-miss if kid absent
    // from the cached set).
    let jwk = jwks.lookup(&claims.iss, header.kid.as_deref())?;

    // Step 7: cryptographic verification.
    verify_signature(token, &header.alg, &jwk)?;

    // Step 8: identity.
    let identity = Identity(format!("{}:{}", claims.iss, claims.sub));
    Ok(ValidatedOidcClaims { claims, identity })
}

fn verify_signature(token: &str, alg: &str, jwk: &Jwk) -> Result<(), OidcError> {
    let algorithm = match alg {
        "RS256" => Algorithm::RS256,
        "RS384" => Algorithm::RS384,
        "RS512" => Algorithm::RS512,
        "ES256" => Algorithm::ES256,
        "ES384" => Algorithm::ES384,
        other => return Err(OidcError::AlgorithmNotAllowed(other.to_string())),
    };

    let decoding_key = match jwk {
        Jwk::Rsa { n, e, .. } => DecodingKey::from_rsa_components(n, e)
            .map_err(|_| OidcError::InvalidSignature)?,
        Jwk::Ec { x, y, .. } => {
            DecodingKey::from_ec_components(x, y).map_err(|_| OidcError::InvalidSignature)?
        }
        Jwk::Unsupported => return Err(OidcError::InvalidSignature),
    };

    let mut validation = Validation::new(algorithm);
    // Steps 2-5 already ran by hand above with this service's own skew and
    // allow-list rules; disable jsonwebtoken's own claim validation so it
    // only does what step 7 asks of it: the cryptographic check.
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.required_spec_claims.clear();
    validation.insecure_disable_signature_validation = false;

    jsonwebtoken::decode::<Value>(token, &decoding_key, &validation)
        .map(|_| ())
        .map_err(|_| OidcError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_shape() {
        let allowed = vec!["https://issuer.example".to_string()];
        let jwks = JwksCache::new(std::time::Duration::from_secs(300), std::time::Duration::from_secs(10));
        let err = verify("not-a-jwt", &allowed, "aud", &jwks).unwrap_err();
        assert!(matches!(err, OidcError::MalformedToken));
    }

    #[test]
    fn audience_matches_string_or_array() {
        assert!(Audience::One("a".into()).contains("a"));
        assert!(!Audience::One("a".into()).contains("b"));
        assert!(Audience::Many(vec!["a".into(), "b".into()]).contains("b"));
        assert!(!Audience::Many(vec!["a".into()]).contains("b"));
    }

    #[test]
    fn identity_is_iss_colon_sub() {
        let id = Identity(format!("{}:{}", "https://issuer.example", "repo:o/r"));
        assert_eq!(id.0, "https://issuer.example:repo:o/r");
    }
}
