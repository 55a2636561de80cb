//! Parse/decrypt/sign/armor operations, with decrypted-key cache
//! integration (§4.9).

use crate::decrypted_cache::DecryptedKeyCache;
use crate::errors::SignError;
use crate::key_store::StoredKey;
use pgp::composed::{
    Deserializable, SignedPublicKey, SignedSecretKey, StandaloneSignature,
};
use pgp::crypto::hash::HashAlgorithm;
use pgp::types::{KeyTrait, SecretKeyTrait};
use std::io::Cursor;
use std::sync::Arc;

pub type KeyCache = DecryptedKeyCache<Arc<SignedSecretKey>>;

#[derive(Debug, Clone)]
pub struct ParsedKeyInfo {
    pub key_id: String,
    pub fingerprint: String,
    pub algorithm: String,
    pub user_id: String,
}

#[derive(Debug, Clone)]
pub struct SignResult {
    pub signature: String,
    pub key_id: String,
    pub algorithm: String,
    pub fingerprint: String,
}

/// Maps an OpenPGP public-key algorithm tag onto the human-readable
/// strings the data model uses (§3 `StoredKey.algorithm`), per RFC 4880
/// §9.1.
pub fn algorithm_name(algo: pgp::crypto::public_key::PublicKeyAlgorithm) -> String {
    use pgp::crypto::public_key::PublicKeyAlgorithm as A;
    match algo {
        A::RSA => "RSA".to_string(),
        A::RSAEncrypt => "RSA-E".to_string(),
        A::RSASign => "RSA-S".to_string(),
        A::ElgamalEncrypt | A::Elgamal => "Elgamal".to_string(),
        A::DSA => "DSA".to_string(),
        A::ECDH => "ECDH".to_string(),
        A::ECDSA => "ECDSA".to_string(),
        A::EdDSA | A::EdDSALegacy => "EdDSA".to_string(),
        other => format!("Unknown({})", other as u8),
    }
}

fn key_id_hex(key: &SignedSecretKey) -> String {
    hex::encode_upper(key.key_id().as_ref())
}

fn fingerprint_hex(key: &SignedSecretKey) -> String {
    hex::encode_upper(key.fingerprint())
}

/// Parse an armored private key and, if `passphrase` is provided and the
/// key is encrypted, decrypt it in place. Extracts the metadata the key
/// store and admin-upload flow need.
pub fn parse_and_validate(
    armored_key: &str,
    passphrase: Option<&str>,
) -> Result<(SignedSecretKey, ParsedKeyInfo), SignError> {
    let (key, _headers) = SignedSecretKey::from_armor_single(Cursor::new(armored_key))
        .map_err(|e| SignError::ParseFailed(e.to_string()))?;

    key.verify()
        .map_err(|e| SignError::ParseFailed(e.to_string()))?;

    if key.primary_key.is_encrypted() {
        if let Some(pw) = passphrase {
            key.unlock(|| pw.to_string(), |_| Ok(()))
                .map_err(|e| SignError::DecryptFailed(e.to_string()))?;
        }
    }

    let user_id = key
        .details
        .users
        .first()
        .map(|u| u.id.id().to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    let info = ParsedKeyInfo {
        key_id: key_id_hex(&key),
        fingerprint: fingerprint_hex(&key),
        algorithm: algorithm_name(key.primary_key.algorithm()),
        user_id,
    };

    Ok((key, info))
}

/// Parse an armored private key and emit its corresponding armored public
/// key. Does not require decryption.
pub fn extract_public(armored_private: &str) -> Result<String, SignError> {
    let (key, _headers) = SignedSecretKey::from_armor_single(Cursor::new(armored_private))
        .map_err(|e| SignError::ParseFailed(e.to_string()))?;
    let public: SignedPublicKey = key.public_key().sign(&key, || String::new())
        .map_err(|e| SignError::ParseFailed(e.to_string()))?;
    public
        .to_armored_string(None)
        .map_err(|e| SignError::ParseFailed(e.to_string()))
}

fn decrypt_key(stored: &StoredKey, passphrase: &str) -> Result<SignedSecretKey, SignError> {
    let (key, _) = parse_and_validate(&stored.armored_private_key, Some(passphrase))?;
    Ok(key)
}

/// Produce a detached, ASCII-armored signature over `commit_data`.
pub fn sign(
    commit_data: &[u8],
    stored: &StoredKey,
    passphrase: &str,
    cache: &KeyCache,
) -> Result<SignResult, SignError> {
    let decrypted = match cache.get(&stored.key_id) {
        Some(key) => key,
        None => {
            let key = decrypt_key(stored, passphrase)?;
            let key = Arc::new(key);
            cache.set(&stored.key_id, key.clone());
            key
        }
    };

    let signature = decrypted
        .create_signature(|| String::new(), HashAlgorithm::SHA2_256, commit_data)
        .map_err(|e| SignError::SignFailed(e.to_string()))?;

    let standalone = StandaloneSignature::new(signature);
    let armored = standalone
        .to_armored_string(None)
        .map_err(|e| SignError::SignFailed(e.to_string()))?;

    Ok(SignResult {
        signature: armored,
        key_id: stored.key_id.clone(),
        algorithm: stored.algorithm.clone(),
        fingerprint: stored.fingerprint.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_name_maps_known_tags() {
        use pgp::crypto::public_key::PublicKeyAlgorithm as A;
        assert_eq!(algorithm_name(A::RSA), "RSA");
        assert_eq!(algorithm_name(A::EdDSA), "EdDSA");
        assert_eq!(algorithm_name(A::ECDSA), "ECDSA");
    }

    #[test]
    fn parse_rejects_garbage_armor() {
        let err = parse_and_validate("not an armored key", None).unwrap_err();
        assert!(matches!(err, SignError::ParseFailed(_)));
    }
}
