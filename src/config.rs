//! Process configuration, loaded once from the environment at startup.
//!
//! Mirrors the shape of the teacher's `RuntimeConfig::from_env()`: plain
//! env-var reads with documented defaults, `anyhow::Context` on values that
//! are present but malformed. No config-file format is supported — this
//! service's configuration surface is small enough that env vars are enough.

use anyhow::{Context, Result};
use std::fmt;
use std::time::Duration;

/// Secret value whose `Debug` impl never prints the contents.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub allowed_issuers: Vec<String>,
    pub expected_audience: String,
    pub allowed_origins: Vec<String>,
    pub default_key_id: String,
    pub key_passphrase: Secret,
    pub admin_token: Secret,
    pub key_store_path: String,
    pub audit_db_path: String,
    pub jwks_cache_ttl: Duration,
    pub decrypted_key_cache_ttl: Duration,
    pub fetch_timeout: Duration,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        let allowed_issuers = env_var("ALLOWED_ISSUERS")
            .context("ALLOWED_ISSUERS must be set (comma-separated OIDC issuer URLs)")
            .map(|v| split_csv(&v))?;
        if allowed_issuers.is_empty() {
            anyhow::bail!("ALLOWED_ISSUERS must contain at least one issuer");
        }

        let key_passphrase = env_var("KEY_PASSPHRASE")
            .context("KEY_PASSPHRASE must be set")
            .map(Secret)?;
        let admin_token = env_var("ADMIN_TOKEN")
            .context("ADMIN_TOKEN must be set")
            .map(Secret)?;

        let jwks_cache_ttl = parse_secs_env("JWKS_CACHE_TTL_SECS", 300)?;
        let decrypted_key_cache_ttl = parse_secs_env("DECRYPTED_KEY_CACHE_TTL_SECS", 300)?;
        let fetch_timeout = parse_secs_env("FETCH_TIMEOUT_SECS", 10)?;

        Ok(ServiceConfig {
            bind_addr: env_var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            allowed_issuers,
            expected_audience: env_var("EXPECTED_AUDIENCE")
                .unwrap_or_else(|| "gpg-signing-service".to_string()),
            allowed_origins: env_var("ALLOWED_ORIGINS")
                .map(|v| split_csv(&v))
                .unwrap_or_default(),
            default_key_id: env_var("KEY_ID").unwrap_or_else(|| "keyId".to_string()),
            key_passphrase,
            admin_token,
            key_store_path: env_var("KEY_STORE_PATH")
                .unwrap_or_else(|| "./data/keys.json".to_string()),
            audit_db_path: env_var("AUDIT_DB_PATH").unwrap_or_else(|| "./data/audit.db".to_string()),
            jwks_cache_ttl,
            decrypted_key_cache_ttl,
            fetch_timeout,
        })
    }
}

fn parse_secs_env(name: &str, default: u64) -> Result<Duration> {
    match env_var(name) {
        None => Ok(Duration::from_secs(default)),
        Some(v) => v
            .parse::<u64>()
            .map(Duration::from_secs)
            .with_context(|| format!("{name} must be a non-negative integer, got {v:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_debug_is_redacted() {
        let s = Secret("super-secret".to_string());
        assert_eq!(format!("{s:?}"), "Secret(***)");
    }

    #[test]
    fn split_csv_trims_and_drops_empties() {
        assert_eq!(
            split_csv(" a, b ,,c"),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }
}
