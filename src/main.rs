use gpg_signing_service::config::ServiceConfig;
use gpg_signing_service::decrypted_cache::DecryptedKeyCache;
use gpg_signing_service::dispatcher::AppState;
use gpg_signing_service::jwks::JwksCache;
use gpg_signing_service::key_store::KeyStore;
use gpg_signing_service::logging;
use gpg_signing_service::rate_limiter::RateLimiter;
use gpg_signing_service::{audit::AuditStore, server};
use std::io;
use std::sync::Arc;

fn main() -> io::Result<()> {
    let _tracing_guard = logging::init();

    let config = ServiceConfig::from_env().map_err(io::Error::other)?;

    let runtime = tokio::runtime::Runtime::new()?;
    let audit = runtime
        .block_on(AuditStore::open(&config.audit_db_path))
        .map_err(|e| io::Error::other(e.to_string()))?;

    let key_store = KeyStore::open(&config.key_store_path).map_err(|e| io::Error::other(e.to_string()))?;

    let state = Arc::new(AppState {
        jwks: JwksCache::new(config.jwks_cache_ttl, config.fetch_timeout),
        rate_limiter: RateLimiter::new(),
        key_store,
        decrypted_cache: DecryptedKeyCache::new(config.decrypted_key_cache_ttl),
        audit: Arc::new(audit),
        runtime: runtime.handle().clone(),
        config,
    });

    install_shutdown_handler();

    server::run(state)
}

#[cfg(unix)]
fn install_shutdown_handler() {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let Ok(mut signals) = Signals::new([SIGINT, SIGTERM]) else {
        tracing::warn!("failed to install signal handler");
        return;
    };
    std::thread::spawn(move || {
        if signals.forever().next().is_some() {
            tracing::info!("received shutdown signal");
            std::process::exit(0);
        }
    });
}

#[cfg(not(unix))]
fn install_shutdown_handler() {}
