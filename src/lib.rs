//! # gpg-signing-service
//!
//! A centralized GPG/PGP signing service for CI/CD pipelines. Pipeline
//! workers authenticate with a short-lived OIDC token, hand over data to
//! sign, and get back a detached signature produced by a private key the
//! service holds on their behalf — callers never see key material.
//!
//! ## Request flow
//!
//! 1. [`oidc`] verifies the bearer token against an issuer's JWKS (fetched
//!    and cached by [`jwks`], with [`url_guard`]/[`fetch`] hardening every
//!    outbound lookup against SSRF).
//! 2. [`rate_limiter`] applies a per-identity token bucket.
//! 3. [`key_store`] resolves the requested key id to its armored private
//!    key; [`decrypted_cache`] holds the unlocked key material for a short
//!    TTL so repeat signs don't re-run the passphrase unlock.
//! 4. [`signer`] produces the detached signature with the `pgp` crate.
//! 5. [`audit`] records the outcome in an append-only SQLite log.
//!
//! [`dispatcher`] wires these together per endpoint; [`server`] is the
//! HTTP listener that calls into it. [`admin_auth`] guards the
//! `/admin/*` routes with a constant-time token comparison.
//!
//! ## Modules
//!
//! - **[`config`]** - environment-driven service configuration
//! - **[`logging`]** - `tracing` subscriber setup
//! - **[`errors`]** - per-component error types and the API error envelope
//! - **[`ids`]** - request id and audit id types
//! - **[`url_guard`]** - SSRF-hardened URL validation
//! - **[`fetch`]** - timeout-bounded HTTP GET used by the JWKS fetcher
//! - **[`jwks`]** - JWKS caching and rotation-aware refresh
//! - **[`oidc`]** - bearer token verification pipeline
//! - **[`admin_auth`]** - constant-time admin token check
//! - **[`rate_limiter`]** - per-identity token bucket
//! - **[`key_store`]** - durable armored-key storage
//! - **[`decrypted_cache`]** - TTL cache for unlocked key material
//! - **[`signer`]** - PGP parsing, unlocking, and signing
//! - **[`audit`]** - append-only audit log and query builder
//! - **[`dispatcher`]** - per-endpoint request handling, tying the above together
//! - **[`middleware`]** - security headers and CORS
//! - **[`server`]** - the `tiny_http`-based listener and route table

pub mod admin_auth;
pub mod audit;
pub mod config;
pub mod decrypted_cache;
pub mod dispatcher;
pub mod errors;
pub mod fetch;
pub mod ids;
pub mod jwks;
pub mod key_store;
pub mod logging;
pub mod middleware;
pub mod oidc;
pub mod rate_limiter;
pub mod server;
pub mod signer;
pub mod url_guard;
