//! Cross-cutting response concerns applied to every route: the fixed
//! security headers, CORS origin-allow-listing, and request-id echo (§6).
//!
//! Kept as small free functions rather than a `before`/`after` trait object
//! chain: this service has eight fixed routes, not a dynamically registered
//! handler table, so the indirection a `Middleware` trait buys the router
//! isn't needed here — the dispatcher calls these directly around each
//! handler invocation.

pub mod cors;
pub mod security_headers;

pub use cors::cors_headers_for;
pub use security_headers::SECURITY_HEADERS;
