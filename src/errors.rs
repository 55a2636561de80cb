//! Error taxonomy for the signing service.
//!
//! Each component defines its own error enum and implements `Display` and
//! `std::error::Error` by hand. [`ApiError`] is the single place where a
//! component error is mapped onto an HTTP status and a stable `code` string;
//! every handler returns `Result<T, ApiError>` and only the response writer
//! touches wire format.

use std::fmt;

/// Stable error codes returned in the `code` field of an error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    AuthMissing,
    AuthInvalid,
    KeyNotFound,
    KeyProcessingError,
    KeyListError,
    KeyUploadError,
    KeyDeleteError,
    SignError,
    RateLimitError,
    RateLimited,
    InvalidRequest,
    AuditError,
    NotFound,
    InternalError,
    UnsupportedMediaType,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::AuthMissing => "AUTH_MISSING",
            ErrorCode::AuthInvalid => "AUTH_INVALID",
            ErrorCode::KeyNotFound => "KEY_NOT_FOUND",
            ErrorCode::KeyProcessingError => "KEY_PROCESSING_ERROR",
            ErrorCode::KeyListError => "KEY_LIST_ERROR",
            ErrorCode::KeyUploadError => "KEY_UPLOAD_ERROR",
            ErrorCode::KeyDeleteError => "KEY_DELETE_ERROR",
            ErrorCode::SignError => "SIGN_ERROR",
            ErrorCode::RateLimitError => "RATE_LIMIT_ERROR",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::AuditError => "AUDIT_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::UnsupportedMediaType => "UNSUPPORTED_MEDIA_TYPE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error returned by every request handler.
#[derive(Debug)]
pub struct ApiError {
    pub status: u16,
    pub code: ErrorCode,
    pub message: String,
    /// Seconds to wait before retrying; only populated for `RATE_LIMITED`.
    pub retry_after: Option<u64>,
}

impl ApiError {
    pub fn new(status: u16, code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            code,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        ApiError::new(400, ErrorCode::InvalidRequest, message)
    }

    pub fn auth_missing() -> Self {
        ApiError::new(401, ErrorCode::AuthMissing, "Authorization header missing")
    }

    pub fn auth_invalid(reason: impl Into<String>) -> Self {
        ApiError::new(401, ErrorCode::AuthInvalid, reason)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::new(404, ErrorCode::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(500, ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.status, self.message)
    }
}

impl std::error::Error for ApiError {}

/// SSRF policy violations (§4.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlGuardError {
    InvalidUrl(String),
    SchemeDenied(String),
    HostDenied(String),
}

impl fmt::Display for UrlGuardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlGuardError::InvalidUrl(u) => write!(f, "invalid URL: {u}"),
            UrlGuardError::SchemeDenied(s) => write!(f, "scheme not permitted: {s}"),
            UrlGuardError::HostDenied(h) => write!(f, "host denied by SSRF policy: {h}"),
        }
    }
}

impl std::error::Error for UrlGuardError {}

/// Outbound fetch failures (§4.2).
#[derive(Debug)]
pub enum FetchError {
    Guard(UrlGuardError),
    Timeout,
    Transport(String),
    BadStatus(u16),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Guard(e) => write!(f, "{e}"),
            FetchError::Timeout => write!(f, "request timed out"),
            FetchError::Transport(e) => write!(f, "transport error: {e}"),
            FetchError::BadStatus(code) => write!(f, "unexpected status {code}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<UrlGuardError> for FetchError {
    fn from(e: UrlGuardError) -> Self {
        FetchError::Guard(e)
    }
}

/// JWKS cache/refresh failures (§4.3).
#[derive(Debug)]
pub enum JwksError {
    Fetch(FetchError),
    Parse(String),
    KeyNotFound(String),
}

impl fmt::Display for JwksError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JwksError::Fetch(e) => write!(f, "{e}"),
            JwksError::Parse(e) => write!(f, "could not parse JWKS: {e}"),
            JwksError::KeyNotFound(kid) => write!(f, "no JWKS key for kid={kid}"),
        }
    }
}

impl std::error::Error for JwksError {}

impl From<FetchError> for JwksError {
    fn from(e: FetchError) -> Self {
        JwksError::Fetch(e)
    }
}

/// OIDC verification pipeline failures (§4.4). The variant names double as
/// the test-useful "reason" categories the spec requires without leaking
/// cryptographic detail to the client.
#[derive(Debug)]
pub enum OidcError {
    MalformedToken,
    AlgorithmNotAllowed(String),
    IssuerNotAllowed(String),
    TokenExpired,
    TokenNotYetValid,
    AudienceMismatch,
    KeyNotFound(String),
    InvalidSignature,
    Jwks(JwksError),
}

impl fmt::Display for OidcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OidcError::MalformedToken => write!(f, "Malformed token"),
            OidcError::AlgorithmNotAllowed(a) => write!(f, "Algorithm not allowed: {a}"),
            OidcError::IssuerNotAllowed(i) => write!(f, "Issuer not allowed: {i}"),
            OidcError::TokenExpired => write!(f, "Token expired"),
            OidcError::TokenNotYetValid => write!(f, "Token not yet valid"),
            OidcError::AudienceMismatch => write!(f, "Audience mismatch"),
            OidcError::KeyNotFound(kid) => write!(f, "Signing key not found: {kid}"),
            OidcError::InvalidSignature => write!(f, "Invalid token signature"),
            OidcError::Jwks(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for OidcError {}

impl From<JwksError> for OidcError {
    fn from(e: JwksError) -> Self {
        OidcError::Jwks(e)
    }
}

impl From<OidcError> for ApiError {
    fn from(e: OidcError) -> Self {
        ApiError::auth_invalid(e.to_string())
    }
}

/// Rate limiter failures (§4.6). `Unavailable` must always translate to a
/// fail-closed 503, never a silent allow.
#[derive(Debug)]
pub enum RateLimitError {
    Unavailable(String),
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitError::Unavailable(msg) => write!(f, "rate limiter unavailable: {msg}"),
        }
    }
}

impl std::error::Error for RateLimitError {}

impl From<RateLimitError> for ApiError {
    fn from(e: RateLimitError) -> Self {
        ApiError::new(503, ErrorCode::RateLimitError, e.to_string())
    }
}

/// Key store failures (§4.7).
#[derive(Debug)]
pub enum KeyStoreError {
    NotFound(String),
    InvalidKeyId(String),
    InvalidKeyMaterial(String),
    Io(String),
}

impl fmt::Display for KeyStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyStoreError::NotFound(id) => write!(f, "key not found: {id}"),
            KeyStoreError::InvalidKeyId(id) => write!(f, "invalid keyId: {id}"),
            KeyStoreError::InvalidKeyMaterial(msg) => write!(f, "invalid key material: {msg}"),
            KeyStoreError::Io(msg) => write!(f, "key store I/O error: {msg}"),
        }
    }
}

impl std::error::Error for KeyStoreError {}

impl From<KeyStoreError> for ApiError {
    fn from(e: KeyStoreError) -> Self {
        match e {
            KeyStoreError::NotFound(_) => ApiError::new(404, ErrorCode::KeyNotFound, e.to_string()),
            _ => ApiError::new(500, ErrorCode::KeyProcessingError, e.to_string()),
        }
    }
}

/// Signing failures (§4.9).
#[derive(Debug)]
pub enum SignError {
    ParseFailed(String),
    DecryptFailed(String),
    SignFailed(String),
}

impl fmt::Display for SignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignError::ParseFailed(e) => write!(f, "failed to parse key: {e}"),
            SignError::DecryptFailed(e) => write!(f, "failed to decrypt key: {e}"),
            SignError::SignFailed(e) => write!(f, "failed to sign: {e}"),
        }
    }
}

impl std::error::Error for SignError {}

impl From<SignError> for ApiError {
    fn from(e: SignError) -> Self {
        ApiError::new(500, ErrorCode::SignError, e.to_string())
    }
}

/// Audit writer/reader failures (§4.10). Write failures are logged and
/// swallowed by the caller; this type exists for the reader path and for
/// the writer's internal logging call site.
#[derive(Debug)]
pub enum AuditError {
    Query(String),
    InvalidFilter(String),
}

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditError::Query(e) => write!(f, "audit query failed: {e}"),
            AuditError::InvalidFilter(e) => write!(f, "invalid audit filter: {e}"),
        }
    }
}

impl std::error::Error for AuditError {}

impl From<AuditError> for ApiError {
    fn from(e: AuditError) -> Self {
        match &e {
            AuditError::InvalidFilter(_) => ApiError::invalid_request(e.to_string()),
            AuditError::Query(_) => ApiError::new(500, ErrorCode::AuditError, e.to_string()),
        }
    }
}
