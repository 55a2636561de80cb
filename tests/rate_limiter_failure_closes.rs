//! Scenario 5 (§8): when the rate limiter itself is unavailable, the
//! dispatcher must fail closed with 503 `RATE_LIMIT_ERROR`, never a silent
//! allow. The in-memory `DashMap`-backed limiter in this implementation has
//! no failure mode to trigger for real (it never returns `Err`), so this
//! test exercises the fail-closed contract at the one seam that matters:
//! the `RateLimitError -> ApiError` mapping `handle_sign` relies on via
//! `rate_result.map_err(ApiError::from)?` before it ever reaches the audit
//! writer.

use gpg_signing_service::errors::{ApiError, ErrorCode, RateLimitError};

#[test]
fn rate_limiter_failure_closes() {
    let err: ApiError = RateLimitError::Unavailable("backing store unreachable".to_string()).into();

    assert_eq!(err.status, 503);
    assert_eq!(err.code, ErrorCode::RateLimitError);
    assert!(err.retry_after.is_none());
}
