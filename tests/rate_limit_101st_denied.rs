//! Scenario 4 (§8): the 101st sign request within the window for the same
//! identity is denied with 429 and `retryAfter >= 1`. The first 100 are
//! consumed directly against the limiter (exercising the same state
//! `handle_sign` reads) so the test doesn't pay for 100 real PGP signs;
//! the 101st goes through `handle_sign` itself to cover the denial ->
//! `ApiError` mapping and the RATE_LIMITED audit row it writes.

mod support;

use gpg_signing_service::dispatcher;
use gpg_signing_service::errors::ErrorCode;
use gpg_signing_service::ids::RequestId;
use gpg_signing_service::oidc::Identity;
use support::build_state;

#[tokio::test]
async fn rate_limit_101st_denied() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = build_state(dir.path().join("keys.json"), None).await;
    let identity = Identity(format!("{}:repo:o/r", support::TEST_ISSUER));

    for i in 0..100 {
        let result = state.rate_limiter.consume(&identity.0).expect("consume succeeds");
        assert!(result.is_allowed(), "request {i} should be allowed");
    }

    let err = dispatcher::handle_sign(
        &state,
        RequestId::new(),
        &identity,
        support::TEST_ISSUER,
        Some("A1B2C3D4E5F60718"),
        b"some commit bytes",
    )
    .expect_err("101st request must be denied");

    assert_eq!(err.status, 429);
    assert_eq!(err.code, ErrorCode::RateLimited);
    assert!(err.retry_after.unwrap_or(0) >= 1);

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let rows = state
        .audit
        .query(gpg_signing_service::audit::AuditFilter::default())
        .await
        .expect("audit query succeeds");
    assert!(
        rows.iter().any(|r| r.key_id == "A1B2C3D4E5F60718" && r.error_code.as_deref() == Some("RATE_LIMITED")),
        "expected a RATE_LIMITED audit row"
    );
}
