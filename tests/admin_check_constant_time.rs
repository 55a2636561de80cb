//! Scenario 6 (§8): every invalid admin token, regardless of length or how
//! much of a prefix it shares with the real one, produces the exact same
//! 401 envelope through the dispatcher's admin auth path.

mod support;

use gpg_signing_service::dispatcher;
use gpg_signing_service::errors::ErrorCode;
use support::build_state;

#[tokio::test]
async fn admin_check_constant_time() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = build_state(dir.path().join("keys.json"), None).await;

    let real_token = "admin-secret-token";
    let candidates = [
        "",
        "a",
        "admin-secret-toke",
        "admin-secret-token-but-longer",
        "wrong-entirely",
        &"x".repeat(200),
    ];

    for candidate in candidates {
        assert_ne!(candidate, real_token);
        let err = dispatcher::authenticate_admin(&state, Some(&format!("Bearer {candidate}")))
            .expect_err("mismatched admin token must be rejected");
        assert_eq!(err.status, 401);
        assert_eq!(err.code, ErrorCode::AuthInvalid);
        assert_eq!(err.message, "Invalid admin token");
    }

    dispatcher::authenticate_admin(&state, Some(&format!("Bearer {real_token}")))
        .expect("matching admin token is accepted");
}
