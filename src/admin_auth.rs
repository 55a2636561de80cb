//! Constant-time admin credential check (§4.5).
//!
//! Both sequences are zero-padded to equal length before comparison so the
//! comparison itself never short-circuits on length, and the length check
//! is AND-combined with the byte comparison rather than performed (and
//! potentially early-returned) first.

use subtle::ConstantTimeEq;

pub fn check_admin_token(presented: &str, configured: &str) -> bool {
    let presented = presented.as_bytes();
    let configured = configured.as_bytes();
    let max_len = presented.len().max(configured.len());

    let mut a = vec![0u8; max_len];
    let mut b = vec![0u8; max_len];
    a[..presented.len()].copy_from_slice(presented);
    b[..configured.len()].copy_from_slice(configured);

    let lengths_equal = (presented.len() as u64).ct_eq(&(configured.len() as u64));
    let bytes_equal = a.ct_eq(&b);

    bool::from(lengths_equal & bytes_equal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_matching_token() {
        assert!(check_admin_token("secret-token", "secret-token"));
    }

    #[test]
    fn rejects_mismatched_token() {
        assert!(!check_admin_token("wrong", "secret-token"));
    }

    #[test]
    fn rejects_different_length_tokens() {
        assert!(!check_admin_token("secret-token-but-longer", "secret-token"));
        assert!(!check_admin_token("short", "secret-token"));
    }

    #[test]
    fn rejects_empty_against_configured() {
        assert!(!check_admin_token("", "secret-token"));
    }

    #[test]
    fn two_empty_strings_are_equal() {
        assert!(check_admin_token("", ""));
    }
}
