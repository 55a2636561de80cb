//! The fixed global security headers every response carries (§6).

pub const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("X-Content-Type-Options", "nosniff"),
    ("X-Frame-Options", "DENY"),
    ("Referrer-Policy", "strict-origin-when-cross-origin"),
    (
        "Content-Security-Policy",
        "default-src 'none'; frame-ancestors 'none'",
    ),
    (
        "Permissions-Policy",
        "geolocation=(), microphone=(), camera=()",
    ),
    (
        "Strict-Transport-Security",
        "max-age=31536000; includeSubDomains; preload",
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_all_six_documented_headers() {
        assert_eq!(SECURITY_HEADERS.len(), 6);
    }
}
