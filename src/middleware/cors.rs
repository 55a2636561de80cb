//! CORS origin allow-listing (§6). Only origins present in
//! `ALLOWED_ORIGINS` receive `Access-Control-Allow-Origin`; everything else
//! gets no CORS headers at all (the browser then enforces same-origin).

/// Returns the `Access-Control-Allow-*` headers to attach, or an empty
/// vector if `origin` isn't in the allow-list (or no `Origin` header was
/// sent).
pub fn cors_headers_for(origin: Option<&str>, allowed_origins: &[String]) -> Vec<(String, String)> {
    let Some(origin) = origin else {
        return Vec::new();
    };
    if !allowed_origins.iter().any(|allowed| allowed == origin) {
        return Vec::new();
    }

    vec![
        ("Access-Control-Allow-Origin".to_string(), origin.to_string()),
        ("Access-Control-Allow-Methods".to_string(), "GET, POST, DELETE, OPTIONS".to_string()),
        ("Access-Control-Allow-Headers".to_string(), "Authorization, Content-Type, X-Request-ID".to_string()),
        ("Vary".to_string(), "Origin".to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_origin_gets_headers() {
        let allowed = vec!["https://ci.example".to_string()];
        let headers = cors_headers_for(Some("https://ci.example"), &allowed);
        assert!(headers.iter().any(|(k, v)| k == "Access-Control-Allow-Origin" && v == "https://ci.example"));
    }

    #[test]
    fn disallowed_origin_gets_nothing() {
        let allowed = vec!["https://ci.example".to_string()];
        let headers = cors_headers_for(Some("https://evil.example"), &allowed);
        assert!(headers.is_empty());
    }

    #[test]
    fn no_origin_header_gets_nothing() {
        let allowed = vec!["https://ci.example".to_string()];
        assert!(cors_headers_for(None, &allowed).is_empty());
    }
}
