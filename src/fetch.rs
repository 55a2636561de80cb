//! Single-attempt HTTPS GET with a caller-supplied deadline (§4.2).
//!
//! Redirects are disabled on the underlying client; if a future change
//! enables them, the final URL MUST be re-guarded before the body is read.

use crate::errors::FetchError;
use crate::url_guard;
use std::time::Duration;

pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

/// Fetch `url`, which MUST already have passed [`url_guard::guard`] or will
/// be guarded here if not already validated by the caller.
pub fn fetch_with_timeout(url: &str, timeout: Duration) -> Result<FetchResponse, FetchError> {
    url_guard::guard(url)?;

    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| FetchError::Transport(e.to_string()))?;

    let response = client.get(url).send().map_err(|e| {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Transport(e.to_string())
        }
    })?;

    let status = response.status().as_u16();
    if !(200..300).contains(&status) {
        return Err(FetchError::BadStatus(status));
    }

    let body = response
        .text()
        .map_err(|e| FetchError::Transport(e.to_string()))?;

    Ok(FetchResponse { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_urls_that_fail_the_guard() {
        let err = fetch_with_timeout("http://example.com", Duration::from_secs(1));
        assert!(matches!(err, Err(FetchError::Guard(_))));
    }
}
