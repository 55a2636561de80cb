//! SSRF policy on outbound URLs (§4.1). Every URL the service fetches —
//! `.well-known/openid-configuration`, a `jwks_uri` — passes through
//! [`guard`] first.
//!
//! DNS resolution is intentionally not performed here; this guard defends
//! only against literal-IP abuse (the metadata-service SSRF pattern), not
//! against a hostname that resolves to a private address at request time.

use crate::errors::UrlGuardError;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

const DENIED_HOSTNAMES: &[&str] = &["169.254.169.254", "metadata.google.internal"];

static LITERAL_IPV4: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,3}\.){3}\d{1,3}$").expect("static regex is valid"));

/// Validate a URL against the SSRF policy; returns the parsed [`Url`] on
/// success so callers don't re-parse it.
pub fn guard(raw: &str) -> Result<Url, UrlGuardError> {
    let url = Url::parse(raw).map_err(|_| UrlGuardError::InvalidUrl(raw.to_string()))?;

    if url.scheme() != "https" {
        return Err(UrlGuardError::SchemeDenied(url.scheme().to_string()));
    }

    let host = url
        .host_str()
        .ok_or_else(|| UrlGuardError::InvalidUrl(raw.to_string()))?;

    check_host(host)?;
    Ok(url)
}

fn check_host(host: &str) -> Result<(), UrlGuardError> {
    let host_lower = host.to_ascii_lowercase();

    if DENIED_HOSTNAMES.contains(&host_lower.as_str())
        || host_lower.ends_with(".metadata.google.internal")
    {
        return Err(UrlGuardError::HostDenied(host.to_string()));
    }

    // Bracketed IPv6 literal, e.g. "[::1]" as produced by `Url::host_str`.
    let unbracketed = host_lower.trim_start_matches('[').trim_end_matches(']');

    if LITERAL_IPV4.is_match(unbracketed) {
        if is_denied_ipv4(unbracketed) {
            return Err(UrlGuardError::HostDenied(host.to_string()));
        }
        return Ok(());
    }

    if unbracketed.contains(':') {
        if is_denied_ipv6(unbracketed) {
            return Err(UrlGuardError::HostDenied(host.to_string()));
        }
    }

    Ok(())
}

fn is_denied_ipv4(addr: &str) -> bool {
    let octets: Vec<u8> = match addr
        .split('.')
        .map(|p| p.parse::<u8>())
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(o) if o.len() == 4 => o,
        _ => return true, // malformed literal that matched the regex loosely; deny
    };

    match octets[0] {
        0 | 10 | 127 => true,
        169 if octets[1] == 254 => true,
        172 if (16..=31).contains(&octets[1]) => true,
        192 if octets[1] == 168 => true,
        224..=255 => true, // covers 224.0.0.0/4 and 240.0.0.0/4
        _ => false,
    }
}

/// Expand a (possibly `::`-compressed) IPv6 literal into 8 groups of u16.
fn expand_ipv6(addr: &str) -> Option<[u16; 8]> {
    let addr = addr.strip_prefix('[').unwrap_or(addr);
    let addr = addr.strip_suffix(']').unwrap_or(addr);

    if let Some((head, tail)) = addr.split_once("::") {
        let head_groups = parse_groups(head)?;
        let tail_groups = parse_groups(tail)?;
        if head_groups.len() + tail_groups.len() > 8 {
            return None;
        }
        let mut groups = [0u16; 8];
        groups[..head_groups.len()].copy_from_slice(&head_groups);
        let tail_start = 8 - tail_groups.len();
        groups[tail_start..].copy_from_slice(&tail_groups);
        Some(groups)
    } else {
        let groups = parse_groups(addr)?;
        if groups.len() != 8 {
            return None;
        }
        let mut out = [0u16; 8];
        out.copy_from_slice(&groups);
        Some(out)
    }
}

fn parse_groups(segment: &str) -> Option<Vec<u16>> {
    if segment.is_empty() {
        return Some(Vec::new());
    }
    segment
        .split(':')
        .map(|g| u16::from_str_radix(g, 16).ok())
        .collect()
}

fn is_denied_ipv6(addr: &str) -> bool {
    let groups = match expand_ipv6(addr) {
        Some(g) => g,
        None => return true, // unparseable literal; deny conservatively
    };

    // ::1 — loopback
    if groups == [0, 0, 0, 0, 0, 0, 0, 1] {
        return true;
    }
    // fc00::/7 — unique local
    if (groups[0] & 0xfe00) == 0xfc00 {
        return true;
    }
    // fe80::/10 — link-local
    if (groups[0] & 0xffc0) == 0xfe80 {
        return true;
    }
    // ff00::/8 — multicast
    if (groups[0] & 0xff00) == 0xff00 {
        return true;
    }
    // ::ffff:a.b.c.d — IPv4-mapped; recurse into the embedded address.
    if groups[0..5] == [0, 0, 0, 0, 0xffff] {
        let a = (groups[6] >> 8) as u8;
        let b = (groups[6] & 0xff) as u8;
        let c = (groups[7] >> 8) as u8;
        let d = (groups[7] & 0xff) as u8;
        return is_denied_ipv4(&format!("{a}.{b}.{c}.{d}"));
    }

    false
}
