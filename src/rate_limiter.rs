//! Token-bucket rate limiter (§4.6), strongly consistent per identity.
//!
//! Each identity's bucket lives behind its own [`parking_lot::Mutex`] inside
//! a [`DashMap`], so refresh-then-decrement is atomic with respect to other
//! threads touching the same identity without taking a global lock across
//! unrelated identities. `parking_lot`'s mutex does not poison on panic,
//! which matters here: a poisoned lock must still let the caller fail
//! closed rather than propagate a panic from an unrelated thread.

use crate::errors::RateLimitError;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub const MAX_TOKENS: f64 = 100.0;
pub const REFILL_RATE: f64 = 100.0;
pub const WINDOW_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateLimitResult {
    Allowed { remaining: u32, reset_at: u64 },
    Denied { reset_at: u64 },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }

    pub fn reset_at(&self) -> u64 {
        match self {
            RateLimitResult::Allowed { reset_at, .. } => *reset_at,
            RateLimitResult::Denied { reset_at } => *reset_at,
        }
    }
}

struct Bucket {
    tokens: f64,
    last_refill_ms: u64,
}

impl Bucket {
    fn new(now_ms: u64) -> Self {
        Bucket {
            tokens: MAX_TOKENS,
            last_refill_ms: now_ms,
        }
    }

    fn refresh(&mut self, now_ms: u64) {
        let elapsed = now_ms.saturating_sub(self.last_refill_ms) as f64;
        let refilled = (elapsed / WINDOW_MS as f64) * REFILL_RATE;
        self.tokens = (self.tokens + refilled).min(MAX_TOKENS);
        self.last_refill_ms = now_ms;
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

pub struct RateLimiter {
    buckets: DashMap<String, Arc<Mutex<Bucket>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        RateLimiter {
            buckets: DashMap::new(),
        }
    }

    fn bucket_for(&self, identity: &str) -> Arc<Mutex<Bucket>> {
        self.buckets
            .entry(identity.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Bucket::new(now_ms()))))
            .clone()
    }

    /// Load/refresh without mutating the token count. Per §9, `check` runs
    /// the same refresh path as `consume` and therefore does advance
    /// `last_refill_ms`, it just never decrements.
    pub fn check(&self, identity: &str) -> Result<RateLimitResult, RateLimitError> {
        let bucket = self.bucket_for(identity);
        let mut guard = bucket.lock();
        let t = now_ms();
        guard.refresh(t);
        let reset_at = (guard.last_refill_ms + WINDOW_MS) / 1000;
        if guard.tokens >= 1.0 {
            Ok(RateLimitResult::Allowed {
                remaining: guard.tokens.floor() as u32,
                reset_at,
            })
        } else {
            Ok(RateLimitResult::Denied { reset_at })
        }
    }

    pub fn consume(&self, identity: &str) -> Result<RateLimitResult, RateLimitError> {
        let bucket = self.bucket_for(identity);
        let mut guard = bucket.lock();
        let t = now_ms();
        guard.refresh(t);
        let reset_at = (guard.last_refill_ms + WINDOW_MS) / 1000;

        if guard.tokens < 1.0 {
            return Ok(RateLimitResult::Denied { reset_at });
        }

        guard.tokens -= 1.0;
        Ok(RateLimitResult::Allowed {
            remaining: guard.tokens.floor() as u32,
            reset_at,
        })
    }

    pub fn reset(&self, identity: &str) {
        self.buckets.remove(identity);
    }

    /// Key for the separate admin-endpoint bucket, distinct from per-subject
    /// identities.
    pub fn admin_identity(client_ip: &str) -> String {
        format!("admin:{client_ip}")
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_hundred_consumes_allowed_101st_denied() {
        let limiter = RateLimiter::new();
        for i in 0..100 {
            let result = limiter.consume("iss:sub").expect("consume succeeds");
            assert!(result.is_allowed(), "request {i} should be allowed");
        }
        let result = limiter.consume("iss:sub").expect("consume succeeds");
        assert!(!result.is_allowed());
    }

    #[test]
    fn check_does_not_consume_tokens() {
        let limiter = RateLimiter::new();
        for _ in 0..5 {
            limiter.check("iss:sub").expect("check succeeds");
        }
        let result = limiter.consume("iss:sub").expect("consume succeeds");
        match result {
            RateLimitResult::Allowed { remaining, .. } => assert_eq!(remaining, 99),
            RateLimitResult::Denied { .. } => panic!("should still be allowed"),
        }
    }

    #[test]
    fn reset_clears_the_bucket() {
        let limiter = RateLimiter::new();
        for _ in 0..100 {
            limiter.consume("iss:sub").expect("consume succeeds");
        }
        assert!(!limiter.consume("iss:sub").unwrap().is_allowed());
        limiter.reset("iss:sub");
        assert!(limiter.consume("iss:sub").unwrap().is_allowed());
    }

    #[test]
    fn distinct_identities_have_independent_buckets() {
        let limiter = RateLimiter::new();
        for _ in 0..100 {
            limiter.consume("a").expect("consume succeeds");
        }
        assert!(!limiter.consume("a").unwrap().is_allowed());
        assert!(limiter.consume("b").unwrap().is_allowed());
    }

    #[test]
    fn admin_identity_is_namespaced() {
        assert_eq!(RateLimiter::admin_identity("1.2.3.4"), "admin:1.2.3.4");
    }
}
