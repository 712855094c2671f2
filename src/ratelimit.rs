//! Fixed-window request gate keyed by client identifier.
//!
//! Each identifier owns a counter and a window end time. The first request
//! after the window has ended starts a new window with a count of 1;
//! otherwise the count is incremented until it reaches `max_requests`, after
//! which requests are rejected without being counted.
//!
//! Counters live in a bounded [`moka`] cache: at most `max_clients`
//! identifiers are tracked, and an identifier idle for a whole window is
//! evicted (its next request would have started a fresh window anyway).
//! The cache evicts least-recently-used entries and always admits new ones,
//! so a full table never leaves a newly seen client ungated.
//!
//! Counts are per process. Several server instances each keep their own.

use axum::http::HeaderMap;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;

/// Bucket shared by every request that carries no forwarding header.
pub const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// Outcome of one gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    /// Requests left in the current window after this one.
    pub remaining: u32,
}

pub struct RateLimiter {
    windows: Cache<String, Arc<Mutex<Window>>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let window = Duration::from_millis(config.window_ms);
        let windows = Cache::builder()
            .max_capacity(config.max_clients)
            .eviction_policy(EvictionPolicy::lru())
            .time_to_idle(window)
            .build();
        Self {
            windows,
            max_requests: config.max_requests,
            window,
        }
    }

    /// Returns true if a request from `identifier` is admitted now.
    pub fn allow(&self, identifier: &str) -> bool {
        self.check(identifier).allowed
    }

    pub fn check(&self, identifier: &str) -> Decision {
        self.check_at(identifier, Instant::now())
    }

    /// Gate check against an explicit clock reading.
    pub fn check_at(&self, identifier: &str, now: Instant) -> Decision {
        let entry = self.windows.get_with(identifier.to_string(), || {
            Arc::new(Mutex::new(Window {
                count: 0,
                reset_at: now + self.window,
            }))
        });
        let mut w = entry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if w.count == 0 || now > w.reset_at {
            w.count = 1;
            w.reset_at = now + self.window;
        } else if w.count >= self.max_requests {
            return Decision {
                allowed: false,
                remaining: 0,
            };
        } else {
            w.count += 1;
        }

        Decision {
            allowed: true,
            remaining: self.max_requests - w.count,
        }
    }

    /// Number of identifiers currently tracked.
    pub fn tracked_clients(&self) -> u64 {
        self.windows.run_pending_tasks();
        self.windows.entry_count()
    }
}

/// Derives the rate-limit key for a request.
///
/// Uses the first `x-forwarded-for` entry, then `x-real-ip`, and falls back
/// to [`UNKNOWN_CLIENT`].
pub fn client_identifier(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn limiter(max_requests: u32, window_ms: u64) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            max_requests,
            window_ms,
            max_clients: 100,
        })
    }

    #[test]
    fn test_eleventh_request_rejected() {
        let rl = limiter(10, 60_000);
        let t0 = Instant::now();
        for i in 0..10 {
            let d = rl.check_at("1.2.3.4", t0 + Duration::from_millis(i * 100));
            assert!(d.allowed, "request {} should pass", i + 1);
            assert_eq!(d.remaining, 9 - i as u32);
        }
        let d = rl.check_at("1.2.3.4", t0 + Duration::from_secs(30));
        assert!(!d.allowed);
        assert_eq!(d.remaining, 0);
    }

    #[test]
    fn test_window_expiry_resets_count() {
        let rl = limiter(10, 60_000);
        let t0 = Instant::now();
        for _ in 0..11 {
            rl.check_at("a", t0);
        }
        let after = t0 + Duration::from_millis(60_001);
        let d = rl.check_at("a", after);
        assert!(d.allowed);
        assert_eq!(d.remaining, 9, "count restarts at 1");
    }

    #[test]
    fn test_rejected_requests_are_not_counted() {
        let rl = limiter(2, 60_000);
        let t0 = Instant::now();
        assert!(rl.check_at("a", t0).allowed);
        assert!(rl.check_at("a", t0).allowed);
        for _ in 0..5 {
            assert!(!rl.check_at("a", t0).allowed);
        }
        // a new window still admits exactly the ceiling
        let t1 = t0 + Duration::from_millis(60_001);
        assert!(rl.check_at("a", t1).allowed);
        assert!(rl.check_at("a", t1).allowed);
        assert!(!rl.check_at("a", t1).allowed);
    }

    #[test]
    fn test_identifiers_are_independent() {
        let rl = limiter(1, 60_000);
        assert!(rl.allow("a"));
        assert!(!rl.allow("a"));
        assert!(rl.allow("b"));
        assert_eq!(rl.tracked_clients(), 2);
    }

    #[test]
    fn test_new_client_is_gated_when_table_is_full() {
        let rl = RateLimiter::new(&RateLimitConfig {
            max_requests: 10,
            window_ms: 60_000,
            max_clients: 50,
        });
        let t0 = Instant::now();
        for i in 0..50 {
            for _ in 0..20 {
                rl.check_at(&format!("10.0.0.{}", i), t0);
            }
        }
        assert_eq!(rl.tracked_clients(), 50);

        let mut allowed = 0;
        for _ in 0..30 {
            if rl.check_at("newcomer", t0).allowed {
                allowed += 1;
            }
            rl.tracked_clients();
        }
        assert_eq!(allowed, 10);
        assert!(rl.tracked_clients() <= 50);
    }

    #[test]
    fn test_client_identifier() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_identifier(&headers), UNKNOWN_CLIENT);

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_identifier(&headers), "10.0.0.2");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_identifier(&headers), "203.0.113.7");
    }
}
