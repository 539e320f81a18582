//! Per-client fixed-window rate limiting for the protected proxy route.
//!
//! State lives in this process only. Restarting the gateway forgets every
//! window, and records are never evicted, so this is a local safeguard and
//! not a distributed limiter.

use axum::http::HeaderMap;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::Duration;
use tracing::{debug, warn};

/// Source id used when no proxy header names the client.
pub const FALLBACK_SOURCE: &str = "127.0.0.1";

// Header precedence when deriving the client address
const EDGE_CLIENT_HEADER: &str = "cf-connecting-ip";
const REAL_IP_HEADER: &str = "x-real-ip";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 30,
            window: Duration::from_millis(60_000),
        }
    }
}

// Rate limit entry - tracks requests per client address
#[derive(Debug, Clone)]
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_at: DateTime<Utc>,
}

/// Outcome of a single rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed {
        limit: u32,
        remaining: u32,
        reset_at: DateTime<Utc>,
    },
    Limited {
        limit: u32,
        reset_at: DateTime<Utc>,
        retry_after_secs: u64,
    },
}

impl RateLimitDecision {
    pub fn is_limited(&self) -> bool {
        matches!(self, RateLimitDecision::Limited { .. })
    }
}

pub struct RateLimiter {
    entries: DashMap<String, RateLimitEntry>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Returns `true` when `source` has used up its quota for the current window.
    pub fn is_rate_limited(&self, source: &str) -> bool {
        self.check(source).is_limited()
    }

    pub fn check(&self, source: &str) -> RateLimitDecision {
        self.check_at(source, Utc::now())
    }

    /// Records one request from `source` at `now` and decides whether it passes.
    ///
    /// A rejected request does not count against the window.
    pub fn check_at(&self, source: &str, now: DateTime<Utc>) -> RateLimitDecision {
        let limit = self.config.max_requests;
        let fresh = || RateLimitEntry {
            count: 1,
            reset_at: now
                .checked_add_signed(self.window_delta())
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        let mut entry = match self.entries.entry(source.to_string()) {
            Entry::Vacant(slot) => {
                debug!(source, "Tracking new rate limit source");
                let entry = slot.insert(fresh());
                return RateLimitDecision::Allowed {
                    limit,
                    remaining: limit.saturating_sub(1),
                    reset_at: entry.reset_at,
                };
            }
            Entry::Occupied(slot) => slot.into_ref(),
        };

        // window expired, re-anchor it
        if now >= entry.reset_at {
            *entry = fresh();
            return RateLimitDecision::Allowed {
                limit,
                remaining: limit.saturating_sub(1),
                reset_at: entry.reset_at,
            };
        }

        if entry.count >= limit {
            let reset_at = entry.reset_at;
            warn!(source, count = entry.count, limit, "Rate limit exceeded");
            return RateLimitDecision::Limited {
                limit,
                reset_at,
                retry_after_secs: retry_after_secs(now, reset_at),
            };
        }

        entry.count += 1;
        RateLimitDecision::Allowed {
            limit,
            remaining: limit.saturating_sub(entry.count),
            reset_at: entry.reset_at,
        }
    }

    /// Current count for `source`, if it has a window record.
    pub fn current_count(&self, source: &str) -> Option<u32> {
        self.entries.get(source).map(|e| e.count)
    }

    pub fn tracked_sources(&self) -> usize {
        self.entries.len()
    }

    fn window_delta(&self) -> ChronoDuration {
        // windows beyond chrono's range saturate
        ChronoDuration::from_std(self.config.window).unwrap_or(ChronoDuration::MAX)
    }
}

// Whole seconds until the window resets, rounded up, never below 1
fn retry_after_secs(now: DateTime<Utc>, reset_at: DateTime<Utc>) -> u64 {
    let ms = (reset_at - now).num_milliseconds().max(0) as u64;
    ms.div_ceil(1000).max(1)
}

/// Derives the rate limit source id for an inbound request.
///
/// Edge proxy client header, then `x-real-ip`, then the first hop of
/// `x-forwarded-for`, then [`FALLBACK_SOURCE`].
pub fn client_source_id(headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(ip) = header(EDGE_CLIENT_HEADER) {
        return ip.to_string();
    }
    if let Some(ip) = header(REAL_IP_HEADER) {
        return ip.to_string();
    }
    if let Some(chain) = header(FORWARDED_FOR_HEADER) {
        if let Some(first) = chain.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return first.to_string();
        }
    }

    FALLBACK_SOURCE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::TimeZone;

    fn limiter(max: u32, window_ms: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_requests: max,
            window: Duration::from_millis(window_ms),
        })
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap()
    }

    fn at(ms: i64) -> DateTime<Utc> {
        t0() + ChronoDuration::milliseconds(ms)
    }

    #[test]
    fn test_allows_up_to_max_then_limits() {
        let limiter = RateLimiter::new(RateLimitConfig::default());

        for i in 0..30 {
            assert!(!limiter.check_at("10.0.0.1", at(i)).is_limited(), "request {i}");
        }
        assert!(limiter.check_at("10.0.0.1", at(31)).is_limited());
        assert_eq!(limiter.current_count("10.0.0.1"), Some(30));
    }

    #[test]
    fn test_window_elapsed_starts_fresh() {
        let limiter = limiter(3, 60_000);

        for _ in 0..4 {
            limiter.check_at("a", t0());
        }
        assert!(limiter.check_at("a", at(59_999)).is_limited());

        let decision = limiter.check_at("a", at(60_000));
        assert!(!decision.is_limited());
        assert_eq!(limiter.current_count("a"), Some(1));
    }

    #[test]
    fn test_sources_are_independent() {
        let limiter = limiter(1, 1000);

        assert!(!limiter.check_at("a", t0()).is_limited());
        assert!(limiter.check_at("a", at(1)).is_limited());
        assert!(!limiter.check_at("b", at(2)).is_limited());
        assert_eq!(limiter.tracked_sources(), 2);
    }

    #[test]
    fn test_concrete_timeline() {
        let limiter = limiter(2, 1000);

        assert!(!limiter.check_at("A", at(0)).is_limited());
        assert!(!limiter.check_at("A", at(100)).is_limited());
        assert!(limiter.check_at("A", at(200)).is_limited());
        assert_eq!(limiter.current_count("A"), Some(2));

        assert!(!limiter.check_at("A", at(1001)).is_limited());
        assert_eq!(limiter.current_count("A"), Some(1));
    }

    #[test]
    fn test_limited_reports_retry_guidance() {
        let limiter = limiter(1, 60_000);

        let first = limiter.check_at("a", t0());
        assert_eq!(
            first,
            RateLimitDecision::Allowed {
                limit: 1,
                remaining: 0,
                reset_at: at(60_000),
            }
        );

        match limiter.check_at("a", at(500)) {
            RateLimitDecision::Limited {
                limit,
                reset_at,
                retry_after_secs,
            } => {
                assert_eq!(limit, 1);
                assert_eq!(reset_at, at(60_000));
                // 59.5s rounds up
                assert_eq!(retry_after_secs, 60);
            }
            other => panic!("expected limited, got {other:?}"),
        }
    }

    #[test]
    fn test_huge_window_saturates() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_requests: 1,
            window: Duration::from_secs(u64::MAX),
        });

        assert!(!limiter.check_at("a", t0()).is_limited());
        assert!(limiter.check_at("a", at(10_000)).is_limited());

        let limiter = RateLimiter::new(RateLimitConfig {
            max_requests: 1,
            window: Duration::from_millis(i64::MAX as u64),
        });
        assert!(!limiter.check_at("b", t0()).is_limited());
        assert!(limiter.check_at("b", at(1)).is_limited());
    }

    #[test]
    fn test_retry_after_never_zero() {
        assert_eq!(retry_after_secs(at(999), at(1000)), 1);
        assert_eq!(retry_after_secs(at(1000), at(1000)), 1);
        assert_eq!(retry_after_secs(at(0), at(2001)), 3);
    }

    #[test]
    fn test_is_rate_limited_wall_clock() {
        let limiter = limiter(2, 60_000);

        assert!(!limiter.is_rate_limited("x"));
        assert!(!limiter.is_rate_limited("x"));
        assert!(limiter.is_rate_limited("x"));
    }

    #[test]
    fn test_source_precedence() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_source_id(&headers), FALLBACK_SOURCE);

        headers.insert("x-forwarded-for", HeaderValue::from_static(" 1.1.1.1 , 2.2.2.2"));
        assert_eq!(client_source_id(&headers), "1.1.1.1");

        headers.insert("x-real-ip", HeaderValue::from_static("3.3.3.3"));
        assert_eq!(client_source_id(&headers), "3.3.3.3");

        headers.insert("cf-connecting-ip", HeaderValue::from_static("4.4.4.4"));
        assert_eq!(client_source_id(&headers), "4.4.4.4");
    }

    #[test]
    fn test_empty_headers_are_skipped() {
        let mut headers = HeaderMap::new();
        headers.insert("cf-connecting-ip", HeaderValue::from_static(""));
        headers.insert("x-forwarded-for", HeaderValue::from_static("5.5.5.5"));

        assert_eq!(client_source_id(&headers), "5.5.5.5");
    }
}
