// =============================================================================
// Rate-Limit Tracker — keeps the public CoinGecko tier from locking us out
// =============================================================================
//
// The free API answers HTTP 429 once the per-minute budget is spent, usually
// with a `Retry-After` header in seconds. The tracker remembers when the
// cooldown ends and refuses outgoing requests until then. Counters are atomic
// so the refresh loop and API handlers can query it lock-free.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};
use tracing::{debug, warn};

/// Cooldown applied when a 429 arrives without a usable `Retry-After`.
const DEFAULT_COOLDOWN_SECS: u64 = 60;
/// Upper bound on any single cooldown.
const MAX_COOLDOWN_SECS: u64 = 600;

/// Thread-safe rate-limit tracker backed by atomic counters.
pub struct RateLimitTracker {
    requests_sent: AtomicU64,
    throttled_count: AtomicU32,
    /// Unix milliseconds until which requests are refused (0 = none).
    cooldown_until_ms: AtomicI64,
}

/// Immutable snapshot of the current rate-limit state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    pub requests_sent: u64,
    pub throttled_count: u32,
    pub cooling_down: bool,
    pub cooldown_remaining_secs: u64,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self {
            requests_sent: AtomicU64::new(0),
            throttled_count: AtomicU32::new(0),
            cooldown_until_ms: AtomicI64::new(0),
        }
    }

    // -------------------------------------------------------------------------
    // Updates
    // -------------------------------------------------------------------------

    /// Count an outgoing request.
    pub fn record_request(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a 429 observed at `now_ms`. `retry_after_secs` comes from the
    /// response header when present.
    pub fn record_throttled(&self, now_ms: i64, retry_after_secs: Option<u64>) {
        let secs = retry_after_secs
            .unwrap_or(DEFAULT_COOLDOWN_SECS)
            .min(MAX_COOLDOWN_SECS);
        let until = now_ms.saturating_add((secs as i64).saturating_mul(1000));
        self.cooldown_until_ms.fetch_max(until, Ordering::Relaxed);
        let count = self.throttled_count.fetch_add(1, Ordering::Relaxed) + 1;

        warn!(
            cooldown_secs = secs,
            throttled_count = count,
            "CoinGecko rate limit hit, cooling down"
        );
    }

    /// Inspect response headers: a 429 status starts a cooldown.
    pub fn update_from_response(
        &self,
        status: reqwest::StatusCode,
        headers: &reqwest::header::HeaderMap,
        now_ms: i64,
    ) {
        if status != reqwest::StatusCode::TOO_MANY_REQUESTS {
            return;
        }
        let retry_after = headers
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok());
        self.record_throttled(now_ms, retry_after);
    }

    // -------------------------------------------------------------------------
    // Pre-flight checks
    // -------------------------------------------------------------------------

    /// `true` when no cooldown is active at `now_ms`.
    pub fn can_send_request(&self, now_ms: i64) -> bool {
        let until = self.cooldown_until_ms.load(Ordering::Relaxed);
        let allowed = now_ms >= until;
        if !allowed {
            debug!(
                remaining_ms = until - now_ms,
                "request blocked, rate-limit cooldown active"
            );
        }
        allowed
    }

    pub fn snapshot(&self, now_ms: i64) -> RateLimitSnapshot {
        let until = self.cooldown_until_ms.load(Ordering::Relaxed);
        let remaining_ms = (until - now_ms).max(0) as u64;
        RateLimitSnapshot {
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            throttled_count: self.throttled_count.load(Ordering::Relaxed),
            cooling_down: remaining_ms > 0,
            cooldown_remaining_secs: remaining_ms.div_ceil(1000),
        }
    }
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
    use reqwest::StatusCode;

    #[test]
    fn fresh_tracker_allows_requests() {
        let t = RateLimitTracker::new();
        assert!(t.can_send_request(0));
        let snap = t.snapshot(0);
        assert!(!snap.cooling_down);
        assert_eq!(snap.throttled_count, 0);
    }

    #[test]
    fn retry_after_header_sets_cooldown() {
        let t = RateLimitTracker::new();
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("30"));
        t.update_from_response(StatusCode::TOO_MANY_REQUESTS, &headers, 1_000);

        assert!(!t.can_send_request(1_000));
        assert!(!t.can_send_request(30_999));
        assert!(t.can_send_request(31_000));

        let snap = t.snapshot(11_000);
        assert!(snap.cooling_down);
        assert_eq!(snap.cooldown_remaining_secs, 20);
        assert_eq!(snap.throttled_count, 1);
    }

    #[test]
    fn missing_retry_after_uses_default() {
        let t = RateLimitTracker::new();
        t.update_from_response(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new(), 0);
        assert!(!t.can_send_request(59_999));
        assert!(t.can_send_request(60_000));
    }

    #[test]
    fn success_status_is_ignored() {
        let t = RateLimitTracker::new();
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("30"));
        t.update_from_response(StatusCode::OK, &headers, 0);
        assert!(t.can_send_request(0));
    }

    #[test]
    fn cooldown_is_capped_and_never_shortened() {
        let t = RateLimitTracker::new();
        t.record_throttled(0, Some(100_000));
        assert!(t.can_send_request(600_000));

        t.record_throttled(0, Some(120));
        t.record_throttled(0, Some(10));
        assert!(!t.can_send_request(119_999));
    }
}
