//! Adaptive rate limiter for the content endpoint.
//!
//! Epistemic foundation:
//! - K_i: OpenAI-compatible endpoints return `x-ratelimit-*` headers
//! - K_i: 429 responses require exponential backoff
//! - I^B: Exact limits are unknowable until headers arrive

use dashmap::DashMap;
use reqwest::header::HeaderMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Upper bound on the 429 backoff.
const MAX_BACKOFF_SECS: f64 = 60.0;

/// Throttling state for one model.
#[derive(Debug, Default)]
pub struct ModelLimits {
    pub remaining_requests: Option<u32>,
    pub remaining_tokens: Option<u32>,
    pub requests_reset_at: Option<Instant>,
    pub tokens_reset_at: Option<Instant>,
    /// Consecutive 429 responses
    pub consecutive_429s: u32,
    pub backoff_until: Option<Instant>,
}

impl ModelLimits {
    /// How long to wait before the next request, measured from `now`.
    pub fn wait_time(&self, now: Instant) -> Duration {
        let until = |deadline: Option<Instant>| {
            deadline
                .filter(|&t| t > now)
                .map(|t| t - now)
                .unwrap_or(Duration::ZERO)
        };

        let mut wait = until(self.backoff_until);
        if self.remaining_requests == Some(0) {
            wait = wait.max(until(self.requests_reset_at));
        }
        if self.remaining_tokens == Some(0) {
            wait = wait.max(until(self.tokens_reset_at));
        }
        wait
    }

    fn record_429(&mut self, now: Instant) {
        self.consecutive_429s += 1;
        let backoff_secs = 2f64.powi(self.consecutive_429s as i32).min(MAX_BACKOFF_SECS);
        self.backoff_until = Some(now + Duration::from_secs_f64(backoff_secs));
        warn!(
            consecutive_429s = self.consecutive_429s,
            backoff_secs = backoff_secs,
            "Rate limited (429), backing off"
        );
    }

    fn record_success(&mut self) {
        self.consecutive_429s = 0;
        self.backoff_until = None;
    }

    fn update_from_headers(&mut self, headers: &HeaderMap, now: Instant) {
        let read = |key: &str| headers.get(key).and_then(|v| v.to_str().ok());
        let reset = |key: &str| {
            read(key)
                .and_then(parse_reset)
                .map(|d| now + d)
        };

        if let Some(v) = read("x-ratelimit-remaining-requests") {
            self.remaining_requests = v.parse().ok();
        }
        if let Some(v) = read("x-ratelimit-remaining-tokens") {
            self.remaining_tokens = v.parse().ok();
        }
        if let Some(at) = reset("x-ratelimit-reset-requests") {
            self.requests_reset_at = Some(at);
        }
        if let Some(at) = reset("x-ratelimit-reset-tokens") {
            self.tokens_reset_at = Some(at);
        }
    }
}

/// Reset hints come as plain seconds (`1.5`) or with a unit (`20ms`, `6s`).
fn parse_reset(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let secs = if let Some(ms) = raw.strip_suffix("ms") {
        ms.parse::<f64>().ok()? / 1000.0
    } else if let Some(s) = raw.strip_suffix('s') {
        s.parse::<f64>().ok()?
    } else {
        raw.parse::<f64>().ok()?
    };
    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
}

/// Per-model adaptive limiter shared by every request to one endpoint.
#[derive(Debug, Default)]
pub struct RateLimiter {
    models: DashMap<String, ModelLimits>,
    total_requests: AtomicU64,
    total_429s: AtomicU64,
    total_wait_ms: AtomicU64,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep until `model` may be called again. Returns the time waited.
    pub async fn wait_if_needed(&self, model: &str) -> Duration {
        let wait = self
            .models
            .get(model)
            .map(|limits| limits.wait_time(Instant::now()))
            .unwrap_or(Duration::ZERO);

        if wait > Duration::ZERO {
            debug!(model = model, wait_ms = wait.as_millis() as u64, "Waiting for rate limit");
            self.total_wait_ms
                .fetch_add(wait.as_millis() as u64, Ordering::Relaxed);
            tokio::time::sleep(wait).await;
        }
        wait
    }

    /// Record a response status and its rate-limit headers.
    pub fn record_request(&self, model: &str, status: u16, headers: &HeaderMap) {
        let now = Instant::now();
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let mut limits = self.models.entry(model.to_string()).or_default();
        limits.update_from_headers(headers, now);
        if status == 429 {
            self.total_429s.fetch_add(1, Ordering::Relaxed);
            limits.record_429(now);
        } else if status < 400 {
            limits.record_success();
        }
    }

    pub fn stats(&self) -> RateLimiterStats {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let total_429s = self.total_429s.load(Ordering::Relaxed);
        RateLimiterStats {
            total_requests,
            total_429s,
            total_wait_secs: self.total_wait_ms.load(Ordering::Relaxed) as f64 / 1000.0,
            rate_limit_ratio: if total_requests > 0 {
                total_429s as f64 / total_requests as f64
            } else {
                0.0
            },
        }
    }
}

/// Rate limiter statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterStats {
    pub total_requests: u64,
    pub total_429s: u64,
    pub total_wait_secs: f64,
    pub rate_limit_ratio: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_parse_reset_units() {
        assert_eq!(parse_reset("1.5"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_reset("6s"), Some(Duration::from_secs(6)));
        assert_eq!(parse_reset("20ms"), Some(Duration::from_millis(20)));
        assert_eq!(parse_reset("soon"), None);
    }

    #[test]
    fn test_429_backs_off_and_success_clears() {
        let limiter = RateLimiter::new();
        limiter.record_request("m", 429, &HeaderMap::new());
        limiter.record_request("m", 429, &HeaderMap::new());

        let wait = limiter.models.get("m").unwrap().wait_time(Instant::now());
        assert!(wait > Duration::from_secs(3) && wait <= Duration::from_secs(4));

        limiter.record_request("m", 200, &HeaderMap::new());
        assert_eq!(limiter.models.get("m").unwrap().wait_time(Instant::now()), Duration::ZERO);

        let stats = limiter.stats();
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.total_429s, 2);
    }

    #[test]
    fn test_exhausted_quota_waits_for_reset() {
        let limiter = RateLimiter::new();
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining-requests", HeaderValue::from_static("0"));
        headers.insert("x-ratelimit-reset-requests", HeaderValue::from_static("2s"));
        limiter.record_request("m", 200, &headers);

        let wait = limiter.models.get("m").unwrap().wait_time(Instant::now());
        assert!(wait > Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_unknown_model_does_not_wait() {
        let limiter = RateLimiter::new();
        assert_eq!(limiter.wait_if_needed("fresh").await, Duration::ZERO);
    }
}
