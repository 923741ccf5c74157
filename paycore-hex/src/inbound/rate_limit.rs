//! Per-buyer request budget on the public `/payment-intent` routes.
//!
//! Each bearer token owns a governor bucket created on first use.

use std::{num::NonZeroU32, sync::Arc, time::Duration};

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use serde_json::json;
use tracing::debug;

type Bucket = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Bucket key for requests that carry no bearer token.
const ANONYMOUS: &str = "anonymous";

pub struct TokenBuckets {
    buckets: DashMap<String, Arc<Bucket>>,
    quota: Quota,
    refill: Duration,
}

impl TokenBuckets {
    /// `requests` per minute; zero is treated as one.
    pub fn per_minute(requests: u32) -> Self {
        Self::new(requests, Duration::from_secs(60))
    }

    /// Bursts of `requests`, refilled one request per `refill`.
    pub fn new(requests: u32, refill: Duration) -> Self {
        let burst = NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(refill)
            .unwrap_or_else(|| Quota::per_minute(NonZeroU32::MIN))
            .allow_burst(burst);
        Self {
            buckets: DashMap::new(),
            quota,
            refill,
        }
    }

    /// Takes one request from `token`'s bucket. `false` when it is empty.
    pub fn try_acquire(&self, token: &str) -> bool {
        let bucket = self
            .buckets
            .entry(token.to_string())
            .or_insert_with(|| Arc::new(RateLimiter::direct(self.quota)))
            .clone();
        bucket.check().is_ok()
    }

    fn retry_after_secs(&self) -> u64 {
        self.refill.as_secs().max(1)
    }
}

fn bearer_token(headers: &HeaderMap) -> &str {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(ANONYMOUS)
}

pub async fn rate_limit_middleware(
    State(buckets): State<Arc<TokenBuckets>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !buckets.try_acquire(bearer_token(request.headers())) {
        let retry_after = buckets.retry_after_secs();
        debug!(path = %request.uri().path(), retry_after, "request budget exhausted");
        let body = json!({
            "error": "Rate limit exceeded. Please try again later.",
            "code": StatusCode::TOO_MANY_REQUESTS.as_u16(),
            "retry_after_seconds": retry_after,
        });
        return (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_burst_then_limited() {
        let buckets = TokenBuckets::per_minute(2);

        assert!(buckets.try_acquire("tok_a"));
        assert!(buckets.try_acquire("tok_a"));
        assert!(!buckets.try_acquire("tok_a"));
    }

    #[test]
    fn test_tokens_are_limited_independently() {
        let buckets = TokenBuckets::per_minute(1);

        assert!(buckets.try_acquire("tok_a"));
        assert!(!buckets.try_acquire("tok_a"));
        assert!(buckets.try_acquire("tok_b"));
    }

    #[test]
    fn test_zero_quota_still_allows_one() {
        let buckets = TokenBuckets::new(0, Duration::ZERO);
        assert!(buckets.try_acquire("tok_a"));
        assert_eq!(buckets.retry_after_secs(), 1);
    }

    #[test]
    fn test_bearer_token_key() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), ANONYMOUS);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), ANONYMOUS);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer tok_buyer"));
        assert_eq!(bearer_token(&headers), "tok_buyer");
    }
}
