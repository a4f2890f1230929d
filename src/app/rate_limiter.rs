use anyhow::Result;
use redis::AsyncCommands;

use crate::config::rate_limits::{current_window, RateAction};
use crate::infra::cache::RedisCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limited: bool,
    pub limit: u32,
    pub remaining: u32,
}

/// Fixed-window counters in Redis, keyed by action and subject (a user id or
/// a client IP).
#[derive(Clone)]
pub struct RateLimiter {
    cache: RedisCache,
}

impl RateLimiter {
    pub fn new(cache: RedisCache) -> Self {
        Self { cache }
    }

    pub async fn check(&self, action: RateAction, subject: &str) -> Result<RateLimitInfo> {
        let (limit, window) = action.limit();
        let key = window_key(action, subject, current_window(window.seconds()));

        let mut conn = self.cache.connection().await?;
        let count: Option<u32> = conn.get(&key).await?;
        let count = count.unwrap_or(0);

        if count >= limit {
            tracing::debug!(
                subject = subject,
                action = action.as_str(),
                count = count,
                limit = limit,
                "rate limit exceeded"
            );
        }

        Ok(RateLimitInfo {
            limited: count >= limit,
            limit,
            remaining: limit.saturating_sub(count),
        })
    }

    pub async fn increment(&self, action: RateAction, subject: &str) -> Result<()> {
        let (_, window) = action.limit();
        let window_seconds = window.seconds();
        let key = window_key(action, subject, current_window(window_seconds));

        let mut conn = self.cache.connection().await?;
        let count: u32 = conn.incr(&key, 1).await?;

        // First hit in the window owns the expiry.
        if count == 1 {
            let _: () = conn.expire(&key, window_seconds as i64).await?;
        }

        Ok(())
    }
}

fn window_key(action: RateAction, subject: &str, window: u64) -> String {
    format!("ratelimit:{}:{}:{}", action.as_str(), subject, window)
}
