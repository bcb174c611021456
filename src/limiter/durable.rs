use super::{RateLimitBackend, RateLimitDecision};
use crate::error::CounterStoreError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A shared key-value counter with atomic increment and expiry.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment `key`, creating it at 1. Returns the new value.
    async fn incr(&self, key: &str) -> Result<u64, CounterStoreError>;

    /// Expire `key` after `secs` seconds.
    async fn expire(&self, key: &str, secs: u64) -> Result<(), CounterStoreError>;

    /// Seconds until `key` expires; negative when it has no expiry or is gone.
    async fn ttl(&self, key: &str) -> Result<i64, CounterStoreError>;
}

/// Fixed-window counting in a [`CounterStore`].
///
/// Increment first, set the expiry only on the hit that opened the window,
/// then derive the reset time from the remaining TTL.
pub struct DurableBackend {
    store: Arc<dyn CounterStore>,
    max_requests: u32,
    window_secs: u64,
}

impl DurableBackend {
    pub fn new(store: Arc<dyn CounterStore>, max_requests: u32, window: Duration) -> Self {
        Self {
            store,
            max_requests,
            window_secs: (window.as_millis() as u64).div_ceil(1000),
        }
    }
}

#[async_trait]
impl RateLimitBackend for DurableBackend {
    async fn hit(
        &self,
        identifier: &str,
        now_ms: u64,
    ) -> Result<RateLimitDecision, CounterStoreError> {
        let key = format!("ratelimit:{identifier}");
        let count = self.store.incr(&key).await?;
        if count == 1 {
            self.store.expire(&key, self.window_secs).await?;
        }
        let ttl = self.store.ttl(&key).await?;
        let reset_at_ms = now_ms + (ttl.max(0) as u64) * 1000;

        let max = u64::from(self.max_requests);
        Ok(RateLimitDecision {
            allowed: count <= max,
            remaining: max.saturating_sub(count) as u32,
            reset_at_ms,
            limit: self.max_requests,
        })
    }
}

/// [`CounterStore`] over a Redis multiplexed connection.
#[cfg(feature = "redis")]
#[derive(Clone)]
pub struct RedisCounterStore {
    conn: redis::aio::MultiplexedConnection,
}

#[cfg(feature = "redis")]
impl RedisCounterStore {
    /// Connect to `url`, e.g. `redis://127.0.0.1:6379`.
    pub async fn connect(url: &str) -> Result<Self, CounterStoreError> {
        let client = redis::Client::open(url).map_err(redis_err)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(redis_err)?;
        Ok(Self { conn })
    }
}

#[cfg(feature = "redis")]
fn redis_err(e: redis::RedisError) -> CounterStoreError {
    CounterStoreError(e.to_string())
}

#[cfg(feature = "redis")]
#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr(&self, key: &str) -> Result<u64, CounterStoreError> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        conn.incr(key, 1u64).await.map_err(redis_err)
    }

    async fn expire(&self, key: &str, secs: u64) -> Result<(), CounterStoreError> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        let _: i64 = conn.expire(key, secs as i64).await.map_err(redis_err)?;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<i64, CounterStoreError> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        conn.ttl(key).await.map_err(redis_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedTtl(i64);

    #[async_trait]
    impl CounterStore for FixedTtl {
        async fn incr(&self, _key: &str) -> Result<u64, CounterStoreError> {
            Ok(4)
        }

        async fn expire(&self, _key: &str, _secs: u64) -> Result<(), CounterStoreError> {
            Ok(())
        }

        async fn ttl(&self, _key: &str) -> Result<i64, CounterStoreError> {
            Ok(self.0)
        }
    }

    #[test]
    fn window_rounds_up_to_whole_seconds() {
        let b = DurableBackend::new(Arc::new(FixedTtl(0)), 3, Duration::from_millis(1500));
        assert_eq!(b.window_secs, 2);
    }

    #[tokio::test]
    async fn negative_ttl_resets_now() {
        let b = DurableBackend::new(Arc::new(FixedTtl(-1)), 3, Duration::from_secs(60));
        let d = b.hit("x", 10_000).await.unwrap();
        assert!(!d.allowed);
        assert_eq!(d.remaining, 0);
        assert_eq!(d.reset_at_ms, 10_000);
    }
}
