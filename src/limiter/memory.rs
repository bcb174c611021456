use super::{RateLimitBackend, RateLimitDecision};
use crate::error::CounterStoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: u32,
    reset_at_ms: u64,
}

/// Per-process fixed-window counters.
///
/// Read-modify-write happens under one lock, so concurrent hits on the same
/// identifier are counted exactly.
#[derive(Debug)]
pub struct MemoryBackend {
    max_requests: u32,
    window_ms: u64,
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryBackend {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window_ms: window.as_millis() as u64,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn check_at(&self, identifier: &str, now_ms: u64) -> RateLimitDecision {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(identifier.to_string()).or_insert(Entry {
            count: 0,
            reset_at_ms: 0,
        });

        // Absent or expired: start a new window.
        if entry.count == 0 || now_ms > entry.reset_at_ms {
            *entry = Entry {
                count: 1,
                reset_at_ms: now_ms + self.window_ms,
            };
            return self.decision(
                true,
                self.max_requests.saturating_sub(1),
                entry.reset_at_ms,
            );
        }

        if entry.count >= self.max_requests {
            return self.decision(false, 0, entry.reset_at_ms);
        }
        entry.count += 1;
        self.decision(true, self.max_requests - entry.count, entry.reset_at_ms)
    }

    /// Drop entries whose window ended before `now_ms`. Returns how many.
    pub async fn sweep(&self, now_ms: u64) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, e| now_ms <= e.reset_at_ms);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    fn decision(&self, allowed: bool, remaining: u32, reset_at_ms: u64) -> RateLimitDecision {
        RateLimitDecision {
            allowed,
            remaining,
            reset_at_ms,
            limit: self.max_requests,
        }
    }
}

#[async_trait]
impl RateLimitBackend for MemoryBackend {
    async fn hit(
        &self,
        identifier: &str,
        now_ms: u64,
    ) -> Result<RateLimitDecision, CounterStoreError> {
        Ok(self.check_at(identifier, now_ms).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reset_boundary_is_inclusive() {
        let m = MemoryBackend::new(1, Duration::from_millis(100));
        assert!(m.check_at("x", 0).await.allowed);
        // now == reset time still belongs to the old window.
        assert!(!m.check_at("x", 100).await.allowed);
        assert!(m.check_at("x", 101).await.allowed);
    }

    #[tokio::test]
    async fn sweep_keeps_live_windows() {
        let m = MemoryBackend::new(5, Duration::from_millis(100));
        m.check_at("old", 0).await;
        m.check_at("new", 150).await;
        assert_eq!(m.sweep(200).await, 1);
        assert_eq!(m.len().await, 1);
        assert!(m.check_at("new", 160).await.remaining == 3);
    }
}
