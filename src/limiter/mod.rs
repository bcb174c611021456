//! Fixed-window admission control in front of the model call.
//!
//! Each identifier gets at most `max_requests` hits per window. Rejected hits
//! do not extend the window: a denied caller always sees the reset time of
//! the window it was denied in.
//!
//! Two backends sit behind [`RateLimitBackend`]:
//!
//! * [`MemoryBackend`]: a per-process map, swept periodically by a
//!   [`Sweeper`] task the owner starts and stops explicitly.
//! * [`DurableBackend`]: counters in a shared [`CounterStore`] (Redis with
//!   the `redis` feature), so several processes share one budget.
//!
//! The durable backend is optional. Any error it reports is logged and the
//! hit is counted in memory instead, so [`RateLimiter::check`] cannot fail.

mod durable;
mod memory;

pub use durable::{CounterStore, DurableBackend};
#[cfg(feature = "redis")]
pub use durable::RedisCounterStore;
pub use memory::MemoryBackend;

use crate::config::RateLimitConfig;
use crate::error::CounterStoreError;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Hits left in the current window; 0 once denied.
    pub remaining: u32,
    /// When the current window ends, Unix epoch milliseconds.
    pub reset_at_ms: u64,
    /// The configured per-window maximum, for `X-RateLimit-Limit`.
    pub limit: u32,
}

/// Counts one hit for an identifier.
#[async_trait]
pub trait RateLimitBackend: Send + Sync {
    async fn hit(
        &self,
        identifier: &str,
        now_ms: u64,
    ) -> Result<RateLimitDecision, CounterStoreError>;
}

/// Current wall-clock time as Unix epoch milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The admission layer. Cheap to clone; clones share counters.
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    durable: Option<Arc<dyn RateLimitBackend>>,
    memory: Arc<MemoryBackend>,
}

impl RateLimiter {
    /// A limiter counting in process memory only.
    pub fn in_memory(config: RateLimitConfig) -> Self {
        let memory = Arc::new(MemoryBackend::new(config.max_requests, config.window));
        Self {
            config,
            durable: None,
            memory,
        }
    }

    /// A limiter counting in `store`, falling back to memory when it errors.
    pub fn with_store(config: RateLimitConfig, store: Arc<dyn CounterStore>) -> Self {
        let durable = DurableBackend::new(store, config.max_requests, config.window);
        let mut limiter = Self::in_memory(config);
        limiter.durable = Some(Arc::new(durable));
        limiter
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn limit(&self) -> u32 {
        self.config.max_requests
    }

    /// The in-memory fallback, exposed for inspection and manual sweeps.
    pub fn memory(&self) -> &MemoryBackend {
        &self.memory
    }

    /// Count one hit for `identifier` at the current time.
    pub async fn check(&self, identifier: &str) -> RateLimitDecision {
        self.check_at(identifier, now_ms()).await
    }

    /// Count one hit for `identifier` at `now_ms`.
    pub async fn check_at(&self, identifier: &str, now_ms: u64) -> RateLimitDecision {
        if let Some(durable) = &self.durable {
            match durable.hit(identifier, now_ms).await {
                Ok(decision) => return decision,
                Err(e) => warn!("Durable rate limit failed, falling back to memory: {}", e),
            }
        }
        self.memory.check_at(identifier, now_ms).await
    }

    /// Start the periodic sweep of expired in-memory entries.
    ///
    /// Must be called from within a Tokio runtime. The task runs until
    /// [`Sweeper::stop`] is called or the handle is dropped.
    pub fn start_sweeper(&self) -> Sweeper {
        let memory = Arc::clone(&self.memory);
        let period = self.config.sweep_interval;
        let (shutdown, mut rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately; nothing can have expired yet.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let removed = memory.sweep(now_ms()).await;
                        if removed > 0 {
                            debug!("Rate-limit sweep removed {} expired entries", removed);
                        }
                    }
                    _ = rx.changed() => break,
                }
            }
        });

        Sweeper {
            shutdown,
            task: Some(task),
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("durable", &self.durable.is_some())
            .finish()
    }
}

/// Handle to a running sweep task.
#[derive(Debug)]
pub struct Sweeper {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl Sweeper {
    /// Signal the task and wait for it to exit.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
