//! Fallback cache configuration
//!
//! Defaults suit a single-process pipeline; every value can be overridden
//! from the environment with [`FallbackConfig::from_env`].

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Where a failed queue item is reinserted during a drain
///
/// `Front` retries the same item first on the next drain, which bounds how
/// many distinct items are attempted while Primary is unhealthy but lets a
/// poison item block the rest of the backlog until it exhausts its retries.
/// `Back` lets healthy items overtake it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequeuePolicy {
    /// Reinsert at the head of the queue
    #[default]
    Front,
    /// Reinsert at the tail of the queue
    Back,
}

impl FromStr for RequeuePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "front" => Ok(Self::Front),
            "back" => Ok(Self::Back),
            other => Err(format!("unknown requeue policy '{other}' (expected 'front' or 'back')")),
        }
    }
}

/// Configuration for [`FallbackCacheManager`](crate::FallbackCacheManager)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Maximum pending writes held for Primary; the oldest is evicted beyond this
    pub max_queue_size: usize,
    /// Failed drain attempts allowed per item before it is dropped
    pub max_retries: u32,
    /// Minimum spacing between opportunistic drains, and between Primary
    /// retries while it is believed down
    pub retry_interval: Duration,
    /// Items attempted per opportunistic drain
    pub drain_batch_size: usize,
    /// Reinsertion policy for items that fail a drain attempt
    pub requeue_policy: RequeuePolicy,
    /// Number of pending items included in `stats()`
    pub pending_preview: usize,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 1000,
            max_retries: 5,
            retry_interval: Duration::from_secs(60),
            drain_batch_size: 50,
            requeue_policy: RequeuePolicy::Front,
            pending_preview: 5,
        }
    }
}

impl FallbackConfig {
    /// Build a config from `FALLBACK_CACHE_*` environment variables
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `FALLBACK_CACHE_MAX_QUEUE` | `max_queue_size` |
    /// | `FALLBACK_CACHE_MAX_RETRIES` | `max_retries` |
    /// | `FALLBACK_CACHE_RETRY_INTERVAL_SECS` | `retry_interval` |
    /// | `FALLBACK_CACHE_BATCH_SIZE` | `drain_batch_size` |
    /// | `FALLBACK_CACHE_REQUEUE` | `requeue_policy` (`front` / `back`) |
    ///
    /// Unset variables keep their default. Unparseable values are logged
    /// and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_queue_size: env_or("FALLBACK_CACHE_MAX_QUEUE", defaults.max_queue_size),
            max_retries: env_or("FALLBACK_CACHE_MAX_RETRIES", defaults.max_retries),
            retry_interval: Duration::from_secs(env_or(
                "FALLBACK_CACHE_RETRY_INTERVAL_SECS",
                defaults.retry_interval.as_secs(),
            )),
            drain_batch_size: env_or("FALLBACK_CACHE_BATCH_SIZE", defaults.drain_batch_size),
            requeue_policy: env_or("FALLBACK_CACHE_REQUEUE", defaults.requeue_policy),
            pending_preview: defaults.pending_preview,
        }
    }

    /// Set the queue capacity
    #[must_use]
    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    /// Set the per-item retry limit
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the drain and retry interval
    #[must_use]
    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    /// Set the opportunistic drain batch size
    #[must_use]
    pub fn with_drain_batch_size(mut self, drain_batch_size: usize) -> Self {
        self.drain_batch_size = drain_batch_size;
        self
    }

    /// Set the requeue policy
    #[must_use]
    pub fn with_requeue_policy(mut self, requeue_policy: RequeuePolicy) -> Self {
        self.requeue_policy = requeue_policy;
        self
    }
}

fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            warn!(variable = name, value = %raw, error = %e, "Ignoring invalid config value");
            default
        }),
        Err(_) => default,
    }
}
