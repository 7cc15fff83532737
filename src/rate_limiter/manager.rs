//! # Keyed Rate Limiter Manager
//!
//! A manager for callers that front several independently rate-limited
//! endpoints. Each key (an endpoint or resource name) gets its own
//! [`RateLimiter`] created on first use from a shared configuration
//! template; the limiters are fully independent, so one saturated
//! endpoint never delays another.
//!
//! ```text
//!     Keyed limiting:
//!
//!     "search"  ──┐
//!     "geocode" ──┼──► Manager ──► per-key RateLimiter
//!     "tiles"   ──┘        │
//!                          ▼
//!                   ┌──────────────┐
//!                   │  DashMap     │
//!                   │  key → RL    │   RL = RateLimiter
//!                   └──────────────┘
//! ```
//!
//! Limiters for endpoints that go quiet are cleaned up periodically so a
//! long-lived process does not accumulate dead entries, and the total
//! number of tracked keys is bounded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    config::RateLimiterConfig,
    core::RateLimiter,
    error::Result,
};

/// Maximum number of keys tracked simultaneously.
///
/// Endpoint names come from the caller's own code, not from untrusted
/// input, so this is a leak guard rather than a DoS defense.
const MAX_TRACKED_KEYS: usize = 4096;

/// Manager for per-key waiting rate limiters.
///
/// ## Usage
///
/// ```rust
/// use pacer::{KeyedRateLimiterManager, RateLimiterConfig};
/// use std::sync::Arc;
///
/// # async fn demo() -> pacer::Result<()> {
/// // Each endpoint gets its own 8-per-minute quota.
/// let config = RateLimiterConfig::per_minute(8);
/// let manager = Arc::new(KeyedRateLimiterManager::new(config)?);
///
/// manager.acquire("search").await?;
/// // ... call the "search" endpoint ...
/// # Ok(())
/// # }
/// ```
///
/// ## Cleanup
///
/// ```rust
/// use pacer::{KeyedRateLimiterManager, RateLimiterConfig};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # fn demo() -> pacer::Result<()> {
/// let manager = Arc::new(KeyedRateLimiterManager::with_cleanup_settings(
///     RateLimiterConfig::per_minute(8),
///     Duration::from_secs(60),  // sweep every minute
///     Duration::from_secs(300), // drop keys idle for 5 minutes
/// )?);
///
/// // Spawn the periodic sweep; cancel the returned token to stop it.
/// # let rt = tokio::runtime::Runtime::new().unwrap();
/// # rt.block_on(async {
/// let (handle, stop) = manager.clone().spawn_cleanup_task();
/// stop.cancel();
/// handle.await.unwrap();
/// # });
/// # Ok(())
/// # }
/// ```
pub struct KeyedRateLimiterManager {
    /// Concurrent map of key to limiter. DashMap shards internally, so
    /// lookups from many tasks do not contend on one lock.
    limiters: DashMap<String, Arc<RateLimiter>, ahash::RandomState>,

    /// Configuration template for limiters created on first use.
    config: RateLimiterConfig,

    /// Interval between cleanup sweeps.
    cleanup_interval: Duration,

    /// Idle time after which a key's limiter is removed (milliseconds).
    inactive_duration_ms: u64,

    /// Limiters created since startup.
    total_created: AtomicU64,

    /// Limiters removed by cleanup since startup.
    total_cleaned: AtomicU64,
}

impl KeyedRateLimiterManager {
    /// Creates a manager with default cleanup settings: sweep every
    /// minute, drop keys idle for five minutes.
    ///
    /// # Errors
    ///
    /// Fails fast if `config` is invalid, so a bad template is caught at
    /// startup rather than on the first request to some endpoint.
    pub fn new(config: RateLimiterConfig) -> Result<Self> {
        Self::with_cleanup_settings(config, Duration::from_secs(60), Duration::from_secs(300))
    }

    /// Creates a manager with explicit cleanup settings.
    ///
    /// # Arguments
    ///
    /// * `config` - Template for per-key limiters
    /// * `cleanup_interval` - Time between sweeps
    /// * `inactive_duration` - Idle time before a key is dropped
    pub fn with_cleanup_settings(
        config: RateLimiterConfig,
        cleanup_interval: Duration,
        inactive_duration: Duration,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            limiters: DashMap::with_hasher(ahash::RandomState::new()),
            config,
            cleanup_interval,
            inactive_duration_ms: inactive_duration.as_millis() as u64,
            total_created: AtomicU64::new(0),
            total_cleaned: AtomicU64::new(0),
        })
    }

    /// Waits for a permit on `key`'s limiter, creating it on first use.
    ///
    /// Same contract as [`RateLimiter::acquire`]: returns once the grant
    /// is recorded.
    pub async fn acquire(&self, key: &str) -> Result<()> {
        self.limiter(key)?.acquire().await
    }

    /// Cancellable variant of [`acquire`](Self::acquire).
    pub async fn acquire_with_cancellation(
        &self,
        key: &str,
        token: &CancellationToken,
    ) -> Result<()> {
        self.limiter(key)?.acquire_with_cancellation(token).await
    }

    /// Checks `key`'s limiter for capacity without waiting.
    pub async fn try_acquire(&self, key: &str) -> bool {
        match self.limiter(key) {
            Ok(limiter) => limiter.try_acquire().await,
            Err(_) => false,
        }
    }

    /// Returns the limiter for `key`, creating it if needed.
    ///
    /// Also usable directly when a caller wants to hold on to one
    /// endpoint's limiter and skip the map lookup per request.
    pub fn limiter(&self, key: &str) -> Result<Arc<RateLimiter>> {
        if let Some(limiter) = self.limiters.get(key) {
            return Ok(limiter.clone());
        }

        if self.limiters.len() >= MAX_TRACKED_KEYS {
            // Make room before inserting; if everything is active the map
            // grows past the bound and we log it rather than failing the
            // caller's request.
            let cleaned = self.cleanup();
            if cleaned == 0 {
                warn!(
                    keys = self.limiters.len(),
                    "tracked key bound exceeded with no idle limiters to drop"
                );
            }
        }

        let entry = self
            .limiters
            .entry(key.to_string())
            .or_try_insert_with(|| {
                debug!(key, "creating limiter for new key");
                self.total_created.fetch_add(1, Ordering::Relaxed);
                RateLimiter::with_config(self.config.clone()).map(Arc::new)
            })?;
        Ok(entry.clone())
    }

    /// Removes limiters that have been idle longer than the configured
    /// inactive duration. Returns how many were dropped.
    pub fn cleanup(&self) -> usize {
        let before = self.limiters.len();
        self.limiters
            .retain(|_, limiter| !limiter.is_inactive(self.inactive_duration_ms));
        // Concurrent inserts during the retain can make the map grow, so
        // the difference is clamped rather than trusted.
        let cleaned = before.saturating_sub(self.limiters.len());
        if cleaned > 0 {
            self.total_cleaned.fetch_add(cleaned as u64, Ordering::Relaxed);
            info!(cleaned, remaining = self.limiters.len(), "cleaned up idle limiters");
        }
        cleaned
    }

    /// Spawns a background task that runs [`cleanup`](Self::cleanup) on
    /// the configured interval. Cancel the returned token to stop it; the
    /// join handle resolves once the task has exited.
    pub fn spawn_cleanup_task(self: Arc<Self>) -> (JoinHandle<()>, CancellationToken) {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = tokio::time::sleep(self.cleanup_interval) => {
                        self.cleanup();
                    }
                }
            }
            debug!("cleanup task stopped");
        });
        (handle, token)
    }

    /// Number of keys currently tracked.
    pub fn active_keys(&self) -> usize {
        self.limiters.len()
    }

    /// Returns lifetime statistics for the manager.
    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            active_keys: self.limiters.len(),
            total_created: self.total_created.load(Ordering::Relaxed),
            total_cleaned: self.total_cleaned.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for KeyedRateLimiterManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedRateLimiterManager")
            .field("active_keys", &self.limiters.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Lifetime statistics for a [`KeyedRateLimiterManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerStats {
    /// Keys currently tracked.
    pub active_keys: usize,
    /// Limiters created since startup.
    pub total_created: u64,
    /// Limiters removed by cleanup since startup.
    pub total_cleaned: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limiter::utils::current_time_ms;

    fn test_config() -> RateLimiterConfig {
        RateLimiterConfig::per_minute(4)
    }

    #[tokio::test]
    async fn test_creates_limiter_per_key() {
        let manager = KeyedRateLimiterManager::new(test_config()).unwrap();

        manager.acquire("search").await.unwrap();
        manager.acquire("geocode").await.unwrap();
        manager.acquire("search").await.unwrap();

        let stats = manager.stats();
        assert_eq!(stats.active_keys, 2);
        assert_eq!(stats.total_created, 2);
        assert_eq!(manager.limiter("search").unwrap().metrics().total_granted, 2);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let manager = KeyedRateLimiterManager::new(test_config()).unwrap();

        // Exhaust one key; the other must still grant immediately.
        for _ in 0..4 {
            assert!(manager.try_acquire("busy").await);
        }
        assert!(!manager.try_acquire("busy").await);
        assert!(manager.try_acquire("idle").await);
    }

    #[tokio::test]
    async fn test_invalid_template_rejected_at_startup() {
        let config = RateLimiterConfig {
            max_requests: 0,
            ..RateLimiterConfig::default()
        };
        assert!(KeyedRateLimiterManager::new(config).is_err());
    }

    #[tokio::test]
    async fn test_cleanup_drops_idle_keys() {
        let manager = KeyedRateLimiterManager::with_cleanup_settings(
            test_config(),
            Duration::from_millis(50),
            Duration::from_millis(100),
        )
        .unwrap();

        manager.acquire("stale").await.unwrap();
        manager.acquire("fresh").await.unwrap();

        tokio::time::sleep(Duration::from_millis(250)).await;
        // Re-touch one key so only the other is idle. The last-access
        // update is throttled, so back-date the stale one explicitly.
        manager.acquire("fresh").await.unwrap();
        manager
            .limiter("stale")
            .unwrap()
            .last_access_ms
            .store(current_time_ms() - 10_000, Ordering::Relaxed);

        let cleaned = manager.cleanup();
        assert_eq!(cleaned, 1);
        assert_eq!(manager.active_keys(), 1);
        assert_eq!(manager.stats().total_cleaned, 1);
    }

    #[tokio::test]
    async fn test_cleanup_task_lifecycle() {
        let manager = Arc::new(
            KeyedRateLimiterManager::with_cleanup_settings(
                test_config(),
                Duration::from_millis(50),
                Duration::from_millis(100),
            )
            .unwrap(),
        );

        manager.acquire("transient").await.unwrap();
        manager
            .limiter("transient")
            .unwrap()
            .last_access_ms
            .store(current_time_ms() - 10_000, Ordering::Relaxed);

        let (handle, stop) = manager.clone().spawn_cleanup_task();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(manager.active_keys(), 0);

        stop.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_debug_impl() {
        let manager = KeyedRateLimiterManager::new(test_config()).unwrap();
        let debug_str = format!("{:?}", manager);
        assert!(debug_str.contains("KeyedRateLimiterManager"));
    }
}
