//! # Pacer - A Waiting Rate Limiter for Async API Clients
//!
//! A rate limiting library for protecting a downstream API that enforces a
//! fixed request quota. Instead of rejecting or dropping requests when the
//! quota is exhausted, callers **wait**: `acquire().await` suspends the
//! task until a slot is free, then returns with the grant already recorded.
//!
//! ## What Makes This Limiter Different?
//!
//! Most rate limiters answer "may I?" with yes or no and leave the retry
//! logic to you. This one answers "go ahead" — eventually. That fits
//! outbound API clients, where a 429 from the provider is strictly worse
//! than waiting a few seconds on your side.
//!
//! ## The Two Bounds
//!
//! Every permit must clear two quotas at once:
//!
//! ```text
//!     Rolling window (max_requests per interval, sliding):
//!
//!     grants:   ▪   ▪ ▪       ▪     ▪
//!               └────────┬────────┘
//!                any interval-length span holds ≤ max_requests
//!
//!     Calendar bucket (max_requests per clock minute, aligned):
//!
//!     :00 ──────────── :00 ──────────── :00
//!      │ ≤ max_requests │ ≤ max_requests │
//! ```
//!
//! The calendar bucket exists because real providers reset minute quotas
//! on the wall clock, not on a rolling basis. It is checked first: a
//! caller with rolling-window quota left but none in the current clock
//! minute waits for the boundary, matching the provider's actual reset.
//!
//! ## Quick Start
//!
//! ```rust
//! use pacer::RateLimiter;
//! use std::time::Duration;
//!
//! # async fn demo() -> pacer::Result<()> {
//! // Protect an API that allows 8 requests per minute.
//! let limiter = RateLimiter::new(8, Duration::from_secs(60))?;
//!
//! for _ in 0..20 {
//!     limiter.acquire().await?; // suspends when the quota is exhausted
//!     // ... perform exactly one rate-limited call ...
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Cancellable Waits
//!
//! ```rust
//! use pacer::{RateLimitError, RateLimiter};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> pacer::Result<()> {
//! let limiter = RateLimiter::new(8, Duration::from_secs(60))?;
//! let shutdown = CancellationToken::new();
//!
//! match limiter.acquire_with_cancellation(&shutdown).await {
//!     Ok(()) => { /* proceed with the call */ }
//!     Err(RateLimitError::Cancelled) => { /* shutting down; nothing was recorded */ }
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Several Endpoints
//!
//! ```rust
//! use pacer::{KeyedRateLimiterManager, RateLimiterConfig};
//!
//! # async fn demo() -> pacer::Result<()> {
//! let manager = KeyedRateLimiterManager::new(RateLimiterConfig::per_minute(8))?;
//! manager.acquire("search").await?;
//! manager.acquire("geocode").await?; // independent quota
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency Model
//!
//! - Any number of tasks may call `acquire` on one limiter concurrently;
//!   there is no background worker.
//! - The decision pass runs under a single mutex and never suspends; the
//!   lock is released before any sleeping, so one caller's wait never
//!   blocks another's decision.
//! - Fairness is by arrival under the lock, not a strict waiter queue: a
//!   task that wakes from its wait re-contends like a fresh caller and can
//!   be overtaken. This weak fairness is documented, deliberate behavior.
//! - Distinct limiter instances are fully independent.
//!
//! ## What This Crate Does Not Do
//!
//! It does not perform the API call, retry downstream failures, persist
//! state across restarts, or coordinate across processes. It is a
//! single-process, in-memory admission gate.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    missing_debug_implementations
)]
#![forbid(unsafe_code)]

// Internal module
mod rate_limiter;

// Public re-exports
pub use rate_limiter::{
    bucket_floor_ms, current_time_ms, HealthStatus, KeyedRateLimiterManager, ManagerStats,
    RateLimitError, RateLimiter, RateLimiterConfig, RateLimiterMetrics, Result,
    DEFAULT_MINUTE_BUCKET, DEFAULT_SAFETY_MARGIN,
};

/// A rate limiter wrapped in `Arc` for convenient sharing across tasks.
///
/// # Example
/// ```rust
/// use pacer::{RateLimiter, SharedRateLimiter};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn demo() -> pacer::Result<()> {
/// let limiter: SharedRateLimiter =
///     Arc::new(RateLimiter::new(8, Duration::from_secs(60))?);
///
/// let clone = limiter.clone();
/// tokio::spawn(async move {
///     let _ = clone.acquire().await;
/// });
/// # Ok(())
/// # }
/// ```
pub type SharedRateLimiter = std::sync::Arc<RateLimiter>;

/// A keyed manager wrapped in `Arc` for convenient sharing across tasks.
pub type SharedManager = std::sync::Arc<KeyedRateLimiterManager>;

/// Version information for the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Minimum supported Rust version.
pub const MSRV: &str = "1.70.0";

/// Prelude module for convenient imports.
///
/// # Example
/// ```rust
/// use pacer::prelude::*;
/// use std::time::Duration;
///
/// let limiter = RateLimiter::new(8, Duration::from_secs(60)).unwrap();
/// ```
pub mod prelude {
    //! Common imports for typical rate limiting use cases.

    pub use crate::{
        HealthStatus, KeyedRateLimiterManager, ManagerStats, RateLimitError, RateLimiter,
        RateLimiterConfig, RateLimiterMetrics, Result, SharedManager, SharedRateLimiter,
    };
}

/// Builder pattern for creating rate limiters with custom configuration.
///
/// The builder provides a fluent API over [`RateLimiterConfig`] with
/// validation at the end. This is the recommended way to create limiters
/// with non-default calendar buckets or safety margins.
///
/// # Example
///
/// ```rust
/// use pacer::RateLimiterBuilder;
/// use std::time::Duration;
///
/// let limiter = RateLimiterBuilder::new()
///     .max_requests(8)
///     .interval(Duration::from_secs(60))
///     .safety_margin(Duration::from_millis(50))
///     .build();
///
/// // Or use try_build() for error handling
/// let result = RateLimiterBuilder::new()
///     .max_requests(0) // Invalid!
///     .try_build();
/// assert!(result.is_err());
/// ```
#[derive(Debug, Clone)]
pub struct RateLimiterBuilder {
    config: RateLimiterConfig,
}

impl RateLimiterBuilder {
    /// Creates a new builder with the default configuration
    /// (10 requests per rolling second, one-minute calendar buckets,
    /// 100 ms safety margin).
    pub fn new() -> Self {
        Self {
            config: RateLimiterConfig::default(),
        }
    }

    /// Sets the quota size: the maximum number of permits within any
    /// rolling window, and the hard cap per calendar bucket. Must be > 0.
    pub fn max_requests(mut self, max_requests: u32) -> Self {
        self.config.max_requests = max_requests;
        self
    }

    /// Sets the rolling-window length the quota applies to. Must be
    /// non-zero.
    pub fn interval(mut self, interval: std::time::Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Sets the calendar bucket length. Defaults to one minute; mainly
    /// useful for exercising the calendar bound in tests.
    pub fn minute_bucket(mut self, bucket: std::time::Duration) -> Self {
        self.config.minute_bucket = bucket;
        self
    }

    /// Sets the safety margin added to every computed wait.
    pub fn safety_margin(mut self, margin: std::time::Duration) -> Self {
        self.config.safety_margin = margin;
        self
    }

    /// Builds the rate limiter with the configured settings.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid. Use [`try_build`] to
    /// handle errors instead.
    ///
    /// [`try_build`]: RateLimiterBuilder::try_build
    pub fn build(self) -> RateLimiter {
        match RateLimiter::with_config(self.config) {
            Ok(limiter) => limiter,
            Err(e) => panic!("invalid rate limiter configuration: {e}"),
        }
    }

    /// Attempts to build the rate limiter, returning an error if the
    /// configuration is invalid.
    pub fn try_build(self) -> Result<RateLimiter> {
        RateLimiter::with_config(self.config)
    }
}

impl Default for RateLimiterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
