//! # Rate Limiter Configuration
//!
//! This module provides the configuration structure for customizing limiter
//! behavior. Think of this as the "settings panel" for your rate limiter.
//!
//! ## Key Concepts
//!
//! ### The Two Bounds
//!
//! ```text
//!     Quota Enforcement:
//!
//!     ┌──────────────────────────────────┐
//!     │  Rolling window                  │
//!     │  max_requests per `interval`,    │ ← No burst exceeds the quota
//!     │  measured from any instant       │   over ANY sliding interval
//!     ├──────────────────────────────────┤
//!     │  Calendar bucket                 │
//!     │  max_requests per clock minute   │ ← Matches providers that reset
//!     │  (boundaries at :00 seconds)     │   quotas on the wall clock
//!     └──────────────────────────────────┘
//! ```
//!
//! ### Safety Margin
//!
//! Real clocks and schedulers wake slightly early. Every computed wait gets
//! a small fixed margin added, so a woken caller does not immediately
//! re-fail the exact check it just waited out.

use std::time::Duration;

use super::error::{RateLimitError, Result};

/// Default calendar bucket length: one clock minute.
///
/// Upstream providers typically reset per-minute quotas on the calendar
/// minute, not on a rolling basis. Keep the default unless you are testing.
pub const DEFAULT_MINUTE_BUCKET: Duration = Duration::from_secs(60);

/// Default safety margin added to every computed wait.
///
/// On the order of clock granularity and scheduler wake-up error. Without
/// it, a caller can wake a millisecond early and burn a full extra
/// decision round on the same exhausted quota.
pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_millis(100);

/// Configuration for rate limiter instances.
///
/// The two required parameters are the quota size and the rolling-window
/// length. The calendar bucket and safety margin have sensible defaults
/// and rarely need changing outside of tests.
///
/// ## Examples
///
/// ```rust
/// use pacer::RateLimiterConfig;
/// use std::time::Duration;
///
/// // 8 requests per rolling minute (a typical provider quota)
/// let config = RateLimiterConfig::per_minute(8);
///
/// // 10 requests per rolling second
/// let config = RateLimiterConfig::per_second(10);
///
/// // Custom window
/// let config = RateLimiterConfig::new(100, Duration::from_secs(30));
///
/// // Tighter margin for latency-sensitive callers
/// let config = RateLimiterConfig::per_second(10)
///     .with_safety_margin(Duration::from_millis(20));
/// ```
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum number of permits granted within any rolling window, and
    /// also the hard cap per calendar bucket. Must be greater than zero.
    pub max_requests: u32,

    /// Length of the rolling window the quota applies to. Must be
    /// non-zero.
    pub interval: Duration,

    /// Length of the calendar-aligned bucket. Defaults to one minute,
    /// matching providers that reset quotas on the clock minute.
    /// Configurable so the calendar bound is testable at sub-minute
    /// scale. Must be non-zero.
    pub minute_bucket: Duration,

    /// Extra delay added to every computed wait to absorb clock and
    /// scheduler granularity error. May be zero.
    pub safety_margin: Duration,
}

impl Default for RateLimiterConfig {
    /// Creates a default configuration: 10 requests per rolling second,
    /// one-minute calendar buckets, 100 ms safety margin.
    fn default() -> Self {
        Self {
            max_requests: 10,
            interval: Duration::from_secs(1),
            minute_bucket: DEFAULT_MINUTE_BUCKET,
            safety_margin: DEFAULT_SAFETY_MARGIN,
        }
    }
}

impl RateLimiterConfig {
    /// Creates a new configuration with the given quota and window.
    ///
    /// # Arguments
    ///
    /// * `max_requests` - Quota size (must be > 0)
    /// * `interval` - Rolling-window length (must be non-zero)
    ///
    /// # Example
    ///
    /// ```rust
    /// use pacer::RateLimiterConfig;
    /// use std::time::Duration;
    ///
    /// let config = RateLimiterConfig::new(60, Duration::from_secs(60));
    /// ```
    pub fn new(max_requests: u32, interval: Duration) -> Self {
        Self {
            max_requests,
            interval,
            ..Default::default()
        }
    }

    /// Creates a configuration limiting to `requests_per_second` permits
    /// per rolling second.
    pub fn per_second(requests_per_second: u32) -> Self {
        Self::new(requests_per_second, Duration::from_secs(1))
    }

    /// Creates a configuration limiting to `requests_per_minute` permits
    /// per rolling minute.
    ///
    /// This matches the common provider quota shape: the rolling window
    /// and the calendar bucket are both one minute long, so the calendar
    /// cap acts as the hard wall at clock-minute boundaries.
    ///
    /// # Example
    ///
    /// ```rust
    /// use pacer::RateLimiterConfig;
    ///
    /// let config = RateLimiterConfig::per_minute(8);
    /// assert_eq!(config.max_requests, 8);
    /// ```
    pub fn per_minute(requests_per_minute: u32) -> Self {
        Self::new(requests_per_minute, Duration::from_secs(60))
    }

    /// Sets the safety margin added to every computed wait.
    pub fn with_safety_margin(mut self, margin: Duration) -> Self {
        self.safety_margin = margin;
        self
    }

    /// Sets the calendar bucket length.
    ///
    /// Production callers should keep the one-minute default; shorter
    /// buckets exist so the calendar-aligned bound can be exercised in
    /// tests without minute-long sleeps.
    pub fn with_minute_bucket(mut self, bucket: Duration) -> Self {
        self.minute_bucket = bucket;
        self
    }

    /// Validates the configuration for correctness.
    ///
    /// This is automatically called when creating a rate limiter; the
    /// limiter fails fast on an invalid configuration rather than
    /// degrading silently.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::InvalidArgument`] if:
    /// - `max_requests` is 0
    /// - `interval` is zero
    /// - `minute_bucket` is zero
    ///
    /// # Example
    ///
    /// ```rust
    /// use pacer::RateLimiterConfig;
    /// use std::time::Duration;
    ///
    /// let config = RateLimiterConfig::new(0, Duration::from_secs(1)); // Invalid!
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        if self.max_requests == 0 {
            return Err(RateLimitError::InvalidArgument(
                "max_requests must be greater than 0",
            ));
        }
        if self.interval.is_zero() {
            return Err(RateLimitError::InvalidArgument(
                "interval must be non-zero",
            ));
        }
        if self.minute_bucket.is_zero() {
            return Err(RateLimitError::InvalidArgument(
                "minute_bucket must be non-zero",
            ));
        }
        Ok(())
    }

    /// Returns the sustained rate limit in requests per second implied by
    /// the rolling window.
    ///
    /// Useful for displaying the configured rate to users. Note that the
    /// calendar bucket can make the observed rate lower around clock
    /// boundaries.
    ///
    /// # Example
    ///
    /// ```rust
    /// use pacer::RateLimiterConfig;
    /// use std::time::Duration;
    ///
    /// let config = RateLimiterConfig::new(30, Duration::from_secs(60));
    /// assert_eq!(config.effective_rate_per_second(), 0.5);
    /// ```
    pub fn effective_rate_per_second(&self) -> f64 {
        let interval_ms = self.interval.as_millis() as f64;
        if interval_ms == 0.0 {
            0.0
        } else {
            (self.max_requests as f64 * 1000.0) / interval_ms
        }
    }
}
