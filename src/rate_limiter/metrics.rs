//! Performance monitoring and health analysis for the limiter.
//!
//! A waiting limiter never rejects, so the interesting signals are not
//! rejection counts but how often callers had to sleep and how long the
//! computed waits got. Sustained long waits mean demand exceeds the
//! downstream quota and the caller population should shrink or the quota
//! should grow.
//!
//! ```text
//!     Metrics at a glance:
//!
//!     ┌──────────────────────────────────────┐
//!     │  Granted: 412    Waits: 96           │
//!     │  Window: 7/8     Minute: 8/8         │
//!     │  Longest computed wait: 41.2s        │
//!     │  Health: ⚠️ Degraded                  │
//!     └──────────────────────────────────────┘
//! ```

use std::fmt;

/// Snapshot of a limiter's counters and occupancy.
///
/// Counters are cumulative since construction; occupancy gauges reflect
/// the state after the most recent decision pass.
///
/// ## Example
///
/// ```rust
/// use pacer::RateLimiter;
/// use std::time::Duration;
///
/// # async fn demo() -> pacer::Result<()> {
/// let limiter = RateLimiter::new(8, Duration::from_secs(60))?;
/// limiter.acquire().await?;
///
/// let metrics = limiter.metrics();
/// println!("{}", metrics.summary());
/// if metrics.is_saturated() {
///     // Every slot in the current window is spoken for.
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RateLimiterMetrics {
    /// Total permits granted since construction.
    pub total_granted: u64,

    /// Total sleep rounds taken by callers. One `acquire` can contribute
    /// several if it loses the re-check race after waking.
    pub total_waits: u64,

    /// Total acquires that returned cancelled instead of a grant.
    pub total_cancelled: u64,

    /// Grants currently live in the rolling window.
    pub window_occupancy: u32,

    /// Grants issued in the current calendar bucket.
    pub minute_requests: u32,

    /// The configured quota size (bound for both gauges above).
    pub max_requests: u32,

    /// Longest single computed wait observed, in milliseconds. This is
    /// the wait as computed at decision time, excluding the safety margin.
    pub max_wait_ms: u64,
}

impl RateLimiterMetrics {
    /// Fraction of decision passes that ended in a sleep rather than an
    /// immediate grant, 0.0 to 1.0.
    ///
    /// A high wait rate means callers are routinely arriving faster than
    /// the quota drains.
    #[inline]
    pub fn wait_rate(&self) -> f64 {
        let total = self.total_granted + self.total_waits;
        if total == 0 {
            0.0
        } else {
            self.total_waits as f64 / total as f64
        }
    }

    /// How full the rolling window is, 0.0 (empty) to 1.0 (no slot free).
    #[inline]
    pub fn window_utilization(&self) -> f64 {
        if self.max_requests == 0 {
            0.0
        } else {
            self.window_occupancy as f64 / self.max_requests as f64
        }
    }

    /// How much of the calendar bucket's cap has been consumed, 0.0 to 1.0.
    #[inline]
    pub fn minute_utilization(&self) -> f64 {
        if self.max_requests == 0 {
            0.0
        } else {
            self.minute_requests as f64 / self.max_requests as f64
        }
    }

    /// True when every slot in the rolling window or the calendar bucket
    /// is currently consumed: the next caller will wait.
    #[inline]
    pub fn is_saturated(&self) -> bool {
        self.window_occupancy >= self.max_requests || self.minute_requests >= self.max_requests
    }

    /// Longest computed wait in seconds, for display.
    #[inline]
    pub fn max_wait_secs(&self) -> f64 {
        self.max_wait_ms as f64 / 1000.0
    }

    /// Total acquire outcomes observed (grants plus cancellations).
    #[inline]
    pub fn total_completed(&self) -> u64 {
        self.total_granted + self.total_cancelled
    }

    /// Three-level health assessment.
    ///
    /// - **Healthy**: callers mostly pass straight through.
    /// - **Degraded**: the limiter is saturated right now, or callers wait
    ///   more often than not.
    /// - **Critical**: waits dominate (over 80% of passes sleep) — demand
    ///   persistently exceeds the downstream quota.
    pub fn health_status(&self) -> HealthStatus {
        if self.wait_rate() > 0.8 {
            HealthStatus::Critical
        } else if self.is_saturated() || self.wait_rate() > 0.5 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    /// Generates a human-readable summary suitable for logging.
    ///
    /// # Example Output
    ///
    /// ```text
    /// RateLimiter Metrics:
    /// ├─ Throughput:
    /// │  ├─ Granted: 412
    /// │  ├─ Sleep Rounds: 96
    /// │  └─ Cancelled: 3
    /// ├─ Occupancy:
    /// │  ├─ Rolling Window: 7/8
    /// │  └─ Calendar Bucket: 8/8
    /// └─ Health:
    ///    ├─ Wait Rate: 18.90%
    ///    ├─ Longest Wait: 41.200s
    ///    └─ Status: Degraded
    /// ```
    pub fn summary(&self) -> String {
        format!(
            "RateLimiter Metrics:\n\
             ├─ Throughput:\n\
             │  ├─ Granted: {}\n\
             │  ├─ Sleep Rounds: {}\n\
             │  └─ Cancelled: {}\n\
             ├─ Occupancy:\n\
             │  ├─ Rolling Window: {}/{}\n\
             │  └─ Calendar Bucket: {}/{}\n\
             └─ Health:\n\
                ├─ Wait Rate: {:.2}%\n\
                ├─ Longest Wait: {:.3}s\n\
                └─ Status: {:?}",
            self.total_granted,
            self.total_waits,
            self.total_cancelled,
            self.window_occupancy,
            self.max_requests,
            self.minute_requests,
            self.max_requests,
            self.wait_rate() * 100.0,
            self.max_wait_secs(),
            self.health_status(),
        )
    }
}

impl fmt::Display for RateLimiterMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

/// Health indicator derived from a metrics snapshot.
///
/// ```text
///     Healthy ──────► Callers pass through with little waiting
///        │
///     Degraded ─────► Saturated now, or waits on most passes
///        │
///     Critical ─────► Demand persistently exceeds the quota
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Callers mostly pass straight through.
    Healthy,

    /// The current window or bucket is full, or callers wait more often
    /// than not. Recovers on its own if demand eases.
    Degraded,

    /// Waits dominate; sustained demand exceeds the protected quota.
    /// Reduce callers or negotiate a larger quota.
    Critical,
}

impl HealthStatus {
    /// Returns true if the status indicates any problem.
    pub fn is_unhealthy(&self) -> bool {
        !matches!(self, Self::Healthy)
    }

    /// Returns a suggested action for operators.
    pub fn suggested_action(&self) -> &'static str {
        match self {
            Self::Healthy => "No action needed",
            Self::Degraded => "Monitor wait times; demand is near the quota",
            Self::Critical => "Reduce callers or raise the downstream quota",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "✅ Healthy"),
            Self::Degraded => write!(f, "⚠️ Degraded"),
            Self::Critical => write!(f, "🔴 Critical"),
        }
    }
}
