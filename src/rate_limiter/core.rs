//! # Core Rate Limiter Implementation
//!
//! This module implements the heart of the limiter: a suspending admission
//! gate that makes callers wait for a free slot instead of rejecting them.
//!
//! ## The Two Bounds
//!
//! ```text
//!     Decision order for each caller:
//!
//!     ┌─────────────────────────────┐
//!     │ 1. Calendar bucket full?    │──yes──► wait until the clock-minute
//!     │    (hard wall at :00)       │         boundary
//!     └──────────────┬──────────────┘
//!                    │ no
//!     ┌──────────────▼──────────────┐
//!     │ 2. Rolling window full?     │──yes──► wait until the oldest grant
//!     │    (N per sliding interval) │         leaves the window
//!     └──────────────┬──────────────┘
//!                    │ no
//!                    ▼
//!              record grant, return
//! ```
//!
//! The calendar bucket is checked first on purpose: a caller with quota
//! left in the rolling window but none left in the current clock minute
//! still waits for the calendar boundary, matching providers that reset
//! quotas on the wall clock.
//!
//! ## Locking Discipline
//!
//! All mutable state lives behind a single mutex and is read and written
//! as one atomic unit. The critical section is pure bookkeeping and never
//! suspends; the lock is always released before sleeping, so one caller's
//! wait never serializes the others.
//!
//! ```text
//!     acquire() loop:
//!
//!     lock ──► decide/mutate ──► unlock ──► Granted? ──► return
//!                                   │
//!                                   └────► sleep(wait + margin) ──► retry
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{
    config::RateLimiterConfig,
    error::{RateLimitError, Result},
    metrics::RateLimiterMetrics,
    utils::{bucket_floor_ms, current_time_ms},
};

/// Minimum interval between last-access timestamp updates (milliseconds).
///
/// The last-access time only feeds manager cleanup, so 100 ms granularity
/// is plenty and keeps the atomic store off the per-grant path.
const LAST_ACCESS_UPDATE_INTERVAL_MS: u64 = 100;

/// The four mutable bookkeeping fields, guarded as one unit.
///
/// `timestamps` and `minute_requests` track overlapping but not identical
/// constraints (time-based eviction vs. boundary crossing), so they are
/// kept as two independent structures rather than unified.
struct LimiterState {
    /// Grant instants still active within the rolling window, epoch
    /// milliseconds, FIFO. Insertion order is chronological order; the
    /// deque is never reordered, so it stays sorted ascending.
    timestamps: VecDeque<u64>,

    /// Start of the current calendar bucket, truncated to the bucket
    /// boundary.
    minute_start_ms: u64,

    /// Grants issued since `minute_start_ms`.
    minute_requests: u32,
}

/// Outcome of one locked decision pass.
#[derive(Debug, PartialEq, Eq)]
enum Decision {
    /// A permit was recorded; the caller may proceed immediately.
    Granted,
    /// No capacity; the caller should sleep this many milliseconds
    /// (plus the safety margin) and re-run the decision.
    Wait(u64),
}

/// A suspending rate limiter enforcing a rolling-window quota and a
/// calendar-minute cap.
///
/// One instance protects one downstream resource. [`acquire`] returns only
/// once a permit has been recorded; there is no companion release call
/// because permits are consumed at issuance. Instances are fully
/// independent and share no global state.
///
/// ## Fairness
///
/// Grants go to whoever acquires the internal lock and finds capacity.
/// A caller that wakes from its wait re-enters the same contention as a
/// fresh caller and may be overtaken. This weak fairness is a documented
/// property of the design, not a defect: every non-cancelled caller still
/// completes in bounded time because capacity frees up at a fixed rate.
///
/// ## Example
///
/// ```rust
/// use pacer::RateLimiter;
/// use std::time::Duration;
///
/// # async fn demo() -> pacer::Result<()> {
/// // 8 requests per rolling minute, hard-capped per calendar minute.
/// let limiter = RateLimiter::new(8, Duration::from_secs(60))?;
///
/// limiter.acquire().await?;
/// // ... perform exactly one rate-limited API call ...
/// # Ok(())
/// # }
/// ```
///
/// [`acquire`]: RateLimiter::acquire
pub struct RateLimiter {
    /// Exclusive guard over the bookkeeping fields. Held only for the
    /// decision pass, never across a sleep.
    state: Mutex<LimiterState>,

    // Immutable configuration, denormalized to milliseconds.
    max_requests: u32,
    interval_ms: u64,
    minute_bucket_ms: u64,
    safety_margin: Duration,

    /// Timestamp of last use, for manager cleanup of idle limiters.
    pub(crate) last_access_ms: AtomicU64,

    // Metrics counters (relaxed; observability only).
    total_granted: AtomicU64,
    total_waits: AtomicU64,
    total_cancelled: AtomicU64,
    max_wait_ms: AtomicU64,

    // Gauges mirroring the guarded state, refreshed after each decision
    // pass so metrics() can read them without taking the lock.
    window_len: AtomicU32,
    minute_used: AtomicU32,
}

impl RateLimiter {
    /// Creates a new rate limiter with the given quota and rolling-window
    /// length and default calendar bucket (one minute) and safety margin
    /// (100 ms).
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::InvalidArgument`] if `max_requests` is 0
    /// or `interval` is zero. The limiter fails fast rather than silently
    /// degrading.
    ///
    /// # Example
    ///
    /// ```rust
    /// use pacer::RateLimiter;
    /// use std::time::Duration;
    ///
    /// let limiter = RateLimiter::new(8, Duration::from_secs(60)).unwrap();
    /// assert!(RateLimiter::new(0, Duration::from_secs(60)).is_err());
    /// ```
    pub fn new(max_requests: u32, interval: Duration) -> Result<Self> {
        Self::with_config(RateLimiterConfig::new(max_requests, interval))
    }

    /// Creates a new rate limiter from a full configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::InvalidArgument`] if the configuration
    /// fails [`RateLimiterConfig::validate`].
    pub fn with_config(config: RateLimiterConfig) -> Result<Self> {
        config.validate()?;

        let now_ms = current_time_ms();
        let minute_bucket_ms = config.minute_bucket.as_millis() as u64;

        Ok(Self {
            state: Mutex::new(LimiterState {
                // Steady-state occupancy is at most max_requests, but a
                // huge quota should not preallocate a huge deque.
                timestamps: VecDeque::with_capacity(config.max_requests.min(1024) as usize),
                minute_start_ms: bucket_floor_ms(now_ms, minute_bucket_ms),
                minute_requests: 0,
            }),
            max_requests: config.max_requests,
            interval_ms: config.interval.as_millis() as u64,
            minute_bucket_ms,
            safety_margin: config.safety_margin,
            last_access_ms: AtomicU64::new(now_ms),
            total_granted: AtomicU64::new(0),
            total_waits: AtomicU64::new(0),
            total_cancelled: AtomicU64::new(0),
            max_wait_ms: AtomicU64::new(0),
            window_len: AtomicU32::new(0),
            minute_used: AtomicU32::new(0),
        })
    }

    /// Waits until a permit is available, then records it and returns.
    ///
    /// When this returns `Ok(())` the caller is authorized to perform
    /// exactly one unit of rate-limited work immediately; the grant has
    /// already been recorded. The wait is unbounded but finite: capacity
    /// frees up as old grants age out of the rolling window and calendar
    /// buckets roll over.
    ///
    /// The retry loop is internal and invisible: the operation only ever
    /// resolves in a grant. For a cancellable wait, use
    /// [`acquire_with_cancellation`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use pacer::RateLimiter;
    /// use std::time::Duration;
    ///
    /// # async fn demo() -> pacer::Result<()> {
    /// let limiter = RateLimiter::new(2, Duration::from_secs(1))?;
    /// limiter.acquire().await?; // immediate
    /// limiter.acquire().await?; // immediate (2/2 used)
    /// limiter.acquire().await?; // waits ~1s for the oldest grant to expire
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// [`acquire_with_cancellation`]: RateLimiter::acquire_with_cancellation
    pub async fn acquire(&self) -> Result<()> {
        self.acquire_inner(None).await
    }

    /// Like [`acquire`], but the wait can be cancelled.
    ///
    /// On cancellation the call returns [`RateLimitError::Cancelled`] and
    /// is guaranteed not to have recorded a grant: neither the rolling
    /// window nor the calendar-bucket counter is touched on behalf of the
    /// cancelled caller.
    ///
    /// # Example
    ///
    /// ```rust
    /// use pacer::{RateLimitError, RateLimiter};
    /// use std::time::Duration;
    /// use tokio_util::sync::CancellationToken;
    ///
    /// # async fn demo() -> pacer::Result<()> {
    /// let limiter = RateLimiter::new(1, Duration::from_secs(60))?;
    /// let token = CancellationToken::new();
    ///
    /// limiter.acquire().await?; // consume the only slot
    ///
    /// token.cancel();
    /// let result = limiter.acquire_with_cancellation(&token).await;
    /// assert_eq!(result, Err(RateLimitError::Cancelled));
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// [`acquire`]: RateLimiter::acquire
    pub async fn acquire_with_cancellation(&self, token: &CancellationToken) -> Result<()> {
        self.acquire_inner(Some(token)).await
    }

    /// Checks for capacity without waiting.
    ///
    /// Returns `true` and records the grant if both the rolling window and
    /// the calendar bucket have room right now, `false` otherwise. Uses
    /// the exact same decision pass as [`acquire`], so a `true` result
    /// carries the same authorization.
    ///
    /// [`acquire`]: RateLimiter::acquire
    pub async fn try_acquire(&self) -> bool {
        self.touch(current_time_ms());
        let mut state = self.state.lock().await;
        let granted = self.decide(&mut state, current_time_ms()) == Decision::Granted;
        self.refresh_gauges(&state);
        granted
    }

    async fn acquire_inner(&self, token: Option<&CancellationToken>) -> Result<()> {
        loop {
            if let Some(token) = token {
                if token.is_cancelled() {
                    self.total_cancelled.fetch_add(1, Ordering::Relaxed);
                    return Err(RateLimitError::Cancelled);
                }
            }

            let now_ms = current_time_ms();
            self.touch(now_ms);

            // Decision pass under the guard. The guard is dropped at the
            // end of this block, before any waiting occurs.
            let wait_ms = {
                let mut state = self.state.lock().await;
                let decision = self.decide(&mut state, current_time_ms());
                self.refresh_gauges(&state);
                match decision {
                    Decision::Granted => return Ok(()),
                    Decision::Wait(ms) => ms,
                }
            };

            self.total_waits.fetch_add(1, Ordering::Relaxed);
            self.max_wait_ms.fetch_max(wait_ms, Ordering::Relaxed);
            debug!(wait_ms, "rate limit reached, waiting for a slot");

            // Sleep the computed wait plus the margin, then re-run the
            // whole decision. Iteration rather than recursion: the retry
            // count is unbounded under contention.
            let pause = Duration::from_millis(wait_ms) + self.safety_margin;
            match token {
                Some(token) => {
                    tokio::select! {
                        _ = token.cancelled() => {
                            self.total_cancelled.fetch_add(1, Ordering::Relaxed);
                            debug!("acquire cancelled while waiting");
                            return Err(RateLimitError::Cancelled);
                        }
                        _ = tokio::time::sleep(pause) => {}
                    }
                }
                None => tokio::time::sleep(pause).await,
            }
        }
    }

    /// One decision pass, run at instant `now_ms` with the guard held.
    ///
    /// Rolls the calendar bucket forward, lazily evicts grants that have
    /// aged out of the rolling window, then either records a grant or
    /// computes how long the caller must wait. Never suspends.
    fn decide(&self, state: &mut LimiterState, now_ms: u64) -> Decision {
        // Calendar bucket rollover: crossing into a new bucket resets the
        // counter and advances the anchor to the boundary containing now.
        if now_ms >= state.minute_start_ms + self.minute_bucket_ms {
            state.minute_start_ms = bucket_floor_ms(now_ms, self.minute_bucket_ms);
            state.minute_requests = 0;
        }

        // Lazy eviction: drop grants strictly older than the window.
        while let Some(&oldest) = state.timestamps.front() {
            if oldest + self.interval_ms < now_ms {
                state.timestamps.pop_front();
            } else {
                break;
            }
        }

        // The calendar cap is checked before the rolling window: a caller
        // with window quota left but none in the current clock minute
        // still waits for the calendar boundary.
        if state.minute_requests >= self.max_requests {
            let bucket_end = state.minute_start_ms + self.minute_bucket_ms;
            return Decision::Wait(bucket_end.saturating_sub(now_ms));
        }

        if state.timestamps.len() >= self.max_requests as usize {
            if let Some(&earliest) = state.timestamps.front() {
                let wait_ms = (earliest + self.interval_ms).saturating_sub(now_ms);
                if wait_ms > 0 {
                    return Decision::Wait(wait_ms);
                }
                // The window vacated a slot by decision time (the head
                // expires exactly at now). Evict it and grant in the same
                // pass; the calendar cap was already cleared above.
                state.timestamps.pop_front();
            }
        }

        state.timestamps.push_back(now_ms);
        state.minute_requests += 1;
        self.total_granted.fetch_add(1, Ordering::Relaxed);
        trace!(
            window = state.timestamps.len(),
            minute = state.minute_requests,
            "permit granted"
        );
        Decision::Granted
    }

    /// Mirrors the guarded occupancy into lock-free gauges for metrics.
    fn refresh_gauges(&self, state: &LimiterState) {
        self.window_len
            .store(state.timestamps.len() as u32, Ordering::Relaxed);
        self.minute_used
            .store(state.minute_requests, Ordering::Relaxed);
    }

    /// Updates the last-access timestamp, throttled to reduce contention
    /// on the atomic.
    fn touch(&self, now_ms: u64) {
        let last = self.last_access_ms.load(Ordering::Relaxed);
        if now_ms.saturating_sub(last) > LAST_ACCESS_UPDATE_INTERVAL_MS {
            self.last_access_ms.store(now_ms, Ordering::Relaxed);
        }
    }

    /// Checks if the limiter has been idle for at least the given
    /// duration. Used by the keyed manager to clean up limiters for
    /// endpoints that are no longer being called.
    pub fn is_inactive(&self, inactive_duration_ms: u64) -> bool {
        let now_ms = current_time_ms();
        let last_ms = self.last_access_ms.load(Ordering::Relaxed);
        now_ms.saturating_sub(last_ms) > inactive_duration_ms
    }

    /// Returns the configured quota size.
    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Returns the configured rolling-window length.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Returns a snapshot of the limiter's counters and occupancy.
    ///
    /// # Example
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
    /// assert_eq!(metrics.total_granted, 1);
    /// assert_eq!(metrics.window_occupancy, 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn metrics(&self) -> RateLimiterMetrics {
        RateLimiterMetrics {
            total_granted: self.total_granted.load(Ordering::Relaxed),
            total_waits: self.total_waits.load(Ordering::Relaxed),
            total_cancelled: self.total_cancelled.load(Ordering::Relaxed),
            window_occupancy: self.window_len.load(Ordering::Relaxed),
            minute_requests: self.minute_used.load(Ordering::Relaxed),
            max_requests: self.max_requests,
            max_wait_ms: self.max_wait_ms.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_requests", &self.max_requests)
            .field("interval_ms", &self.interval_ms)
            .field("minute_bucket_ms", &self.minute_bucket_ms)
            .field("window_occupancy", &self.window_len.load(Ordering::Relaxed))
            .finish()
    }
}
