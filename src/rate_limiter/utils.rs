//! Clock helpers for the rate limiter.
//!
//! The limiter needs two things from a clock:
//!
//! 1. A millisecond timestamp that never goes backwards, for the rolling
//!    window of grant instants.
//! 2. A wall-clock anchor, so the calendar bucket can be truncated to real
//!    clock-minute boundaries (providers reset minute quotas on the wall
//!    clock, not on process-relative time).
//!
//! Both are served by one clock: the wall-clock epoch milliseconds are
//! captured once at first use, then advanced with a monotonic [`Instant`].
//! A system clock jump (NTP step, manual adjustment) therefore cannot make
//! the limiter's time run backwards or leap forward.

use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

// Monotonic time base to prevent issues when the system clock jumps.
// We capture the wall-clock epoch milliseconds at first use, then advance
// using a monotonic Instant to compute 'now'.
static START_TIME_BASE: OnceLock<(Instant, u64)> = OnceLock::new();

/// Returns the current time in milliseconds since the UNIX epoch.
///
/// Monotonic after first use: successive calls never return a smaller
/// value, even if the system clock is adjusted. Millisecond precision is
/// sufficient for rate limiting.
///
/// # Example
///
/// ```rust
/// use pacer::current_time_ms;
///
/// let now = current_time_ms();
/// assert!(now > 0);
/// ```
#[inline(always)]
pub fn current_time_ms() -> u64 {
    let (start, base_ms) = START_TIME_BASE.get_or_init(|| {
        let epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        (Instant::now(), epoch_ms)
    });
    base_ms.saturating_add(start.elapsed().as_millis() as u64)
}

/// Truncates an epoch-millisecond timestamp down to a calendar bucket
/// boundary.
///
/// For the default 60 000 ms bucket this is exactly "seconds and
/// sub-seconds zeroed out", i.e. the start of the calendar minute
/// containing `now_ms`.
///
/// # Example
///
/// ```rust
/// use pacer::bucket_floor_ms;
///
/// // 90 500 ms into the epoch, 60 s buckets: minute starts at 60 000.
/// assert_eq!(bucket_floor_ms(90_500, 60_000), 60_000);
/// ```
#[inline(always)]
pub fn bucket_floor_ms(now_ms: u64, bucket_ms: u64) -> u64 {
    if bucket_ms == 0 {
        return now_ms;
    }
    now_ms - (now_ms % bucket_ms)
}
