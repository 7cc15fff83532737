use pacer::{
    bucket_floor_ms, current_time_ms, KeyedRateLimiterManager, RateLimitError, RateLimiter,
    RateLimiterConfig,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// A config where the calendar bucket equals the rolling window, so the
/// two bounds coincide and the window's timing is what is observed.
fn window_config(max_requests: u32, interval: Duration) -> RateLimiterConfig {
    RateLimiterConfig::new(max_requests, interval).with_minute_bucket(interval)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_burst_then_wait_for_window() {
    let limiter = RateLimiter::with_config(
        window_config(2, Duration::from_secs(1)).with_safety_margin(Duration::from_millis(50)),
    )
    .unwrap();

    // The concrete scenario: two immediate grants, the third waits until
    // the oldest grant leaves the one-second window.
    let start = Instant::now();
    limiter.acquire().await.unwrap();
    limiter.acquire().await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(200), "burst must not wait");

    limiter.acquire().await.unwrap();
    let elapsed = start.elapsed();
    assert!(
        elapsed >= Duration::from_millis(850),
        "third grant arrived too early: {elapsed:?}"
    );
    assert!(
        elapsed < Duration::from_millis(1800),
        "third grant arrived too late: {elapsed:?}"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_no_calendar_bucket_ever_exceeds_the_cap() {
    // Grant continuously for several bucket lengths, bucket the grant
    // timestamps by calendar boundary, and verify no bucket exceeds the
    // cap. The rolling window (3 per 150ms) would allow far more than
    // 3 per 400ms bucket, so the calendar cap is what binds here.
    let bucket = Duration::from_millis(400);
    let limiter = Arc::new(
        RateLimiter::with_config(
            RateLimiterConfig::new(3, Duration::from_millis(150))
                .with_minute_bucket(bucket)
                .with_safety_margin(Duration::from_millis(20)),
        )
        .unwrap(),
    );

    let deadline = Instant::now() + Duration::from_millis(1300);
    let mut grant_times = Vec::new();
    while Instant::now() < deadline {
        limiter.acquire().await.unwrap();
        grant_times.push(current_time_ms());
    }

    assert!(grant_times.len() >= 6, "expected sustained grants, got {}", grant_times.len());

    let bucket_ms = bucket.as_millis() as u64;
    let mut counts = std::collections::HashMap::new();
    for t in &grant_times {
        *counts.entry(bucket_floor_ms(*t, bucket_ms)).or_insert(0u32) += 1;
    }
    for (bucket_start, count) in counts {
        assert!(
            count <= 3,
            "calendar bucket at {bucket_start} saw {count} grants, cap is 3"
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_callers_all_complete() {
    // 20 tasks against a quota of 4 per 300ms: every non-cancelled call
    // must resolve in exactly one grant, and total elapsed time must be
    // consistent with ceil(20/4) intervals.
    let interval = Duration::from_millis(300);
    let limiter = Arc::new(
        RateLimiter::with_config(
            window_config(4, interval).with_safety_margin(Duration::from_millis(20)),
        )
        .unwrap(),
    );

    let start = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..20 {
        let limiter = limiter.clone();
        handles.push(tokio::spawn(async move { limiter.acquire().await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    let elapsed = start.elapsed();

    assert_eq!(limiter.metrics().total_granted, 20);
    // ceil(20/4) = 5 capacity periods; the last batch lands after ~4
    // periods at the earliest. Generous upper bound for scheduler noise
    // and margin-induced extra rounds.
    assert!(
        elapsed >= Duration::from_millis(900),
        "20 grants finished implausibly fast: {elapsed:?}"
    );
    assert!(
        elapsed < Duration::from_millis(4000),
        "20 grants took too long: {elapsed:?}"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_calendar_cap_holds_waiters_until_boundary() {
    // Rolling window of 1s but tiny quota per calendar bucket: a caller
    // with window quota left must still wait for the bucket boundary.
    let limiter = RateLimiter::with_config(
        RateLimiterConfig::new(2, Duration::from_millis(100))
            .with_minute_bucket(Duration::from_millis(500))
            .with_safety_margin(Duration::from_millis(20)),
    )
    .unwrap();

    // Align to just past a bucket boundary so both grants land in the
    // same calendar bucket.
    let bucket_ms = 500;
    let now = current_time_ms();
    let into_next = bucket_floor_ms(now, bucket_ms) + bucket_ms - now + 10;
    tokio::time::sleep(Duration::from_millis(into_next)).await;

    limiter.acquire().await.unwrap();
    limiter.acquire().await.unwrap();

    // Third grant needs a fresh calendar bucket even though the 100ms
    // window has long vacated both slots by then.
    let start = Instant::now();
    limiter.acquire().await.unwrap();
    let elapsed = start.elapsed();
    assert!(
        elapsed >= Duration::from_millis(300),
        "third grant should have waited for the bucket boundary: {elapsed:?}"
    );
    assert!(
        elapsed < Duration::from_millis(800),
        "bucket boundary wait overshot: {elapsed:?}"
    );
    assert_eq!(limiter.metrics().total_granted, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancellation_leaves_no_trace() {
    let limiter = Arc::new(
        RateLimiter::with_config(window_config(1, Duration::from_secs(30))).unwrap(),
    );
    limiter.acquire().await.unwrap();

    let token = CancellationToken::new();
    let mut waiters = Vec::new();
    for _ in 0..5 {
        let limiter = limiter.clone();
        let token = token.clone();
        waiters.push(tokio::spawn(async move {
            limiter.acquire_with_cancellation(&token).await
        }));
    }

    tokio::time::sleep(Duration::from_millis(150)).await;
    token.cancel();

    for waiter in waiters {
        assert_eq!(waiter.await.unwrap(), Err(RateLimitError::Cancelled));
    }

    let metrics = limiter.metrics();
    assert_eq!(metrics.total_granted, 1);
    assert_eq!(metrics.window_occupancy, 1);
    assert_eq!(metrics.total_cancelled, 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_independent_limiters_do_not_interfere() {
    let a = RateLimiter::with_config(window_config(1, Duration::from_secs(30))).unwrap();
    let b = RateLimiter::with_config(window_config(1, Duration::from_secs(30))).unwrap();

    a.acquire().await.unwrap();

    // Exhausting `a` must not consume anything from `b`.
    let start = Instant::now();
    b.acquire().await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(100));
    assert!(!a.try_acquire().await);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_waiters_observe_progress_metrics() {
    let limiter = Arc::new(
        RateLimiter::with_config(
            window_config(1, Duration::from_millis(200))
                .with_safety_margin(Duration::from_millis(20)),
        )
        .unwrap(),
    );

    limiter.acquire().await.unwrap();
    limiter.acquire().await.unwrap(); // one full wait round at least

    let metrics = limiter.metrics();
    assert_eq!(metrics.total_granted, 2);
    assert!(metrics.total_waits >= 1);
    assert!(metrics.max_wait_ms > 0);
    assert!(metrics.max_wait_ms <= 200);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_manager_paces_keys_separately() {
    let manager = Arc::new(
        KeyedRateLimiterManager::new(
            RateLimiterConfig::new(2, Duration::from_millis(250))
                .with_minute_bucket(Duration::from_millis(250))
                .with_safety_margin(Duration::from_millis(20)),
        )
        .unwrap(),
    );

    // Saturate "alpha"; "beta" grants stay immediate throughout.
    let start = Instant::now();
    for _ in 0..4 {
        manager.acquire("alpha").await.unwrap();
    }
    let alpha_elapsed = start.elapsed();
    assert!(alpha_elapsed >= Duration::from_millis(200));

    let start = Instant::now();
    manager.acquire("beta").await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(100));

    let stats = manager.stats();
    assert_eq!(stats.active_keys, 2);
    assert_eq!(stats.total_created, 2);
}
