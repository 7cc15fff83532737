//! Basic usage example: pacing calls to a quota-limited API.
//!
//! Run with: `cargo run --example basic`

use pacer::{RateLimiter, RateLimiterConfig};
use std::time::{Duration, Instant};

#[tokio::main]
async fn main() -> pacer::Result<()> {
    println!("=== Waiting Rate Limiter Example ===\n");

    // A tight quota so the pacing is visible: 3 requests per rolling
    // second (calendar bucket shrunk to match, for demonstration).
    let limiter = RateLimiter::with_config(
        RateLimiterConfig::new(3, Duration::from_secs(1))
            .with_minute_bucket(Duration::from_secs(1)),
    )?;

    let start = Instant::now();
    for i in 1..=9 {
        limiter.acquire().await?;
        println!(
            "   Request {} granted at t={:.2}s",
            i,
            start.elapsed().as_secs_f64()
        );
        fake_api_call().await;
    }

    println!("\n{}", limiter.metrics().summary());
    Ok(())
}

async fn fake_api_call() {
    // Stand-in for the real downstream call.
    tokio::time::sleep(Duration::from_millis(10)).await;
}
