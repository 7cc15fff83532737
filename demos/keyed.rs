//! Keyed manager example: independent quotas for several endpoints.
//!
//! Run with: `cargo run --example keyed`

use pacer::{KeyedRateLimiterManager, RateLimiterConfig};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::main]
async fn main() -> pacer::Result<()> {
    println!("=== Keyed Rate Limiter Example ===\n");

    let manager = Arc::new(KeyedRateLimiterManager::new(
        RateLimiterConfig::new(2, Duration::from_secs(1))
            .with_minute_bucket(Duration::from_secs(1)),
    )?);

    // Background cleanup of endpoints that go quiet.
    let (cleanup, stop) = manager.clone().spawn_cleanup_task();

    let start = Instant::now();
    let mut tasks = Vec::new();
    for endpoint in ["search", "geocode", "tiles"] {
        for i in 1..=4 {
            let manager = manager.clone();
            tasks.push(tokio::spawn(async move {
                manager.acquire(endpoint).await?;
                println!(
                    "   {endpoint} call {i} granted at t={:.2}s",
                    start.elapsed().as_secs_f64()
                );
                pacer::Result::Ok(())
            }));
        }
    }
    for task in tasks {
        task.await.expect("task panicked")?;
    }

    let stats = manager.stats();
    println!("\nTracked endpoints: {}", stats.active_keys);
    println!("Limiters created:  {}", stats.total_created);

    stop.cancel();
    cleanup.await.expect("cleanup task panicked");
    Ok(())
}
