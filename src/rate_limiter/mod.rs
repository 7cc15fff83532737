//! # Rate Limiter Module
//!
//! Internal implementation of the waiting rate limiter, organized into
//! submodules, each responsible for one aspect of the system.
//!
//! ## Module Structure
//!
//! ```text
//!     rate_limiter/
//!     ├── mod.rs          (You are here - Module organization)
//!     ├── config.rs       (Quota, window, bucket and margin settings)
//!     ├── core.rs         (The suspending admission gate)
//!     ├── error.rs        (InvalidArgument / Cancelled taxonomy)
//!     ├── manager.rs      (Per-key limiter management)
//!     ├── metrics.rs      (Wait and occupancy monitoring)
//!     └── utils.rs        (Jump-proof clock helpers)
//! ```
//!
//! ## Component Responsibilities
//!
//! - **config**: Defines the quota shape (rolling window, calendar bucket,
//!   safety margin) and validates it
//! - **core**: Implements the lock-then-sleep acquire loop over the two
//!   bounds
//! - **error**: The crate's two-variant error taxonomy
//! - **manager**: Manages independent limiters for several endpoints
//! - **metrics**: Tracks grants, sleep rounds and occupancy
//! - **utils**: Monotonic wall-anchored clock and bucket truncation

// Declare submodules (internal organization)
mod config;
mod core;
mod error;
mod manager;
mod metrics;
mod utils;

// Re-export public types for external use
// These are the types that users of the library will interact with

/// Configuration types for customizing limiter behavior
pub use config::{RateLimiterConfig, DEFAULT_MINUTE_BUCKET, DEFAULT_SAFETY_MARGIN};

/// The suspending rate limiter itself
pub use self::core::RateLimiter;

/// Error taxonomy and result alias
pub use error::{RateLimitError, Result};

/// Per-key limiter management for callers fronting several endpoints
pub use manager::{KeyedRateLimiterManager, ManagerStats};

/// Metrics and health monitoring for observability
pub use metrics::{HealthStatus, RateLimiterMetrics};

/// Clock helpers shared with tests and callers that bucket timestamps
pub use utils::{bucket_floor_ms, current_time_ms};
