//! Error types for the rate limiter.
//!
//! The limiter has a deliberately small failure surface. Construction can
//! reject an invalid configuration, and a suspended `acquire` can be
//! cancelled before a permit is granted. Everything else resolves by
//! waiting longer, which is not an error.

use thiserror::Error;

/// Errors produced by the rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RateLimitError {
    /// A configuration value was rejected at construction time.
    ///
    /// The limiter fails fast instead of silently degrading: a quota of
    /// zero or a zero-length window would make `acquire` either trivially
    /// permissive or wait forever.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The caller's wait was cancelled before a permit was granted.
    ///
    /// Guaranteed to leave the limiter untouched: no grant timestamp is
    /// recorded and the calendar-bucket counter is not incremented on
    /// behalf of the cancelled caller.
    #[error("acquire cancelled before a permit was granted")]
    Cancelled,
}

/// Convenience result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RateLimitError>;
