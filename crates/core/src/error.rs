//! Error types for the master-detail engine
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Load failures (`SourceLoad`, `DetailFetch`) are recoverable: they are
//! recorded in the controlling table's error slot and surfaced for the
//! presentation layer to render alongside a retry affordance. `Config` is
//! a programmer error and fails fast at validation time.

use thiserror::Error;

/// Result type alias for trellis operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the master-detail engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The one-shot master row fetch failed
    #[error("master source load failed: {0}")]
    SourceLoad(String),

    /// A delta batch fetch for detail rows failed
    #[error("detail fetch failed: {0}")]
    DetailFetch(String),

    /// A required configuration mapping is absent or malformed
    #[error("invalid table configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether the presentation layer may offer a retry for this error.
    ///
    /// Configuration errors are not retryable; re-running the same broken
    /// config cannot succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::SourceLoad(_) | Error::DetailFetch(_))
    }
}
