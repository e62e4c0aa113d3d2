//! Error types for the loading cache library.
//!
//! Precondition violations, key normalization failures, misses on the
//! loading path and loader failures each get their own variant so callers
//! can tell a permanent problem from a recoverable one.

use std::time::Duration;

use thiserror::Error;

/// Opaque error returned by a user-supplied loader.
pub type LoadError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A constructor or maintenance call received an unusable argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The key's type has no string form and no key encoder is configured.
    ///
    /// This is permanent for a given store: retrying the same key fails again.
    #[error("unsupported key type '{0}': configure a key encoder")]
    UnsupportedKeyType(&'static str),

    /// No value is cached and no loader could produce one.
    #[error("key not found: '{0}'")]
    NotFound(String),

    /// The configured loader failed. The original error is the source.
    #[error("loader failed: {0}")]
    Loader(#[source] LoadError),

    /// A task handle did not complete within the requested time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// A background load task panicked or its result was already taken.
    #[error("task failed: {0}")]
    Task(String),
}

impl CacheError {
    /// Returns `true` for misses on the loading path.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }
}

/// A specialized Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
