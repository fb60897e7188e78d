//! Error types for the cache server
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache server.
///
/// Only configuration problems and protocol misuse become errors. Per-key
/// runtime conditions (miss, double delete, past expiration) are absorbed by
/// the caches and reported through logs instead.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Records precision below the allowed minimum
    #[error("Invalid precision {precision:?}: must be at least {min:?}")]
    InvalidPrecision { precision: Duration, min: Duration },

    /// Janitor interval below the allowed minimum
    #[error("Invalid janitor interval {interval:?}: must be at least {min:?}")]
    InvalidInterval { interval: Duration, min: Duration },

    /// A janitor was requested for a cache that has not been set up
    #[error("Cache not installed: {0}")]
    CacheNotInstalled(&'static str),

    /// Janitor lifecycle call against a janitor that has not been set up
    #[error("Janitor not installed: {0}")]
    JanitorNotInstalled(&'static str),

    /// A command was routed to a cache that has not been set up
    #[error("cache unavailable: {0}")]
    CacheUnavailable(&'static str),

    /// Unknown command name
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Known command with bad arguments or options
    #[error("invalid usage of {command}: {usage}")]
    InvalidUsage {
        command: &'static str,
        usage: &'static str,
    },

    /// Network I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// == Result Type Alias ==
/// Convenience Result type for the cache server.
pub type Result<T> = std::result::Result<T, CacheError>;
