//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
/// Precision and interval values are not validated here; the cache engine
/// rejects them at setup time.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the TCP listener binds to
    pub host: String,
    /// TCP server port
    pub server_port: u16,
    /// Maximum number of connections served concurrently
    pub nbr_workers: usize,
    /// TTL in seconds for SET commands without an explicit expiration
    pub default_ttl: u64,
    /// Bucket precision of the main cache, in seconds
    pub main_precision: u64,
    /// Janitor interval of the main cache, in seconds
    pub main_janitor_interval: u64,
    /// Bucket precision of the frequent-access cache, in seconds
    pub sync_precision: u64,
    /// Janitor interval of the frequent-access cache, in seconds
    pub sync_janitor_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHER_HOST` - Bind address (default: 127.0.0.1)
    /// - `CACHER_PORT` - TCP port (default: 6380)
    /// - `CACHER_NBR_WORKERS` - Concurrent connections (default: 64)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `MAIN_CACHE_PRECISION` - Main cache bucket width in seconds (default: 1)
    /// - `MAIN_JANITOR_INTERVAL` - Main janitor period in seconds (default: 1)
    /// - `SYNC_CACHE_PRECISION` - Sync cache bucket width in seconds (default: 1)
    /// - `SYNC_JANITOR_INTERVAL` - Sync janitor period in seconds (default: 1)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env::var("CACHER_HOST").unwrap_or(defaults.host),
            server_port: env_or("CACHER_PORT", defaults.server_port),
            nbr_workers: env_or("CACHER_NBR_WORKERS", defaults.nbr_workers),
            default_ttl: env_or("DEFAULT_TTL", defaults.default_ttl),
            main_precision: env_or("MAIN_CACHE_PRECISION", defaults.main_precision),
            main_janitor_interval: env_or("MAIN_JANITOR_INTERVAL", defaults.main_janitor_interval),
            sync_precision: env_or("SYNC_CACHE_PRECISION", defaults.sync_precision),
            sync_janitor_interval: env_or("SYNC_JANITOR_INTERVAL", defaults.sync_janitor_interval),
        }
    }

    pub fn main_precision(&self) -> Duration {
        Duration::from_secs(self.main_precision)
    }

    pub fn main_janitor_interval(&self) -> Duration {
        Duration::from_secs(self.main_janitor_interval)
    }

    pub fn sync_precision(&self) -> Duration {
        Duration::from_secs(self.sync_precision)
    }

    pub fn sync_janitor_interval(&self) -> Duration {
        Duration::from_secs(self.sync_janitor_interval)
    }

    /// Returns the `host:port` pair the listener binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.server_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            server_port: 6380,
            nbr_workers: 64,
            default_ttl: 300,
            main_precision: 1,
            main_janitor_interval: 1,
            sync_precision: 1,
            sync_janitor_interval: 1,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
