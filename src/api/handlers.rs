//! Command Handlers
//!
//! One handler per protocol command. Each resolves its target cache through
//! the [`CacheManager`] and turns the outcome into a [`Response`].

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::cache::CacheManager;
use crate::config::Config;
use crate::error::Result;
use crate::models::Response;

/// Application state shared across all connections.
#[derive(Clone)]
pub struct AppState {
    /// Routes requests to the main or the frequent-access cache
    pub manager: Arc<CacheManager<String, String>>,
    /// TTL in seconds applied when SET carries no expiration
    pub default_ttl: u64,
}

impl AppState {
    pub fn new(manager: Arc<CacheManager<String, String>>, default_ttl: u64) -> Self {
        Self {
            manager,
            default_ttl,
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Installs both caches and their janitors; the janitors are not started.
    pub fn from_config(config: &Config) -> Result<Self> {
        let manager = CacheManager::from_config(config)?;
        Ok(Self::new(Arc::new(manager), config.default_ttl))
    }
}

/// Handler for `GET <key>`
pub fn get_handler(state: &AppState, key: &str, frequent_access: bool) -> Result<Response> {
    let cache = state.manager.cache(frequent_access)?;
    Ok(match cache.get(&key.to_string()) {
        Some(value) => Response::Value(value),
        None => Response::Nil,
    })
}

/// Handler for `SET <key> <value> [-e <seconds>]`
pub fn set_handler(
    state: &AppState,
    key: String,
    value: String,
    expires_in: Option<u64>,
    frequent_access: bool,
) -> Result<Response> {
    let cache = state.manager.cache(frequent_access)?;

    let ttl = expires_in.unwrap_or(state.default_ttl);
    let expires_at = i64::try_from(ttl)
        .ok()
        .filter(|secs| *secs > 0)
        .and_then(Duration::try_seconds)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl));
    let Some(expires_at) = expires_at else {
        return Ok(Response::Error(format!(
            "expiration must be in the future, got {} seconds",
            ttl
        )));
    };

    cache.set(key, value, expires_at);
    Ok(Response::Ok)
}

/// Handler for `DEL <key>`
pub fn delete_handler(state: &AppState, key: &str, frequent_access: bool) -> Result<Response> {
    let cache = state.manager.cache(frequent_access)?;
    let removed = cache.delete(&key.to_string());
    Ok(Response::Integer(i64::from(removed)))
}

/// Handler for `STATS`
pub fn stats_handler(state: &AppState, frequent_access: bool) -> Result<Response> {
    let cache = state.manager.cache(frequent_access)?;
    Ok(Response::Stats(cache.stats()))
}
