//! Cache Manager Module
//!
//! Owns the main and the frequent-access cache together with their janitors,
//! and routes each request to one of them.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::cache::{Cache, CacheKey, CacheValue, MainCache, SyncCache};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::tasks::Janitor;

const MAIN_CACHE: &str = "Main Cache";
const SYNC_CACHE: &str = "Sync Cache";

// == Cache Manager ==
/// Pairs of (cache, janitor), each installed independently by the setup calls.
///
/// Nothing is shared between the two pairs. Re-installing a cache drops the
/// janitor bound to the previous one, which ends its sweep loop.
pub struct CacheManager<K: CacheKey, V: CacheValue> {
    main: Option<Arc<dyn Cache<K, V>>>,
    sync: Option<Arc<dyn Cache<K, V>>>,
    main_janitor: Option<Janitor<K, V>>,
    sync_janitor: Option<Janitor<K, V>>,
}

impl<K: CacheKey, V: CacheValue> Default for CacheManager<K, V> {
    fn default() -> Self {
        Self {
            main: None,
            sync: None,
            main_janitor: None,
            sync_janitor: None,
        }
    }
}

impl<K: CacheKey, V: CacheValue> CacheManager<K, V> {
    // == Constructor ==
    /// Creates a manager with nothing installed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs both caches and both janitors from `config`.
    ///
    /// Janitors are left stopped; call [`CacheManager::start_janitors`].
    ///
    /// # Arguments
    /// * `config` - Precision and janitor interval for each cache
    ///
    /// # Returns
    /// The ready manager, or the first configuration error encountered
    /// (`InvalidPrecision` or `InvalidInterval`).
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut manager = Self::new();
        manager.setup_main_cache(config.main_precision())?;
        manager.setup_main_cache_janitor(config.main_janitor_interval())?;
        manager.setup_sync_cache(config.sync_precision())?;
        manager.setup_sync_cache_janitor(config.sync_janitor_interval())?;
        Ok(manager)
    }

    // == Get ==
    /// Returns the sync cache when `frequent_access` is set, the main cache
    /// otherwise. `None` means the selected cache was never set up.
    pub fn get(&self, frequent_access: bool) -> Option<Arc<dyn Cache<K, V>>> {
        if frequent_access {
            self.sync.clone()
        } else {
            self.main.clone()
        }
    }

    /// Like [`CacheManager::get`], turning a missing cache into an error.
    pub fn cache(&self, frequent_access: bool) -> Result<Arc<dyn Cache<K, V>>> {
        self.get(frequent_access)
            .ok_or(CacheError::CacheUnavailable(cache_name(frequent_access)))
    }

    pub fn janitor(&self, frequent_access: bool) -> Option<&Janitor<K, V>> {
        if frequent_access {
            self.sync_janitor.as_ref()
        } else {
            self.main_janitor.as_ref()
        }
    }

    // == Setup ==
    /// Installs a fresh main cache, replacing any previous one.
    ///
    /// A janitor bound to the replaced cache is discarded and must be set up
    /// again with [`CacheManager::setup_main_cache_janitor`].
    ///
    /// # Arguments
    /// * `precision` - Width of the expiration buckets, at least [`MIN_PRECISION`](crate::cache::MIN_PRECISION)
    ///
    /// # Returns
    /// `Err(CacheError::InvalidPrecision)` if `precision` is too small, in
    /// which case the installed cache is left untouched.
    pub fn setup_main_cache(&mut self, precision: Duration) -> Result<()> {
        info!("Setting up main cache...");
        let cache: Arc<dyn Cache<K, V>> = Arc::new(MainCache::<K, V>::new(precision)?);
        if self.main_janitor.take().is_some() {
            warn!("Main cache replaced, its janitor was discarded");
        }
        self.main = Some(cache);
        info!("Main cache setup done");
        Ok(())
    }

    /// Installs a fresh frequent-access cache. Same contract as
    /// [`CacheManager::setup_main_cache`].
    pub fn setup_sync_cache(&mut self, precision: Duration) -> Result<()> {
        info!("Setting up sync cache...");
        let cache: Arc<dyn Cache<K, V>> = Arc::new(SyncCache::<K, V>::new(precision)?);
        if self.sync_janitor.take().is_some() {
            warn!("Sync cache replaced, its janitor was discarded");
        }
        self.sync = Some(cache);
        info!("Sync cache setup done");
        Ok(())
    }

    /// Binds a janitor to the installed main cache.
    ///
    /// # Arguments
    /// * `interval` - Period between sweeps, at least [`MIN_JANITOR_INTERVAL`](crate::tasks::MIN_JANITOR_INTERVAL)
    ///
    /// # Returns
    /// `Err(CacheError::CacheNotInstalled)` when no main cache is set up yet,
    /// `Err(CacheError::InvalidInterval)` when `interval` is too short.
    pub fn setup_main_cache_janitor(&mut self, interval: Duration) -> Result<()> {
        info!("Setting up main cache janitor...");
        let cache = self
            .main
            .clone()
            .ok_or(CacheError::CacheNotInstalled(MAIN_CACHE))?;
        self.main_janitor = Some(Janitor::new(cache, interval)?);
        info!("Main cache janitor setup done");
        Ok(())
    }

    /// Binds a janitor to the installed sync cache.
    pub fn setup_sync_cache_janitor(&mut self, interval: Duration) -> Result<()> {
        info!("Setting up sync cache janitor...");
        let cache = self
            .sync
            .clone()
            .ok_or(CacheError::CacheNotInstalled(SYNC_CACHE))?;
        self.sync_janitor = Some(Janitor::new(cache, interval)?);
        info!("Sync cache janitor setup done");
        Ok(())
    }

    // == Janitor Lifecycle ==
    /// Starts every installed janitor.
    ///
    /// An uninstalled janitor does not prevent the other from starting, but
    /// is reported as [`CacheError::JanitorNotInstalled`].
    pub fn start_janitors(&self) -> Result<()> {
        info!("Starting janitors...");
        let mut missing = None;
        for (name, janitor) in self.janitors() {
            match janitor {
                Some(janitor) => janitor.start(),
                None => missing = missing.or(Some(name)),
            }
        }
        match missing {
            Some(name) => Err(CacheError::JanitorNotInstalled(name)),
            None => {
                info!("Janitors started successfully");
                Ok(())
            }
        }
    }

    /// Stops every installed janitor, waiting for each sweep loop to exit.
    pub async fn stop_janitors(&self) -> Result<()> {
        info!("Stopping janitors...");
        let mut missing = None;
        for (name, janitor) in self.janitors() {
            match janitor {
                Some(janitor) => janitor.stop().await,
                None => missing = missing.or(Some(name)),
            }
        }
        match missing {
            Some(name) => Err(CacheError::JanitorNotInstalled(name)),
            None => {
                info!("Janitors stopped successfully");
                Ok(())
            }
        }
    }

    fn janitors(&self) -> [(&'static str, Option<&Janitor<K, V>>); 2] {
        [
            (MAIN_CACHE, self.main_janitor.as_ref()),
            (SYNC_CACHE, self.sync_janitor.as_ref()),
        ]
    }

    // == Clear ==
    /// Clears both caches; an unset cache is skipped with a warning.
    pub fn clear_caches(&self) {
        info!("Clearing caches...");
        for (name, cache) in [(MAIN_CACHE, &self.main), (SYNC_CACHE, &self.sync)] {
            match cache {
                Some(cache) => cache.clear(),
                None => warn!("{} is not set up, nothing to clear", name),
            }
        }
        info!("Caches cleared successfully");
    }
}

fn cache_name(frequent_access: bool) -> &'static str {
    if frequent_access {
        SYNC_CACHE
    } else {
        MAIN_CACHE
    }
}
