//! Janitor Task
//!
//! Background task that periodically removes expired entries from one cache.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::cache::{Cache, CacheKey, CacheValue};
use crate::error::{CacheError, Result};

/// Smallest accepted period for a [`Janitor`]
pub const MIN_JANITOR_INTERVAL: Duration = Duration::from_secs(1);

// Handle on a running sweep loop
struct Worker {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

// == Janitor ==
/// Periodic sweeper bound to exactly one cache.
///
/// Constructed stopped. [`Janitor::start`] spawns a single tokio task that
/// calls [`Cache::clear_expired`] inline on every tick, so sweeps never
/// overlap. [`Janitor::stop`] signals the task and waits for it to exit.
///
/// `start` must be called from within a tokio runtime.
pub struct Janitor<K: CacheKey, V: CacheValue> {
    cache: Arc<dyn Cache<K, V>>,
    interval: Mutex<Duration>,
    worker: Mutex<Option<Worker>>,
}

impl<K: CacheKey, V: CacheValue> Janitor<K, V> {
    // == Constructor ==
    /// Creates a stopped janitor for `cache`.
    ///
    /// # Arguments
    /// * `cache` - The cache swept on every tick
    /// * `interval` - Period between sweeps
    ///
    /// # Returns
    /// A janitor in the stopped state, or [`CacheError::InvalidInterval`] if
    /// `interval` is shorter than [`MIN_JANITOR_INTERVAL`].
    ///
    /// # Example
    /// ```ignore
    /// let cache: Arc<dyn Cache<String, String>> = Arc::new(MainCache::new(Duration::from_secs(1))?);
    /// let janitor = Janitor::new(cache, Duration::from_secs(1))?;
    /// janitor.start();
    /// // Later, during shutdown:
    /// janitor.stop().await;
    /// ```
    pub fn new(cache: Arc<dyn Cache<K, V>>, interval: Duration) -> Result<Self> {
        validate_interval(interval)?;

        info!(
            "[JANITOR_EVENT] Initializing janitor for {} with interval: {:?}",
            cache.name(),
            interval
        );
        Ok(Self {
            cache,
            interval: Mutex::new(interval),
            worker: Mutex::new(None),
        })
    }

    fn worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn interval(&self) -> Duration {
        *self.interval.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.worker().is_some()
    }

    pub fn name(&self) -> String {
        format!("Janitor for {}", self.cache.name())
    }

    // == Start ==
    /// Spawns the sweep loop. No-op with a warning when already running.
    pub fn start(&self) {
        let mut worker = self.worker();
        if worker.is_some() {
            warn!("[JANITOR_EVENT] {} is already running!", self.name());
            return;
        }

        let interval = self.interval();
        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run(Arc::clone(&self.cache), interval, self.name(), shutdown_rx));
        *worker = Some(Worker { shutdown, handle });

        info!("[JANITOR_EVENT] {} started", self.name());
    }

    // == Stop ==
    /// Signals the sweep loop and waits until it has exited.
    ///
    /// A sweep already in progress runs to completion first; once this returns
    /// no further sweep will happen. No-op with a warning when stopped.
    pub async fn stop(&self) {
        let Some(worker) = self.worker().take() else {
            warn!("[JANITOR_EVENT] {} is not running!", self.name());
            return;
        };

        info!("[JANITOR_EVENT] Stopping {}...", self.name());
        // The receiver is gone only if the task already exited
        let _ = worker.shutdown.send(());
        if let Err(e) = worker.handle.await {
            error!("[JANITOR_EVENT] {} exited abnormally: {}", self.name(), e);
        }
        info!("[JANITOR_EVENT] {} stopped", self.name());
    }

    // == Adjust Interval ==
    /// Stops the janitor, replaces its interval and starts it again.
    ///
    /// Not atomic with respect to concurrent `start`/`stop` calls.
    pub async fn adjust_interval(&self, interval: Duration) -> Result<()> {
        validate_interval(interval)?;

        info!(
            "[JANITOR_EVENT] Adjusting interval for {} from {:?} to {:?}",
            self.name(),
            self.interval(),
            interval
        );
        self.stop().await;
        *self.interval.lock().unwrap_or_else(PoisonError::into_inner) = interval;
        self.start();
        Ok(())
    }
}

fn validate_interval(interval: Duration) -> Result<()> {
    if interval < MIN_JANITOR_INTERVAL {
        let err = CacheError::InvalidInterval {
            interval,
            min: MIN_JANITOR_INTERVAL,
        };
        error!("[JANITOR_EVENT] {}", err);
        return Err(err);
    }
    Ok(())
}

// Sweep loop. Cancellation is checked between ticks only.
async fn run<K: CacheKey, V: CacheValue>(
    cache: Arc<dyn Cache<K, V>>,
    interval: Duration,
    name: String,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                debug!("[JANITOR_EVENT] {} running...", name);
                // Sweeps take blocking locks; awaiting here keeps them from overlapping.
                let sweep = Arc::clone(&cache);
                match tokio::task::spawn_blocking(move || sweep.clear_expired()).await {
                    Ok(0) => debug!("[JANITOR_EVENT] {} done, no expired keys found", name),
                    Ok(removed) => info!("[JANITOR_EVENT] {} done, cleared {} keys", name, removed),
                    Err(e) => error!("[JANITOR_EVENT] {} sweep failed: {}", name, e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheStats, MainCache};
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread::{self, ThreadId};

    /// Cache stub that only counts sweeps and remembers where the last one ran.
    #[derive(Default)]
    struct CountingCache {
        sweeps: AtomicUsize,
        sweep_thread: Mutex<Option<ThreadId>>,
    }

    impl CountingCache {
        fn sweeps(&self) -> usize {
            self.sweeps.load(Ordering::SeqCst)
        }

        fn sweep_thread(&self) -> Option<ThreadId> {
            *self.sweep_thread.lock().unwrap()
        }
    }

    impl Cache<String, String> for CountingCache {
        fn get(&self, _key: &String) -> Option<String> {
            None
        }

        fn set(&self, _key: String, _value: String, _expires_at: DateTime<Utc>) {}

        fn delete(&self, _key: &String) -> bool {
            false
        }

        fn clear_expired_at(&self, _now: DateTime<Utc>) -> usize {
            *self.sweep_thread.lock().unwrap() = Some(thread::current().id());
            self.sweeps.fetch_add(1, Ordering::SeqCst);
            0
        }

        fn clear(&self) {}

        fn len(&self) -> usize {
            0
        }

        fn stats(&self) -> CacheStats {
            CacheStats::default()
        }

        fn name(&self) -> &'static str {
            "Counting Cache"
        }
    }

    fn janitor(cache: &Arc<CountingCache>, secs: u64) -> Janitor<String, String> {
        let cache: Arc<dyn Cache<String, String>> = cache.clone();
        Janitor::new(cache, Duration::from_secs(secs)).unwrap()
    }

    #[test]
    fn test_janitor_rejects_short_interval() {
        let cache: Arc<dyn Cache<String, String>> = Arc::new(CountingCache::default());
        let result = Janitor::new(cache, Duration::from_millis(500));
        assert!(matches!(result, Err(CacheError::InvalidInterval { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_janitor_starts_stopped() {
        let cache = Arc::new(CountingCache::default());
        let janitor = janitor(&cache, 1);

        assert!(!janitor.is_running());
        assert_eq!(janitor.name(), "Janitor for Counting Cache");

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(cache.sweeps(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_janitor_sweeps_every_interval() {
        let cache = Arc::new(CountingCache::default());
        let janitor = janitor(&cache, 1);

        janitor.start();
        assert!(janitor.is_running());

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert!(cache.sweeps() >= 3, "expected 3 sweeps, got {}", cache.sweeps());

        janitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_janitor_sweeps_off_the_runtime_thread() {
        let cache = Arc::new(CountingCache::default());
        let janitor = janitor(&cache, 1);

        janitor.start();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        janitor.stop().await;

        // The test runtime is single threaded, so the sweep ran on the blocking pool
        let swept_on = cache.sweep_thread().expect("no sweep ran");
        assert_ne!(swept_on, thread::current().id());
    }

    #[tokio::test(start_paused = true)]
    async fn test_janitor_no_sweeps_after_stop() {
        let cache = Arc::new(CountingCache::default());
        let janitor = janitor(&cache, 1);

        janitor.start();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        janitor.stop().await;
        assert!(!janitor.is_running());

        let after_stop = cache.sweeps();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(cache.sweeps(), after_stop);
    }

    #[tokio::test(start_paused = true)]
    async fn test_janitor_double_start_and_stop_are_noops() {
        let cache = Arc::new(CountingCache::default());
        let janitor = janitor(&cache, 1);

        janitor.stop().await;
        assert!(!janitor.is_running());

        janitor.start();
        janitor.start();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        // A second loop would have doubled the count
        assert_eq!(cache.sweeps(), 1);

        janitor.stop().await;
        janitor.stop().await;
        assert!(!janitor.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_janitor_restart() {
        let cache = Arc::new(CountingCache::default());
        let janitor = janitor(&cache, 1);

        janitor.start();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        janitor.stop().await;

        janitor.start();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        janitor.stop().await;

        assert_eq!(cache.sweeps(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_janitor_adjust_interval() {
        let cache = Arc::new(CountingCache::default());
        let janitor = janitor(&cache, 1);
        janitor.start();

        janitor.adjust_interval(Duration::from_secs(5)).await.unwrap();
        assert!(janitor.is_running());
        assert_eq!(janitor.interval(), Duration::from_secs(5));

        tokio::time::sleep(Duration::from_millis(4500)).await;
        assert_eq!(cache.sweeps(), 0);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(cache.sweeps(), 1);

        assert!(janitor.adjust_interval(Duration::ZERO).await.is_err());
        assert_eq!(janitor.interval(), Duration::from_secs(5));
        janitor.stop().await;
    }

    #[tokio::test]
    async fn test_janitor_removes_expired_entries() {
        let cache = Arc::new(MainCache::<String, String>::new(Duration::from_secs(1)).unwrap());
        cache.set(
            "expire_soon".to_string(),
            "value".to_string(),
            Utc::now() + chrono::Duration::milliseconds(500),
        );
        cache.set(
            "long_lived".to_string(),
            "value".to_string(),
            Utc::now() + chrono::Duration::seconds(3600),
        );

        let shared: Arc<dyn Cache<String, String>> = cache.clone();
        let janitor = Janitor::new(shared, Duration::from_secs(1)).unwrap();
        janitor.start();

        // Wait for entry to expire and cleanup to run
        tokio::time::sleep(Duration::from_millis(2500)).await;
        janitor.stop().await;

        assert_eq!(cache.len(), 1, "Expired entry should have been cleaned up");
        assert_eq!(cache.get(&"long_lived".to_string()), Some("value".to_string()));
        assert!(cache.stats().expired >= 1);
    }
}
