//! LETHE - Store Engine
//! Composes the dataset, the expiration manager and snapshot persistence
//! into the store facade shared by every client.
//!
//! ## Concurrency Model
//! - The dataset sits behind one `RwLock`: lookups take a **read lock**,
//!   writes (`set`, `delete`, expired-key removal, `load`) take a **write lock**
//! - The expiration manager keeps its own lock. Writes arm or cancel a
//!   registration while still holding the dataset write lock; the expiration
//!   worker never holds its lock while taking the dataset lock
//! - A `get` that finds an expired key releases its read lock and removes
//!   the key under a separate write lock

pub mod dataset;
pub mod metrics;
pub mod snapshot;
pub mod ttl;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::config::Config;
use crate::error::{LetheError, Result};
use crate::types::{now_ms, Item, Key, Value, MAX_TTL};

use self::dataset::{Dataset, DatasetStats, Lookup};
use self::metrics::EngineMetrics;
use self::ttl::ExpirationManager;

/// The Lethe key-value store.
///
/// Cheap to clone; every clone shares the same dataset. The expiration
/// worker stops when [`shutdown`](Self::shutdown) is called or the last
/// clone is dropped.
///
/// ## Example
/// ```no_run
/// use std::time::Duration;
/// use lethe::{config::Config, engine::Lethe};
///
/// let store = Lethe::open(Config::default()).unwrap();
/// store.set("greeting", "hello", Duration::from_secs(60)).unwrap();
/// assert_eq!(store.get("greeting"), Some("hello".to_string()));
/// store.shutdown();
/// ```
#[derive(Clone)]
pub struct Lethe {
    dataset: Arc<RwLock<Dataset>>,
    expiration: Arc<ExpirationManager>,
    metrics: Arc<EngineMetrics>,
    config: Arc<Config>,
}

impl Lethe {
    /// Create an empty store and start its expiration worker.
    pub fn open(config: Config) -> Result<Self> {
        let dataset = Arc::new(RwLock::new(Dataset::new()));
        let metrics = Arc::new(EngineMetrics::new());

        let weak_dataset = Arc::downgrade(&dataset);
        let timer_metrics = Arc::clone(&metrics);
        let expiration = ExpirationManager::start(Box::new(move |key: &str| -> Option<Duration> {
            let dataset = weak_dataset.upgrade()?;
            expire_on_timer(&dataset, &timer_metrics, key, now_ms())
        }))?;

        log::info!(
            "Lethe store opened (max key length {}, snapshots in {:?})",
            config.max_key_len,
            config.snapshot_dir
        );

        Ok(Self {
            dataset,
            expiration: Arc::new(expiration),
            metrics,
            config: Arc::new(config),
        })
    }

    /// Store `value` under `key`, replacing any previous item.
    ///
    /// A zero `ttl` means the item never expires; otherwise any pending
    /// expiration for `key` is replaced by one `ttl` from now.
    /// A `ttl` longer than [`MAX_TTL`] is rejected.
    pub fn set(&self, key: &str, value: impl Into<Value>, ttl: Duration) -> Result<()> {
        self.validate_key(key)?;
        if ttl > MAX_TTL {
            return Err(LetheError::InvalidTtl(format!(
                "{}s exceeds the {}s limit",
                ttl.as_secs(),
                MAX_TTL.as_secs()
            )));
        }

        let mut dataset = self.dataset.write();
        if ttl.is_zero() {
            dataset.insert(key.to_string(), Item::persistent(value));
            self.expiration.cancel(key);
        } else {
            let ttl_ms = (ttl.as_millis() as u64).max(1);
            let expires_at = now_ms().saturating_add(ttl_ms);
            dataset.insert(key.to_string(), Item::expiring(value, expires_at));
            self.expiration.arm(key, Duration::from_millis(ttl_ms));
        }
        drop(dataset);

        self.metrics.record_set();
        Ok(())
    }

    /// Get the value stored under `key`.
    ///
    /// An item whose TTL has elapsed is removed on the spot and reported
    /// missing, even if its timer has not fired yet.
    pub fn get(&self, key: &str) -> Option<Value> {
        let value = self.read_live(key, |item, _| item.value.clone());
        self.metrics.record_get(value.is_some());
        value
    }

    /// Remaining lifetime of `key`.
    ///
    /// `None` if the key is absent (or expired), `Some(None)` if it has no TTL.
    pub fn ttl(&self, key: &str) -> Option<Option<Duration>> {
        self.read_live(key, |item, now| {
            item.remaining_ms(now).map(Duration::from_millis)
        })
    }

    /// Delete `key` and cancel its pending expiration.
    /// Returns whether a key was removed.
    pub fn delete(&self, key: &str) -> bool {
        let mut dataset = self.dataset.write();
        let removed = dataset.remove(key);
        self.expiration.cancel(key);
        drop(dataset);

        if removed {
            self.metrics.record_delete();
        }
        removed
    }

    /// Number of keys physically present, including expired-but-unswept ones.
    pub fn len(&self) -> usize {
        self.dataset.read().len()
    }

    /// Returns true if no keys are present.
    pub fn is_empty(&self) -> bool {
        self.dataset.read().is_empty()
    }

    /// Total, expired-but-present and active key counts. No side effects.
    pub fn stats(&self) -> DatasetStats {
        self.dataset.read().stats(now_ms())
    }

    /// Write every non-expired item to `path`.
    /// Returns the number of keys written; the dataset is never modified.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let items = self.dataset.read().live_items(now_ms());

        if let Err(err) = snapshot::write_snapshot(path, &items) {
            log::error!("snapshot save to {:?} failed: {}", path, err);
            return Err(err);
        }

        self.metrics.record_save();
        log::info!("saved {} keys to {:?}", items.len(), path);
        Ok(items.len())
    }

    /// Replace the whole dataset with the contents of `path`.
    ///
    /// The file is decoded before anything is touched, so a bad file leaves
    /// the store intact. Entries already expired are dropped; the rest get a
    /// fresh expiration for their remaining lifetime.
    /// Returns the number of keys installed.
    pub fn load_from_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let decoded = match snapshot::read_snapshot(path) {
            Ok(items) => items,
            Err(err) => {
                log::error!("snapshot load from {:?} failed: {}", path, err);
                return Err(err);
            }
        };

        let now = now_ms();
        let total = decoded.len();
        let live: HashMap<Key, Item> = decoded
            .into_iter()
            .filter(|(_, item)| !item.is_expired_at(now))
            .collect();
        let installed = live.len();

        let mut dataset = self.dataset.write();
        self.expiration.cancel_all();
        for (key, item) in &live {
            if let Some(remaining) = item.remaining_ms(now) {
                self.expiration.arm(key, Duration::from_millis(remaining));
            }
        }
        dataset.replace(live);
        drop(dataset);

        self.metrics.record_load();
        log::info!(
            "loaded {} keys from {:?} ({} already expired)",
            installed,
            path,
            total - installed
        );
        Ok(installed)
    }

    /// Save to a timestamped file in the configured snapshot directory.
    pub fn save_snapshot(&self) -> Result<PathBuf> {
        self.config.ensure_dirs()?;
        let name = format!(
            "lethe_snapshot_{}.json",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        );
        let path = self.config.snapshot_dir.join(name);
        self.save_to_file(&path)?;
        Ok(path)
    }

    /// Stop the expiration worker and cancel every pending expiration.
    /// Expired keys are still caught on read afterwards.
    pub fn shutdown(&self) {
        if self.expiration.is_stopped() {
            return;
        }
        self.expiration.stop();
        log::info!("Lethe store shut down{}", self.metrics.report());
    }

    /// Returns true once [`shutdown`](Self::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.expiration.is_stopped()
    }

    /// Number of armed expirations.
    pub fn pending_expirations(&self) -> usize {
        self.expiration.pending()
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    fn validate_key(&self, key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(LetheError::InvalidKey("key must not be empty".into()));
        }
        if key.len() > self.config.max_key_len {
            return Err(LetheError::InvalidKey(format!(
                "key exceeds {} bytes",
                self.config.max_key_len
            )));
        }
        Ok(())
    }

    /// Apply `f` to the live item under `key`, removing it instead if expired.
    fn read_live<T>(&self, key: &str, f: impl FnOnce(&Item, u64) -> T) -> Option<T> {
        let now = now_ms();
        {
            let dataset = self.dataset.read();
            match dataset.lookup(key, now) {
                Lookup::Live(item) => return Some(f(item, now)),
                Lookup::Missing => return None,
                Lookup::Expired => {}
            }
        }

        // Re-checked under the write lock: the key may have been replaced meanwhile.
        let mut dataset = self.dataset.write();
        if dataset.remove_if_expired(key, now_ms()) {
            self.expiration.cancel(key);
            self.metrics.record_lazy_expiration();
            log::debug!("expired {key:?} (on read)");
        }
        None
    }
}

/// Timer-side removal of `key`.
///
/// Returns how much longer to wait when the item is not yet expired by the
/// wall clock, which happens when the clock steps back after arming.
fn expire_on_timer(
    dataset: &RwLock<Dataset>,
    metrics: &EngineMetrics,
    key: &str,
    now: u64,
) -> Option<Duration> {
    let mut dataset = dataset.write();
    if dataset.remove_if_expired(key, now) {
        metrics.record_timer_expiration();
        log::debug!("expired {key:?} (timer)");
        return None;
    }
    let remaining = dataset.item(key)?.remaining_ms(now)?;
    log::debug!("timer for {key:?} fired {remaining}ms early, retrying");
    Some(Duration::from_millis(remaining.max(1)))
}
