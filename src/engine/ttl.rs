//! LETHE - Time-To-Live (TTL) Expiration
//! Proactive, timer-driven removal of keys whose TTL has elapsed.
//!
//! ## Design
//! - One registration per key: `Key -> (deadline, generation)`
//! - A reverse index `BTreeSet<(deadline, generation, Key)>` orders pending
//!   deadlines so a single worker thread can sleep until the earliest one
//! - Re-arming a key replaces its registration (refresh, never stack)
//! - Generations make stale fires harmless: bookkeeping is only cleared if
//!   the registration that fired is still the current one
//! - A callback may ask for a retry; the registration is then re-queued
//!   under the same generation, unless it was replaced meanwhile
//!
//! ## Locking
//! The worker drops its own lock before running the expiry callback, so the
//! callback may take the dataset lock freely. Callers may hold the dataset
//! lock while arming or cancelling; the reverse nesting never happens.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::types::{Key, MAX_TTL};

/// Callback invoked by the worker for each key whose registration fired.
/// Returning `Some(delay)` fires the same registration again after `delay`.
pub type ExpireCallback = Box<dyn Fn(&str) -> Option<Duration> + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy)]
struct Registration {
    deadline: Instant,
    generation: u64,
}

#[derive(Default)]
struct TimerState {
    registrations: HashMap<Key, Registration>,
    queue: BTreeSet<(Instant, u64, Key)>,
    next_generation: u64,
    stopped: bool,
}

impl TimerState {
    fn unregister(&mut self, key: &str) -> Option<Registration> {
        let (key, reg) = self.registrations.remove_entry(key)?;
        self.queue.remove(&(reg.deadline, reg.generation, key));
        Some(reg)
    }

    /// Pop every queue entry due at `now`. Bookkeeping stays until the
    /// callback has run, see [`TimerState::release`].
    fn take_due(&mut self, now: Instant) -> Vec<(Key, u64)> {
        let mut due = Vec::new();
        while let Some((deadline, _, _)) = self.queue.first() {
            if *deadline > now {
                break;
            }
            if let Some((_, generation, key)) = self.queue.pop_first() {
                due.push((key, generation));
            }
        }
        due
    }

    fn release(&mut self, key: &str, generation: u64) {
        if self
            .registrations
            .get(key)
            .is_some_and(|reg| reg.generation == generation)
        {
            self.registrations.remove(key);
        }
    }

    fn requeue(&mut self, key: &str, generation: u64, deadline: Instant) {
        match self.registrations.get_mut(key) {
            Some(reg) if reg.generation == generation => {
                reg.deadline = deadline;
                self.queue.insert((deadline, generation, key.to_string()));
            }
            _ => {}
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.queue.first().map(|(deadline, _, _)| *deadline)
    }
}

struct Shared {
    state: Mutex<TimerState>,
    wakeup: Condvar,
}

/// Tracks one pending expiration per key and fires them from a background thread.
///
/// Dropping the manager stops it; a callback already running at that moment
/// is not waited for.
pub struct ExpirationManager {
    shared: Arc<Shared>,
}

impl ExpirationManager {
    /// Start the manager and its worker thread.
    ///
    /// `on_expire` is called once per fired registration, without any
    /// expiration lock held.
    pub fn start(on_expire: ExpireCallback) -> std::io::Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(TimerState::default()),
            wakeup: Condvar::new(),
        });

        let worker = Arc::clone(&shared);
        thread::Builder::new()
            .name("lethe-expiry".into())
            .spawn(move || run_worker(worker, on_expire))?;

        Ok(Self { shared })
    }

    /// Arm (or re-arm) the registration for `key` to fire after `ttl`.
    /// No-op once the manager is stopped.
    pub fn arm(&self, key: &str, ttl: Duration) {
        let mut state = self.shared.state.lock();
        if state.stopped {
            return;
        }

        state.unregister(key);

        let generation = state.next_generation;
        state.next_generation += 1;
        let deadline = deadline_after(ttl);
        state
            .registrations
            .insert(key.to_string(), Registration { deadline, generation });
        state.queue.insert((deadline, generation, key.to_string()));
        log::debug!("armed expiry for {key:?} in {ttl:?}");

        drop(state);
        self.shared.wakeup.notify_one();
    }

    /// Cancel the registration for `key`, if any.
    pub fn cancel(&self, key: &str) {
        if self.shared.state.lock().unregister(key).is_some() {
            log::debug!("cancelled expiry for {key:?}");
            self.shared.wakeup.notify_one();
        }
    }

    /// Cancel every registration; the manager keeps running.
    pub fn cancel_all(&self) {
        let mut state = self.shared.state.lock();
        state.registrations.clear();
        state.queue.clear();
        drop(state);
        self.shared.wakeup.notify_one();
    }

    /// Stop the manager: cancel everything and refuse further `arm` calls.
    pub fn stop(&self) {
        let mut state = self.shared.state.lock();
        if state.stopped {
            return;
        }
        state.stopped = true;
        let cancelled = state.registrations.len();
        state.registrations.clear();
        state.queue.clear();
        drop(state);

        self.shared.wakeup.notify_one();
        log::debug!("expiration manager stopped ({cancelled} registrations cancelled)");
    }

    /// Returns true once [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        self.shared.state.lock().stopped
    }

    /// Number of armed registrations.
    pub fn pending(&self) -> usize {
        self.shared.state.lock().registrations.len()
    }

    #[cfg(test)]
    fn is_armed(&self, key: &str) -> bool {
        self.shared.state.lock().registrations.contains_key(key)
    }
}

impl Drop for ExpirationManager {
    fn drop(&mut self) {
        self.stop();
    }
}

fn deadline_after(ttl: Duration) -> Instant {
    Instant::now() + ttl.min(MAX_TTL)
}

fn run_worker(shared: Arc<Shared>, on_expire: ExpireCallback) {
    let mut state = shared.state.lock();
    loop {
        if state.stopped {
            break;
        }

        let due = state.take_due(Instant::now());
        if !due.is_empty() {
            let retries: Vec<Option<Duration>> = MutexGuard::unlocked(&mut state, || {
                due.iter().map(|(key, _)| on_expire(key)).collect()
            });
            for ((key, generation), retry) in due.iter().zip(retries) {
                match retry {
                    Some(delay) => state.requeue(key, *generation, deadline_after(delay)),
                    None => state.release(key, *generation),
                }
            }
            continue;
        }

        match state.next_deadline() {
            Some(deadline) => {
                shared.wakeup.wait_until(&mut state, deadline);
            }
            None => shared.wakeup.wait(&mut state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recording_manager() -> (ExpirationManager, Arc<Mutex<Vec<String>>>) {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        let manager = ExpirationManager::start(Box::new(move |key: &str| -> Option<Duration> {
            sink.lock().push(key.to_string());
            None
        }))
        .unwrap();
        (manager, fired)
    }

    #[test]
    fn test_registration_fires_once() {
        let (manager, fired) = recording_manager();
        manager.arm("short", Duration::from_millis(30));
        assert!(manager.is_armed("short"));

        thread::sleep(Duration::from_millis(150));

        assert_eq!(*fired.lock(), vec!["short".to_string()]);
        assert_eq!(manager.pending(), 0);
    }

    #[test]
    fn test_cancel_prevents_fire() {
        let (manager, fired) = recording_manager();
        manager.arm("key", Duration::from_millis(30));
        manager.cancel("key");
        assert_eq!(manager.pending(), 0);

        thread::sleep(Duration::from_millis(100));
        assert!(fired.lock().is_empty());
    }

    #[test]
    fn test_rearm_refreshes_instead_of_stacking() {
        let (manager, fired) = recording_manager();
        manager.arm("key", Duration::from_millis(30));
        manager.arm("key", Duration::from_millis(400));
        assert_eq!(manager.pending(), 1);

        thread::sleep(Duration::from_millis(120));
        assert!(fired.lock().is_empty());
        assert!(manager.is_armed("key"));
    }

    #[test]
    fn test_fires_in_deadline_order() {
        let (manager, fired) = recording_manager();
        manager.arm("late", Duration::from_millis(80));
        manager.arm("early", Duration::from_millis(20));

        thread::sleep(Duration::from_millis(200));
        assert_eq!(*fired.lock(), vec!["early".to_string(), "late".to_string()]);
    }

    #[test]
    fn test_stop_cancels_and_blocks_new_registrations() {
        let (manager, fired) = recording_manager();
        manager.arm("a", Duration::from_millis(30));
        manager.arm("b", Duration::from_millis(30));

        manager.stop();
        assert!(manager.is_stopped());
        assert_eq!(manager.pending(), 0);

        manager.arm("c", Duration::from_millis(10));
        assert_eq!(manager.pending(), 0);

        thread::sleep(Duration::from_millis(100));
        assert!(fired.lock().is_empty());
    }

    #[test]
    fn test_cancel_all_keeps_running() {
        let (manager, fired) = recording_manager();
        manager.arm("a", Duration::from_millis(30));
        manager.arm("b", Duration::from_millis(30));
        manager.cancel_all();
        assert_eq!(manager.pending(), 0);

        manager.arm("c", Duration::from_millis(20));
        thread::sleep(Duration::from_millis(120));
        assert_eq!(*fired.lock(), vec!["c".to_string()]);
    }

    #[test]
    fn test_many_registrations_all_fire() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let manager = ExpirationManager::start(Box::new(move |_: &str| -> Option<Duration> {
            seen.fetch_add(1, Ordering::SeqCst);
            None
        }))
        .unwrap();

        for i in 0..50 {
            manager.arm(&format!("key_{i}"), Duration::from_millis(5));
        }
        thread::sleep(Duration::from_millis(150));
        assert_eq!(count.load(Ordering::SeqCst), 50);
        assert_eq!(manager.pending(), 0);
    }

    #[test]
    fn test_retry_fires_again() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let manager = ExpirationManager::start(Box::new(move |_: &str| {
            match seen.fetch_add(1, Ordering::SeqCst) {
                0 => Some(Duration::from_millis(20)),
                _ => None,
            }
        }))
        .unwrap();

        manager.arm("key", Duration::from_millis(20));
        thread::sleep(Duration::from_millis(200));
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(manager.pending(), 0);
    }

    #[test]
    fn test_retry_dropped_after_cancel() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let manager = ExpirationManager::start(Box::new(move |_: &str| {
            seen.fetch_add(1, Ordering::SeqCst);
            Some(Duration::from_millis(200))
        }))
        .unwrap();

        manager.arm("key", Duration::from_millis(20));
        thread::sleep(Duration::from_millis(80));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(manager.is_armed("key"));

        manager.cancel("key");
        thread::sleep(Duration::from_millis(250));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(manager.pending(), 0);
    }
}
