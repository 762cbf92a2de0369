//! Worker thread monitoring.
//!
//! Every background worker registers a [`WorkerMonitor`] with the shared
//! [`ThreadMonitor`] when it starts. Monitors count finished work per
//! activity, record failures, and flip inactive when the worker exits.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tracing::error;

/// Counters of one worker thread.
pub struct WorkerMonitor {
    name: String,
    thread: String,
    keys: &'static [&'static str],
    counters: Box<[AtomicU64]>,
    errors: AtomicU64,
    last_error: Mutex<Option<String>>,
    active: AtomicBool,
}

impl WorkerMonitor {
    fn new(name: &str, keys: &'static [&'static str]) -> Self {
        let thread = std::thread::current()
            .name()
            .unwrap_or("unnamed")
            .to_string();
        Self {
            name: name.to_string(),
            thread,
            keys,
            counters: keys.iter().map(|_| AtomicU64::new(0)).collect(),
            errors: AtomicU64::new(0),
            last_error: Mutex::new(None),
            active: AtomicBool::new(true),
        }
    }

    /// Pool name, shared by all workers of a pool.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the thread that registered the monitor.
    pub fn thread(&self) -> &str {
        &self.thread
    }

    pub fn keys(&self) -> &[&'static str] {
        self.keys
    }

    pub fn counter(&self, index: usize) -> u64 {
        self.counters
            .get(index)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    pub fn increment(&self, index: usize) {
        if let Some(counter) = self.counters.get(index) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub fn add_error(&self, message: impl fmt::Display) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock() = Some(message.to_string());
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    /// Runs one unit of work. Errors and panics are logged and counted; the
    /// caller keeps going either way. Returns `true` on success.
    pub fn run<E, F>(&self, work: F) -> bool
    where
        E: fmt::Display,
        F: FnOnce() -> Result<(), E>,
    {
        match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                error!(worker = %self.thread, "error in worker: {err}");
                self.add_error(err);
                false
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(worker = %self.thread, "worker task panicked: {message}");
                self.add_error(format_args!("panic: {message}"));
                false
            }
        }
    }
}

impl fmt::Debug for WorkerMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counters: Vec<_> = self
            .keys
            .iter()
            .enumerate()
            .map(|(i, key)| (*key, self.counter(i)))
            .collect();
        f.debug_struct("WorkerMonitor")
            .field("name", &self.name)
            .field("thread", &self.thread)
            .field("counters", &counters)
            .field("errors", &self.error_count())
            .field("active", &self.is_active())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Registry of worker monitors.
#[derive(Default)]
pub struct ThreadMonitor {
    workers: RwLock<Vec<Arc<WorkerMonitor>>>,
}

impl ThreadMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the calling thread under `name` with one counter per key.
    pub fn create(&self, name: &str, keys: &'static [&'static str]) -> Arc<WorkerMonitor> {
        let monitor = Arc::new(WorkerMonitor::new(name, keys));
        self.workers.write().push(Arc::clone(&monitor));
        monitor
    }

    pub fn workers(&self) -> Vec<Arc<WorkerMonitor>> {
        self.workers.read().clone()
    }

    /// Monitors registered under `name`.
    pub fn by_name(&self, name: &str) -> Vec<Arc<WorkerMonitor>> {
        self.workers
            .read()
            .iter()
            .filter(|w| w.name() == name)
            .cloned()
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.workers.read().iter().filter(|w| w.is_active()).count()
    }

    pub fn total_errors(&self) -> u64 {
        self.workers.read().iter().map(|w| w.error_count()).sum()
    }
}

impl fmt::Debug for ThreadMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadMonitor")
            .field("workers", &self.workers.read().len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
