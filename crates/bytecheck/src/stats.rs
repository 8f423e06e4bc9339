//! Scan progress counters with coalesced snapshot delivery.
//!
//! Workers bump atomic counters from many threads; a dedicated ticker
//! thread publishes an immutable [`StatsSnapshot`] whenever something
//! changed since the last tick. Updates are intentionally coalesced:
//! consumers must cope with lost intermediate values and rely only on
//! counters being monotonic non-decreasing.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Default interval between snapshot deliveries.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Shared counters for one scanner run.
#[derive(Debug)]
pub struct Stats {
    bytes_processed: AtomicU64,
    files_processed: AtomicU64,
    cached_processed: AtomicU64,
    dirs_processed: AtomicU64,
    current_file: Mutex<String>,
    started_at: Mutex<Instant>,
    dirty: AtomicBool,
}

/// Immutable view of the counters at one instant.
#[derive(Debug, Clone, Default)]
pub struct StatsSnapshot {
    /// Total bytes hashed so far.
    pub bytes_processed: u64,
    /// Checksummed children (files and child-manifest reads).
    pub files_processed: u64,
    /// Directories reused from a fresh stored manifest.
    pub cached_processed: u64,
    /// Directories fully scanned.
    pub dirs_processed: u64,
    /// Path currently being hashed.
    pub current_file: String,
    /// Time since the run started.
    pub elapsed: Duration,
}

impl StatsSnapshot {
    /// Overall average throughput in bytes per second.
    #[must_use]
    pub fn average_speed(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.bytes_processed as f64 / secs
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bytes_processed: AtomicU64::new(0),
            files_processed: AtomicU64::new(0),
            cached_processed: AtomicU64::new(0),
            dirs_processed: AtomicU64::new(0),
            current_file: Mutex::new(String::new()),
            started_at: Mutex::new(Instant::now()),
            dirty: AtomicBool::new(false),
        }
    }

    /// Reset all counters and restart the clock.
    pub fn clear(&self) {
        self.bytes_processed.store(0, Ordering::Relaxed);
        self.files_processed.store(0, Ordering::Relaxed);
        self.cached_processed.store(0, Ordering::Relaxed);
        self.dirs_processed.store(0, Ordering::Relaxed);
        if let Ok(mut current) = self.current_file.lock() {
            current.clear();
        }
        if let Ok(mut started) = self.started_at.lock() {
            *started = Instant::now();
        }
        self.dirty.store(false, Ordering::Relaxed);
    }

    pub fn add_bytes_processed(&self, bytes: u64) {
        self.bytes_processed.fetch_add(bytes, Ordering::Relaxed);
        self.mark_dirty();
    }

    pub fn inc_files_processed(&self) {
        self.files_processed.fetch_add(1, Ordering::Relaxed);
        self.mark_dirty();
    }

    pub fn inc_cached_processed(&self) {
        self.cached_processed.fetch_add(1, Ordering::Relaxed);
        self.mark_dirty();
    }

    pub fn inc_dirs_processed(&self) {
        self.dirs_processed.fetch_add(1, Ordering::Relaxed);
        self.mark_dirty();
    }

    pub fn set_current_file(&self, path: &Path) {
        if let Ok(mut current) = self.current_file.lock() {
            *current = path.display().to_string();
        }
        self.mark_dirty();
    }

    #[must_use]
    pub fn bytes_processed(&self) -> u64 {
        self.bytes_processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn files_processed(&self) -> u64 {
        self.files_processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn cached_processed(&self) -> u64 {
        self.cached_processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn dirs_processed(&self) -> u64 {
        self.dirs_processed.load(Ordering::Relaxed)
    }

    /// Capture an owned snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        let current_file = self
            .current_file
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default();
        let elapsed = self
            .started_at
            .lock()
            .map(|started| started.elapsed())
            .unwrap_or_default();
        StatsSnapshot {
            bytes_processed: self.bytes_processed(),
            files_processed: self.files_processed(),
            cached_processed: self.cached_processed(),
            dirs_processed: self.dirs_processed(),
            current_file,
            elapsed,
        }
    }

    /// Start the background ticker. Counters are cleared, an initial
    /// snapshot is delivered immediately, and afterwards `on_update` runs
    /// at most once per `interval` when a mutation happened since the
    /// previous tick.
    pub fn start<F>(self: &Arc<Self>, interval: Duration, on_update: F) -> StatsTicker
    where
        F: Fn(StatsSnapshot) + Send + 'static,
    {
        self.clear();
        on_update(self.snapshot());

        let stats = Arc::clone(self);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let handle = std::thread::spawn(move || loop {
            std::thread::sleep(interval);
            if stop_flag.load(Ordering::Relaxed) {
                // Final drain: always deliver the closing snapshot.
                on_update(stats.snapshot());
                break;
            }
            if stats.dirty.swap(false, Ordering::Relaxed) {
                on_update(stats.snapshot());
            }
        });

        StatsTicker {
            stop,
            handle: Some(handle),
        }
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Relaxed);
    }
}

/// Handle for the background ticker thread started by [`Stats::start`].
#[derive(Debug)]
pub struct StatsTicker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl StatsTicker {
    /// Stop the ticker, delivering one final snapshot before joining.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StatsTicker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn counters_accumulate() {
        let stats = Stats::new();
        stats.add_bytes_processed(100);
        stats.add_bytes_processed(50);
        stats.inc_files_processed();
        stats.inc_dirs_processed();
        stats.inc_cached_processed();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.bytes_processed, 150);
        assert_eq!(snapshot.files_processed, 1);
        assert_eq!(snapshot.dirs_processed, 1);
        assert_eq!(snapshot.cached_processed, 1);
    }

    #[test]
    fn clear_resets_everything() {
        let stats = Stats::new();
        stats.add_bytes_processed(10);
        stats.set_current_file(Path::new("/tmp/x"));
        stats.clear();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.bytes_processed, 0);
        assert!(snapshot.current_file.is_empty());
    }

    #[test]
    fn current_file_tracks_latest_path() {
        let stats = Stats::new();
        stats.set_current_file(Path::new("/a/b.txt"));
        stats.set_current_file(Path::new("/a/c.txt"));
        assert_eq!(stats.snapshot().current_file, "/a/c.txt");
    }

    #[test]
    fn ticker_delivers_initial_and_final_snapshots() {
        let stats = Arc::new(Stats::new());
        let (tx, rx) = mpsc::channel();
        let ticker = stats.start(Duration::from_millis(5), move |snapshot| {
            let _ = tx.send(snapshot);
        });

        // Initial snapshot arrives synchronously from start().
        let first = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(first.bytes_processed, 0);

        stats.add_bytes_processed(42);
        // Wait for a dirty-flag tick.
        let updated = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(updated.bytes_processed, 42);

        ticker.stop();
        // Final drain snapshot.
        let mut last = None;
        while let Ok(snapshot) = rx.try_recv() {
            last = Some(snapshot);
        }
        assert_eq!(last.map(|s| s.bytes_processed), Some(42));
    }

    #[test]
    fn ticker_coalesces_rapid_updates() {
        let stats = Arc::new(Stats::new());
        let (tx, rx) = mpsc::channel();
        let ticker = stats.start(Duration::from_millis(20), move |snapshot| {
            let _ = tx.send(snapshot);
        });
        let _initial = rx.recv_timeout(Duration::from_secs(1)).unwrap();

        for _ in 0..1000 {
            stats.add_bytes_processed(1);
        }
        std::thread::sleep(Duration::from_millis(60));
        ticker.stop();

        let delivered: Vec<_> = rx.try_iter().collect();
        // Far fewer snapshots than mutations, and the final one is complete.
        assert!(delivered.len() < 100);
        assert_eq!(delivered.last().unwrap().bytes_processed, 1000);
    }

    #[test]
    fn average_speed_zero_without_elapsed_time() {
        let snapshot = StatsSnapshot::default();
        assert_eq!(snapshot.average_speed(), 0.0);
    }
}
