//! Background progress monitor.
//!
//! Consumes coalesced stats snapshots from the scanner's progress channel
//! and redraws a single status line on stderr. Snapshot delivery is
//! best-effort on the producer side, so the monitor tracks only the most
//! recent snapshot and derives a windowed instantaneous speed from its
//! own samples.

use crate::output::{format_bytes, truncate_path};
use bytecheck::StatsSnapshot;
use colored::Colorize;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// How far back the instantaneous speed window reaches.
const SPEED_WINDOW: Duration = Duration::from_secs(3);

/// Redraw cadence.
const REDRAW_INTERVAL: Duration = Duration::from_millis(200);

/// Monitors a snapshot channel in a background thread.
pub struct ProgressMonitor {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<Option<StatsSnapshot>>>,
}

impl ProgressMonitor {
    /// Spawn the monitor over a snapshot receiver.
    #[must_use]
    pub fn spawn(receiver: Receiver<StatsSnapshot>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let handle = std::thread::spawn(move || run_monitor(&receiver, &stop_flag));
        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stop the monitor, clear the progress line, and print a final
    /// summary line from the last snapshot seen.
    pub fn finish(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        let last = self
            .handle
            .take()
            .and_then(|handle| handle.join().ok())
            .flatten();
        if let Some(snapshot) = last {
            clear_line();
            eprintln!(
                "{} {} files, {} dirs, {}, {:.1} MB/s over {:.1}s",
                "final:".cyan(),
                snapshot.files_processed,
                snapshot.dirs_processed,
                format_bytes(snapshot.bytes_processed),
                snapshot.average_speed() / (1024.0 * 1024.0),
                snapshot.elapsed.as_secs_f64(),
            );
        }
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_monitor(
    receiver: &Receiver<StatsSnapshot>,
    stop: &AtomicBool,
) -> Option<StatsSnapshot> {
    let mut samples: VecDeque<(Instant, u64)> = VecDeque::new();
    let mut last: Option<StatsSnapshot> = None;
    let mut drawn = false;

    loop {
        match receiver.recv_timeout(REDRAW_INTERVAL) {
            Ok(snapshot) => {
                samples.push_back((Instant::now(), snapshot.bytes_processed));
                if let Some(cutoff) = Instant::now().checked_sub(SPEED_WINDOW) {
                    while samples.front().is_some_and(|(at, _)| *at < cutoff) {
                        samples.pop_front();
                    }
                }
                last = Some(snapshot);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if stop.load(Ordering::Relaxed) {
            break;
        }
        if let Some(snapshot) = &last {
            draw_line(snapshot, instantaneous_speed(&samples));
            drawn = true;
        }
    }

    // Pick up any snapshots still buffered at shutdown so the final
    // summary reflects the completed run.
    while let Ok(snapshot) = receiver.try_recv() {
        last = Some(snapshot);
    }

    if drawn {
        clear_line();
    }
    last
}

/// Speed over the sample window, bytes per second.
fn instantaneous_speed(samples: &VecDeque<(Instant, u64)>) -> f64 {
    let (Some((oldest_at, oldest_bytes)), Some((newest_at, newest_bytes))) =
        (samples.front(), samples.back())
    else {
        return 0.0;
    };
    let seconds = newest_at.duration_since(*oldest_at).as_secs_f64();
    if seconds <= 0.0 {
        return 0.0;
    }
    newest_bytes.saturating_sub(*oldest_bytes) as f64 / seconds
}

fn draw_line(snapshot: &StatsSnapshot, instant_speed: f64) {
    eprint!(
        "\r{} {} files, {} dirs, {}, speed: {:.1} MB/s (avg: {:.1} MB/s) - {}",
        "progress:".cyan(),
        snapshot.files_processed,
        snapshot.dirs_processed,
        format_bytes(snapshot.bytes_processed),
        instant_speed / (1024.0 * 1024.0),
        snapshot.average_speed() / (1024.0 * 1024.0),
        truncate_path(Path::new(&snapshot.current_file), 50),
    );
}

fn clear_line() {
    eprint!("\r{:120}\r", "");
}
