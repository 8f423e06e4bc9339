//! Directory-tree scanning: post-order walk plus per-directory checksum
//! fan-out.
//!
//! Directories are visited strictly sequentially in post-order; the work
//! inside one directory is parallel. That split keeps the manifest-chain
//! invariant simple (a child's manifest is always on disk before its
//! parent looks at it) while still saturating I/O on wide directories.

use crate::checksum;
use crate::error::Result;
use crate::manifest::{Entity, HmacKey, Manifest, DEFAULT_MANIFEST_NAME};
use crate::stats::{Stats, StatsSnapshot, DEFAULT_TICK_INTERVAL};
use std::ffi::OsString;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, SyncSender};
use std::sync::Arc;
use std::time::Duration;

pub mod walk;

pub use walk::{walk_post_order, CancelFlag};

/// Scanner configuration.
#[derive(Debug, Clone)]
pub struct ScannerOptions {
    /// Worker threads per directory.
    pub workers: usize,
    /// Manifest file name; excluded from its own entity list.
    pub manifest_name: String,
    /// Reuse stored manifests younger than this, skipping recomputation.
    pub freshness_limit: Option<Duration>,
    /// Progress sink. Sends are non-blocking; snapshots are dropped when
    /// the buffer is full.
    pub progress: Option<SyncSender<StatsSnapshot>>,
    /// Cadence of progress snapshots.
    pub progress_interval: Duration,
}

impl Default for ScannerOptions {
    fn default() -> Self {
        Self {
            workers: default_worker_count(),
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            freshness_limit: None,
            progress: None,
            progress_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

/// Default worker count: leave two cores for the walker and the rest of
/// the system, but never fewer than two workers.
#[must_use]
pub fn default_worker_count() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(4);
    cpus.saturating_sub(2).max(2)
}

/// Walks a tree and produces one [`Manifest`] per directory.
pub struct Scanner {
    options: ScannerOptions,
    stats: Arc<Stats>,
    cancel: CancelFlag,
}

impl Scanner {
    #[must_use]
    pub fn new(options: ScannerOptions) -> Self {
        Self {
            options,
            stats: Arc::new(Stats::new()),
            cancel: CancelFlag::new(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    /// Flag that aborts the walk when set; safe to hand to another thread.
    #[must_use]
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    #[must_use]
    pub fn manifest_name(&self) -> &str {
        &self.options.manifest_name
    }

    #[must_use]
    pub fn freshness_limit(&self) -> Option<Duration> {
        self.options.freshness_limit
    }

    /// Walk `root` post-order, invoking `callback` with each directory's
    /// manifest and whether it was reused from a fresh file on disk.
    ///
    /// The callback owns the manifest and may save, verify, or discard
    /// it. A callback error aborts the walk.
    ///
    /// # Errors
    ///
    /// Propagates I/O failures, HMAC failures from fresh-manifest loads,
    /// callback errors, and cancellation.
    pub fn walk(
        &self,
        root: &Path,
        key: &HmacKey,
        callback: &mut dyn FnMut(&Path, Manifest, bool) -> Result<()>,
    ) -> Result<()> {
        let ticker = match self.options.progress.clone() {
            Some(sender) => Some(self.stats.start(
                self.options.progress_interval,
                move |snapshot| {
                    // Best-effort delivery: never block the scan on a
                    // slow or absent consumer.
                    let _ = sender.try_send(snapshot);
                },
            )),
            None => {
                self.stats.clear();
                None
            }
        };

        let result = walk_post_order(root, &self.cancel, &mut |dir| {
            let (manifest, cached) = self.scan_directory(dir, key)?;
            callback(dir, manifest, cached)
        });

        if let Some(ticker) = ticker {
            ticker.stop();
        }
        result
    }

    /// Produce the manifest for one directory, either from a fresh stored
    /// file or by checksumming its children.
    fn scan_directory(&self, dir: &Path, key: &HmacKey) -> Result<(Manifest, bool)> {
        let manifest_path = dir.join(&self.options.manifest_name);
        if let Some(manifest) =
            Manifest::load_if_fresh(&manifest_path, self.options.freshness_limit, key)?
        {
            self.stats.inc_cached_processed();
            return Ok((manifest, true));
        }

        self.cancel.check()?;
        let manifest_file_name = std::ffi::OsStr::new(&self.options.manifest_name);
        let mut children: Vec<(OsString, bool)> = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if name.as_os_str() == manifest_file_name {
                continue;
            }
            children.push((name, entry.file_type()?.is_dir()));
        }

        let entities = self.checksum_children(dir, &children)?;
        self.stats.inc_dirs_processed();
        Ok((Manifest::new(entities), false))
    }

    /// Fan per-child checksum jobs out to a scoped worker pool. The first
    /// error cancels the remaining jobs for this directory.
    fn checksum_children(&self, dir: &Path, children: &[(OsString, bool)]) -> Result<Vec<Entity>> {
        if children.is_empty() {
            return Ok(Vec::new());
        }
        let workers = self.options.workers.min(children.len()).max(1);
        let next_job = AtomicUsize::new(0);
        let (sender, receiver) = mpsc::channel::<Result<Entity>>();

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let sender = sender.clone();
                let next_job = &next_job;
                scope.spawn(move || loop {
                    let index = next_job.fetch_add(1, Ordering::Relaxed);
                    let Some((name, is_dir)) = children.get(index) else {
                        break;
                    };
                    let result = self.checksum_child(dir, name, *is_dir);
                    // A closed receiver means the collector gave up
                    // after an error; stop picking up jobs.
                    if sender.send(result).is_err() {
                        break;
                    }
                });
            }
            drop(sender);

            let mut entities = Vec::with_capacity(children.len());
            for result in receiver {
                match result {
                    Ok(entity) => entities.push(entity),
                    Err(err) => return Err(err),
                }
            }
            Ok(entities)
        })
    }

    fn checksum_child(&self, dir: &Path, name: &OsString, is_dir: bool) -> Result<Entity> {
        let child_path = dir.join(name);
        // A directory's digest is the digest of its manifest file, which
        // post-order guarantees already exists.
        let hash_path = if is_dir {
            child_path.join(&self.options.manifest_name)
        } else {
            child_path
        };

        let digest = checksum::file_checksum(&hash_path, &self.stats, &self.cancel)?;
        self.stats.inc_files_processed();
        Ok(Entity {
            name: name.to_string_lossy().into_owned(),
            checksum: digest,
            is_dir,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::checksum::bytes_checksum;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn scanner() -> Scanner {
        Scanner::new(ScannerOptions::default())
    }

    fn key() -> HmacKey {
        HmacKey::default()
    }

    /// Walk and save every manifest, mimicking unsigned generation.
    fn generate_tree(scanner: &Scanner, root: &Path) -> HashMap<PathBuf, Manifest> {
        let key = key();
        let mut manifests = HashMap::new();
        scanner
            .walk(root, &key, &mut |dir, mut manifest, cached| {
                if !cached {
                    manifest.save(&dir.join(scanner.manifest_name()), &key)?;
                }
                manifests.insert(dir.to_path_buf(), manifest);
                Ok(())
            })
            .unwrap();
        manifests
    }

    #[test]
    fn single_directory_with_one_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();

        let scanner = scanner();
        let manifests = generate_tree(&scanner, dir.path());

        let manifest = &manifests[dir.path()];
        assert_eq!(manifest.entities.len(), 1);
        assert_eq!(manifest.entities[0].name, "a.txt");
        assert_eq!(manifest.entities[0].checksum, bytes_checksum(b"a"));
        assert!(!manifest.entities[0].is_dir);
    }

    #[test]
    fn manifest_file_is_not_its_own_entity() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.txt"), b"x").unwrap();

        let scanner = scanner();
        // Generate twice: the second run sees the manifest written by the
        // first and must exclude it.
        generate_tree(&scanner, dir.path());
        let scanner = Scanner::new(ScannerOptions::default());
        let manifests = generate_tree(&scanner, dir.path());

        let names: Vec<&str> = manifests[dir.path()]
            .entities
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, vec!["data.txt"]);
    }

    #[test]
    fn directory_entity_hashes_child_manifest_file() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("x.txt"), b"payload").unwrap();

        let scanner = scanner();
        let manifests = generate_tree(&scanner, dir.path());

        let child_manifest_bytes =
            std::fs::read(sub.join(scanner.manifest_name())).unwrap();
        let root = &manifests[dir.path()];
        let sub_entity = root.entities.iter().find(|e| e.name == "sub").unwrap();
        assert!(sub_entity.is_dir);
        assert_eq!(sub_entity.checksum, bytes_checksum(&child_manifest_bytes));
    }

    #[test]
    fn empty_directory_yields_empty_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = scanner();
        let manifests = generate_tree(&scanner, dir.path());
        assert!(manifests[dir.path()].entities.is_empty());
    }

    #[test]
    fn entities_are_sorted_regardless_of_worker_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["zz", "aa", "mm", "bb", "yy", "cc"] {
            std::fs::write(dir.path().join(name), name.as_bytes()).unwrap();
        }

        let scanner = Scanner::new(ScannerOptions {
            workers: 4,
            ..ScannerOptions::default()
        });
        let manifests = generate_tree(&scanner, dir.path());
        let names: Vec<&str> = manifests[dir.path()]
            .entities
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, vec!["aa", "bb", "cc", "mm", "yy", "zz"]);
    }

    #[test]
    fn deterministic_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/inner.txt"), b"inner").unwrap();
        std::fs::write(dir.path().join("top.txt"), b"top").unwrap();

        let first = generate_tree(&Scanner::new(ScannerOptions::default()), dir.path());
        let second = generate_tree(&Scanner::new(ScannerOptions::default()), dir.path());

        for (path, manifest) in &first {
            assert_eq!(
                serde_json::to_string(manifest).unwrap(),
                serde_json::to_string(&second[path]).unwrap(),
                "manifest differs for {}",
                path.display()
            );
        }
    }

    #[test]
    fn stats_count_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/f1"), b"1").unwrap();
        std::fs::write(dir.path().join("f2"), b"22").unwrap();

        let scanner = scanner();
        generate_tree(&scanner, dir.path());

        // Two directories scanned; three checksum jobs ran (f1, f2, and
        // the sub manifest).
        assert_eq!(scanner.stats().dirs_processed(), 2);
        assert_eq!(scanner.stats().files_processed(), 3);
        assert_eq!(scanner.stats().cached_processed(), 0);
        assert!(scanner.stats().bytes_processed() >= 3);
    }

    #[test]
    fn fresh_manifest_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();

        generate_tree(&Scanner::new(ScannerOptions::default()), dir.path());
        let manifest_path = dir.path().join(DEFAULT_MANIFEST_NAME);
        let saved = std::fs::read(&manifest_path).unwrap();

        let cached_scanner = Scanner::new(ScannerOptions {
            freshness_limit: Some(Duration::from_secs(3600)),
            ..ScannerOptions::default()
        });
        let mut cached_flags = Vec::new();
        cached_scanner
            .walk(dir.path(), &key(), &mut |_, _, cached| {
                cached_flags.push(cached);
                Ok(())
            })
            .unwrap();

        assert_eq!(cached_flags, vec![true]);
        assert_eq!(cached_scanner.stats().cached_processed(), 1);
        assert_eq!(cached_scanner.stats().dirs_processed(), 0);
        assert_eq!(std::fs::read(&manifest_path).unwrap(), saved);
    }

    #[test]
    fn worker_error_aborts_directory() {
        let dir = tempfile::tempdir().unwrap();
        // A dangling symlink enumerates but cannot be opened for hashing.
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink("/nonexistent/target", dir.path().join("broken"))
                .unwrap();
            std::fs::write(dir.path().join("ok.txt"), b"fine").unwrap();

            let scanner = scanner();
            let result = scanner.walk(dir.path(), &key(), &mut |_, _, _| Ok(()));
            assert!(result.is_err());
        }
    }

    #[test]
    fn progress_snapshots_are_delivered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f"), vec![0u8; 4096]).unwrap();

        let (tx, rx) = mpsc::sync_channel(10);
        let scanner = Scanner::new(ScannerOptions {
            progress: Some(tx),
            progress_interval: Duration::from_millis(5),
            ..ScannerOptions::default()
        });
        generate_tree(&scanner, dir.path());

        let snapshots: Vec<StatsSnapshot> = rx.try_iter().collect();
        assert!(!snapshots.is_empty());
        // Final drained snapshot reflects the finished run.
        assert_eq!(snapshots.last().unwrap().bytes_processed, 4096);
    }

    #[test]
    fn cancellation_surfaces_from_walk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f"), b"x").unwrap();

        let scanner = scanner();
        scanner.cancel_flag().cancel();
        let result = scanner.walk(dir.path(), &key(), &mut |_, _, _| Ok(()));
        assert!(matches!(result, Err(crate::error::BytecheckError::Cancelled)));
    }
}
