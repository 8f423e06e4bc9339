//! Post-order directory traversal.

use crate::error::{BytecheckError, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared across the walk and its workers.
///
/// Cloning is cheap; all clones observe the same flag. Once cancelled it
/// stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Fail with `BytecheckError::Cancelled` when the flag is set.
    ///
    /// # Errors
    ///
    /// Returns `BytecheckError::Cancelled` after [`CancelFlag::cancel`].
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(BytecheckError::Cancelled);
        }
        Ok(())
    }
}

/// Visit every directory under `root` in post-order: all descendants
/// before their parent, siblings in ascending name order.
///
/// The ordering is what makes directory digests over child manifests
/// possible: when `visit` runs for a directory, every child directory has
/// already been visited.
///
/// # Errors
///
/// Propagates enumeration failures, `visit` errors, and
/// `BytecheckError::Cancelled`.
pub fn walk_post_order<F>(root: &Path, cancel: &CancelFlag, visit: &mut F) -> Result<()>
where
    F: FnMut(&Path) -> Result<()>,
{
    cancel.check()?;

    let mut entries: Vec<std::fs::DirEntry> =
        std::fs::read_dir(root)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(std::fs::DirEntry::file_name);

    for entry in &entries {
        if entry.file_type()?.is_dir() {
            walk_post_order(&entry.path(), cancel, visit)?;
        }
    }

    visit(root)
}
