//! Streaming SHA-256 checksums with progress accounting.

use crate::error::{BytecheckError, Result};
use crate::scanner::CancelFlag;
use crate::stats::Stats;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Read granularity for file hashing.
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Compute the lowercase hex SHA-256 of a file's bytes.
///
/// Reads in 1 MiB chunks, advancing `stats.bytes_processed` per read and
/// recording the path as the current file. The cancellation flag is
/// observed before every read.
///
/// # Errors
///
/// Returns `BytecheckError::Io` if the file cannot be opened or read, and
/// `BytecheckError::Cancelled` when cancellation is observed.
pub fn file_checksum(path: &Path, stats: &Stats, cancel: &CancelFlag) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    stats.set_current_file(path);

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        if cancel.is_cancelled() {
            return Err(BytecheckError::Cancelled);
        }
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        stats.add_bytes_processed(n as u64);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compute the lowercase hex SHA-256 of a byte slice.
#[must_use]
pub fn bytes_checksum(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn bytes_checksum_empty() {
        assert_eq!(
            bytes_checksum(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn bytes_checksum_known_value() {
        // SHA-256 of the single byte 'a'
        assert_eq!(
            bytes_checksum(b"a"),
            "ca978112ca1bbdcafac231b39a23dc4da786eff8147c4e72b9807785afee48bb"
        );
    }

    #[test]
    fn file_checksum_matches_bytes_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let content = b"some file content";
        std::fs::write(&path, content).unwrap();

        let stats = Stats::new();
        let cancel = CancelFlag::new();
        let digest = file_checksum(&path, &stats, &cancel).unwrap();
        assert_eq!(digest, bytes_checksum(content));
        assert_eq!(stats.bytes_processed(), content.len() as u64);
    }

    #[test]
    fn file_checksum_spans_multiple_buffers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("large.bin");
        let content = vec![0xabu8; READ_BUFFER_SIZE + 4096];
        std::fs::write(&path, &content).unwrap();

        let stats = Stats::new();
        let digest = file_checksum(&path, &stats, &CancelFlag::new()).unwrap();
        assert_eq!(digest, bytes_checksum(&content));
        assert_eq!(stats.bytes_processed(), content.len() as u64);
    }

    #[test]
    fn file_checksum_records_current_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracked.txt");
        std::fs::write(&path, b"x").unwrap();

        let stats = Stats::new();
        file_checksum(&path, &stats, &CancelFlag::new()).unwrap();
        assert!(stats.snapshot().current_file.ends_with("tracked.txt"));
    }

    #[test]
    fn file_checksum_missing_file_is_io_error() {
        let stats = Stats::new();
        let result = file_checksum(Path::new("/nonexistent/f"), &stats, &CancelFlag::new());
        assert!(matches!(result, Err(BytecheckError::Io(_))));
    }

    #[test]
    fn file_checksum_observes_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.txt");
        std::fs::write(&path, b"content").unwrap();

        let cancel = CancelFlag::new();
        cancel.cancel();
        let result = file_checksum(&path, &Stats::new(), &cancel);
        assert!(matches!(result, Err(BytecheckError::Cancelled)));
    }
}
