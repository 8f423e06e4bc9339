//! Error types for the bytecheck core library.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by [`Signer`](crate::signing::Signer) implementations.
#[derive(Error, Debug)]
pub enum SignerError {
    /// Sentinel returned by the no-op signer. Selects the unsigned
    /// generation pipeline instead of aborting.
    #[error("signing not implemented")]
    NotImplemented,

    /// Any other signer failure (key loading, hardware I/O, external tool).
    #[error("{0}")]
    Failure(String),
}

/// Errors that can occur while generating or verifying manifests.
#[derive(Error, Debug)]
pub enum BytecheckError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON in a manifest file.
    #[error("failed to parse {}: {}", path.display(), reason)]
    Parse { path: PathBuf, reason: String },

    /// Malformed binary data: SSH signatures, key blobs, hex fields.
    #[error("malformed data: {0}")]
    Decode(String),

    /// JSON serialization failure outside a file context.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Stored HMAC does not match the recomputed one.
    #[error("invalid HMAC in manifest {}", path.display())]
    InvalidHmac { path: PathBuf },

    /// Certificate or manifest signature verification failed.
    #[error("cryptographic verification failed: {0}")]
    Crypto(String),

    /// A directory under verification has no stored manifest.
    #[error("manifest in directory '{}' not found", dir.display())]
    ManifestMissing { dir: PathBuf },

    #[error("signer error: {0}")]
    Signer(#[from] SignerError),

    /// Key fetch failure during issuer trust resolution. Folded into a
    /// per-reference status by the resolver, never propagated out of it.
    #[error("trust fetch failed: {0}")]
    TrustFetch(String),

    /// Cooperative cancellation observed at a suspension point.
    #[error("operation cancelled")]
    Cancelled,
}

/// Result type alias for bytecheck operations.
pub type Result<T> = std::result::Result<T, BytecheckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_include_paths() {
        let err = BytecheckError::ManifestMissing {
            dir: PathBuf::from("/tmp/project"),
        };
        assert!(err.to_string().contains("/tmp/project"));

        let err = BytecheckError::InvalidHmac {
            path: PathBuf::from("/tmp/project/.bytecheck.manifest"),
        };
        assert!(err.to_string().contains(".bytecheck.manifest"));
    }

    #[test]
    fn signer_not_implemented_is_distinguishable() {
        let err = BytecheckError::from(SignerError::NotImplemented);
        assert!(matches!(
            err,
            BytecheckError::Signer(SignerError::NotImplemented)
        ));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = BytecheckError::from(io);
        assert!(matches!(err, BytecheckError::Io(_)));
    }
}
