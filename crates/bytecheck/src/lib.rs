//! Cryptographically attested integrity manifests for directory trees.
//!
//! Every directory gets one manifest file recording a checksum per
//! immediate child, an HMAC over the entity list, and optionally an
//! auditor block: a short-lived certificate plus a detached signature
//! binding the manifest to an externally verifiable identity.
//!
//! # Pipeline
//!
//! ```text
//! generate:  post-order walk --> per-child checksums --> Manifest
//!              --> processor (plain save, or ephemeral-key seal) --> disk
//!
//! verify:    post-order walk --> recompute Manifest --> load stored
//!              --> HMAC check --> audit certificate + signature
//!              --> compare entities --> post-walk issuer trust resolution
//! ```
//!
//! Directory checksums are taken over the child directory's manifest
//! file, not its tree, so a change anywhere below propagates upward
//! through the stored manifests alone.

pub mod checksum;
pub mod config;
pub mod error;
pub mod generate;
pub mod manifest;
pub mod scanner;
pub mod signing;
pub mod stats;
pub mod trust;
pub mod verify;

pub use config::Config;
pub use error::{BytecheckError, Result, SignerError};
pub use generate::Generator;
pub use manifest::{
    compare, AuditorBlock, CertificateData, DifferenceKind, Entity, EntityDifference, HmacKey,
    Manifest, DEFAULT_MANIFEST_NAME,
};
pub use scanner::{walk_post_order, CancelFlag, Scanner, ScannerOptions};
pub use signing::{
    verify_signature, Certificate, Ed25519Signer, NoopSigner, Signer, SshKeygenSigner,
};
pub use stats::{Stats, StatsSnapshot};
pub use trust::{Issuer, IssuerRef, IssuerVerifier, MultiSourceVerifier, TrustOutcome, UrlKeySource};
pub use verify::{DirectoryStatus, ManifestAuditor, ManifestStatus, Verifier, VerifyReport};
