//! Verification of a previously attested tree.
//!
//! The verifier recomputes every directory's manifest, loads the stored
//! one, audits its auditor block, and compares entity sets. Tampered or
//! unverifiable manifests are hard failures that abort the walk; content
//! drift is recorded per directory and reported. Issuer identities
//! collected along the way are resolved against external trust sources
//! once the walk completes.

use crate::error::{BytecheckError, Result};
use crate::manifest::{compare, EntityDifference, HmacKey, Manifest};
use crate::scanner::Scanner;
use crate::stats::StatsSnapshot;
use crate::trust::{IssuerRef, IssuerVerifier, TrustOutcome};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub mod auditor;

pub use auditor::ManifestAuditor;

/// Verification state of one stored manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManifestStatus {
    /// A stored manifest exists for the directory.
    pub found: bool,
    /// The directory was skipped because its manifest was fresh.
    pub skipped: bool,
    /// Stored and computed manifests match.
    pub valid: bool,
    /// The stored manifest carried a valid auditor block.
    pub audited: bool,
}

/// Verification result for one directory.
#[derive(Debug, Clone)]
pub struct DirectoryStatus {
    pub path: PathBuf,
    pub manifest: ManifestStatus,
    /// Entity differences when stored and computed manifests diverge.
    pub differences: Vec<EntityDifference>,
}

/// Structured result of a verification run.
#[derive(Debug)]
pub struct VerifyReport {
    pub directories: Vec<DirectoryStatus>,
    /// Trust classification per distinct issuer reference.
    pub issuers: BTreeMap<IssuerRef, TrustOutcome>,
    pub stats: StatsSnapshot,
}

impl VerifyReport {
    /// Whether every visited directory verified (or was skipped as
    /// fresh). Trust outcomes do not affect this: an offline run with
    /// unresolved issuers is still a clean verification.
    #[must_use]
    pub fn all_valid(&self) -> bool {
        self.directories
            .iter()
            .all(|status| status.manifest.valid || status.manifest.skipped)
    }
}

/// Orchestrates scanning, auditing, comparison, and trust resolution.
pub struct Verifier<'a> {
    scanner: &'a Scanner,
    trust: &'a dyn IssuerVerifier,
    hmac_key: &'a HmacKey,
}

impl<'a> Verifier<'a> {
    #[must_use]
    pub fn new(scanner: &'a Scanner, trust: &'a dyn IssuerVerifier, hmac_key: &'a HmacKey) -> Self {
        Self {
            scanner,
            trust,
            hmac_key,
        }
    }

    /// Verify every directory under `root`.
    ///
    /// # Errors
    ///
    /// Aborts with `ManifestMissing` for an unattested directory,
    /// `InvalidHmac` for a tampered manifest, and `Crypto` for an auditor
    /// block that fails verification. Content mismatches do not abort;
    /// they are recorded in the report.
    pub fn run(&self, root: &Path) -> Result<VerifyReport> {
        let mut auditor = ManifestAuditor::new();
        let mut directories = Vec::new();
        let hmac_key = self.hmac_key;
        let manifest_name = self.scanner.manifest_name().to_string();

        self.scanner
            .walk(root, hmac_key, &mut |dir, computed, cached| {
                if cached {
                    directories.push(DirectoryStatus {
                        path: dir.to_path_buf(),
                        manifest: ManifestStatus {
                            found: true,
                            skipped: true,
                            ..ManifestStatus::default()
                        },
                        differences: Vec::new(),
                    });
                    return Ok(());
                }

                let manifest_path = dir.join(&manifest_name);
                let stored = Manifest::load(&manifest_path, hmac_key)?.ok_or_else(|| {
                    BytecheckError::ManifestMissing {
                        dir: dir.to_path_buf(),
                    }
                })?;

                let audited = auditor.audit(&stored)?;

                let (identical, differences) = compare(&stored, &computed);
                if !identical {
                    directories.push(DirectoryStatus {
                        path: dir.to_path_buf(),
                        manifest: ManifestStatus {
                            found: true,
                            audited,
                            ..ManifestStatus::default()
                        },
                        differences,
                    });
                    return Ok(());
                }

                // A verified manifest gets its mtime refreshed so
                // freshness-limited runs can reuse it.
                Manifest::touch(&manifest_path)?;
                directories.push(DirectoryStatus {
                    path: dir.to_path_buf(),
                    manifest: ManifestStatus {
                        found: true,
                        valid: true,
                        audited,
                        ..ManifestStatus::default()
                    },
                    differences: Vec::new(),
                });
                Ok(())
            })?;

        let issuers = self.trust.verify(&auditor.issuers());
        Ok(VerifyReport {
            directories,
            issuers,
            stats: self.scanner.stats().snapshot(),
        })
    }
}
