//! The per-directory attestation record.
//!
//! A manifest records one checksum per immediate child of a directory, a
//! keyed HMAC over the entity list, and optionally an auditor block
//! binding the manifest to an externally verifiable identity.
//!
//! Two canonical byte projections matter and must never be confused:
//! - the HMAC covers the JSON of `{entities}` alone;
//! - the auditor signature covers the JSON of `{entities, hmac}`
//!   ([`Manifest::data_without_auditor`]).

use crate::error::{BytecheckError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

pub mod compare;
pub mod hmac;

pub use compare::{compare, DifferenceKind, EntityDifference};
pub use hmac::HmacKey;

/// Default file name for a directory's manifest.
pub const DEFAULT_MANIFEST_NAME: &str = ".bytecheck.manifest";

/// One immediate child of a directory.
///
/// For directories, `checksum` is the digest of the child directory's
/// manifest file on disk, which chains the whole tree together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Leaf name of the child, no path separators.
    pub name: String,
    /// Lowercase hex SHA-256.
    pub checksum: String,
    #[serde(rename = "isDir")]
    pub is_dir: bool,
}

/// Wire form of an auditor certificate; all binary fields lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateData {
    /// Subject's ed25519 public key (the ephemeral per-run signing key).
    pub public_key: String,
    /// Issuer's signature over `public_key ‖ issuer_reference`.
    pub signature: String,
    /// Raw ed25519 public key of the issuer.
    pub issuer_public_key: String,
    /// `scheme:identifier` naming the issuer's external identity.
    pub issuer_reference: String,
}

/// Optional certificate-plus-signature wrapper proving authorship.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditorBlock {
    /// Wall-clock time of sealing.
    pub timestamp: DateTime<Utc>,
    pub certificate: CertificateData,
    /// ed25519 over [`Manifest::data_without_auditor`], lowercase hex.
    #[serde(rename = "manifestSignature")]
    pub manifest_signature: String,
}

/// The per-directory attestation record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub entities: Vec<Entity>,
    pub hmac: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auditor: Option<AuditorBlock>,
}

/// HMAC input projection: the entity list and nothing else.
#[derive(Serialize)]
struct EntitiesOnly<'a> {
    entities: &'a [Entity],
}

/// Auditor signature input projection: the manifest without its auditor.
#[derive(Serialize)]
struct WithoutAuditor<'a> {
    entities: &'a [Entity],
    hmac: &'a str,
}

impl Manifest {
    /// Create a manifest from an unordered entity list. Entities are
    /// sorted ascending by name; the HMAC starts empty and no auditor is
    /// attached.
    #[must_use]
    pub fn new(mut entities: Vec<Entity>) -> Self {
        entities.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            entities,
            hmac: String::new(),
            auditor: None,
        }
    }

    /// Recompute and store the HMAC over the entity list.
    ///
    /// # Errors
    ///
    /// Returns `BytecheckError::Json` if serialization fails.
    pub fn compute_hmac(&mut self, key: &HmacKey) -> Result<()> {
        let payload = serde_json::to_vec(&EntitiesOnly {
            entities: &self.entities,
        })?;
        self.hmac = key.compute_hex(&payload);
        Ok(())
    }

    /// Canonical bytes covered by the auditor's manifest signature: the
    /// compact JSON of the manifest with the auditor field omitted.
    ///
    /// # Errors
    ///
    /// Returns `BytecheckError::Json` if serialization fails.
    pub fn data_without_auditor(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&WithoutAuditor {
            entities: &self.entities,
            hmac: &self.hmac,
        })?)
    }

    /// Attach an auditor block sealed now.
    pub fn set_audited_by(&mut self, certificate: CertificateData, manifest_signature: &[u8]) {
        self.auditor = Some(AuditorBlock {
            timestamp: Utc::now(),
            certificate,
            manifest_signature: hex::encode(manifest_signature),
        });
    }

    /// Remove any auditor block.
    pub fn clear_auditor(&mut self) {
        self.auditor = None;
    }

    /// Recompute the HMAC and write the manifest as pretty-printed JSON.
    ///
    /// The content is written to a sibling temporary file and renamed into
    /// place, so a concurrent reader sees either the old or the new
    /// complete file.
    ///
    /// # Errors
    ///
    /// Returns `BytecheckError::Io` on write failure.
    pub fn save(&mut self, path: &Path, key: &HmacKey) -> Result<()> {
        self.compute_hmac(key)?;
        let mut data = serde_json::to_vec_pretty(self)?;
        data.push(b'\n');

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_MANIFEST_NAME.to_string());
        let tmp_path = path.with_file_name(format!("{file_name}.tmp"));
        fs::write(&tmp_path, &data)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Load a manifest from disk, validating its HMAC.
    ///
    /// Returns `Ok(None)` when the file does not exist; absence is not an
    /// error. Entities are re-sorted after parsing.
    ///
    /// # Errors
    ///
    /// Returns `BytecheckError::Parse` on malformed JSON and
    /// `BytecheckError::InvalidHmac` when the stored HMAC does not match
    /// the recomputed one.
    pub fn load(path: &Path, key: &HmacKey) -> Result<Option<Self>> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let mut manifest: Self =
            serde_json::from_slice(&data).map_err(|err| BytecheckError::Parse {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;
        manifest.entities.sort_by(|a, b| a.name.cmp(&b.name));

        let stored = std::mem::take(&mut manifest.hmac);
        manifest.compute_hmac(key)?;
        if manifest.hmac != stored {
            return Err(BytecheckError::InvalidHmac {
                path: path.to_path_buf(),
            });
        }

        Ok(Some(manifest))
    }

    /// Load a manifest only if its file is younger than `limit`.
    ///
    /// Returns `Ok(None)` when no limit is configured, the file is
    /// missing, or the file is older than the limit. A fresh manifest is
    /// loaded with full HMAC validation.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Manifest::load`].
    pub fn load_if_fresh(
        path: &Path,
        limit: Option<Duration>,
        key: &HmacKey,
    ) -> Result<Option<Self>> {
        let Some(limit) = limit else {
            return Ok(None);
        };

        let modified = match fs::metadata(path) {
            Ok(metadata) => metadata.modified()?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default();
        if age > limit {
            return Ok(None);
        }

        Self::load(path, key)
    }

    /// Refresh the manifest file's modification time without rewriting
    /// its content.
    ///
    /// # Errors
    ///
    /// Returns `BytecheckError::Io` if the file cannot be opened or its
    /// timestamp cannot be updated.
    pub fn touch(path: &Path) -> Result<()> {
        let file = fs::OpenOptions::new().write(true).open(path)?;
        file.set_modified(SystemTime::now())?;
        Ok(())
    }
}
