//! The two-step cryptographic audit of a stored manifest.

use crate::error::{BytecheckError, Result};
use crate::manifest::Manifest;
use crate::signing::{verify_signature, Certificate};
use crate::trust::{Issuer, IssuerRef};
use ed25519_dalek::VerifyingKey;
use std::collections::{BTreeMap, BTreeSet};

/// Verifies auditor blocks and accumulates the issuers seen doing it.
///
/// Step one checks the certificate: the issuer's signature over the
/// ephemeral public key and the issuer reference. Step two checks the
/// manifest signature against the ephemeral key. Both must pass;
/// absence of an auditor block is not a failure.
#[derive(Default)]
pub struct ManifestAuditor {
    seen: BTreeMap<IssuerRef, BTreeSet<[u8; 32]>>,
}

impl ManifestAuditor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Audit one manifest.
    ///
    /// Returns `Ok(false)` when the manifest carries no auditor block and
    /// `Ok(true)` when the block passed both checks. The issuer of every
    /// valid certificate is recorded for post-walk trust resolution.
    ///
    /// # Errors
    ///
    /// Returns `BytecheckError::Crypto` when either check fails and
    /// `BytecheckError::Decode` for malformed block contents.
    pub fn audit(&mut self, manifest: &Manifest) -> Result<bool> {
        let Some(block) = &manifest.auditor else {
            return Ok(false);
        };

        let certificate = Certificate::from_data(&block.certificate)?;
        certificate.verify().map_err(|err| match err {
            BytecheckError::Crypto(_) => BytecheckError::Crypto(
                "auditor certificate is invalid: issuer signature does not match".to_string(),
            ),
            other => other,
        })?;

        // The certificate checks out; remember who vouched for it.
        self.seen
            .entry(IssuerRef::new(certificate.issuer_reference()))
            .or_default()
            .insert(certificate.issuer_public_key().to_bytes());

        let signature = hex::decode(&block.manifest_signature).map_err(|err| {
            BytecheckError::Decode(format!("manifest signature is not hex: {err}"))
        })?;
        let message = manifest.data_without_auditor()?;
        verify_signature(certificate.public_key(), &message, &signature)
            .map_err(|_| BytecheckError::Crypto("manifest signature is invalid".to_string()))?;

        Ok(true)
    }

    /// All `(reference, public key)` pairs recorded from valid
    /// certificates, one [`Issuer`] per pair.
    #[must_use]
    pub fn issuers(&self) -> Vec<Issuer> {
        self.seen
            .iter()
            .flat_map(|(reference, keys)| {
                keys.iter().filter_map(|bytes| {
                    VerifyingKey::from_bytes(bytes).ok().map(|public_key| Issuer {
                        reference: reference.clone(),
                        public_key,
                    })
                })
            })
            .collect()
    }
}
