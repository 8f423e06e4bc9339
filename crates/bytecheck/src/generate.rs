//! Manifest generation.
//!
//! The generator walks a tree with the [`Scanner`] and hands every
//! freshly computed manifest to a processor. Which processor depends on
//! the caller's signer: a signer that cannot sign selects the plain
//! unsigned pipeline, a working signer selects the auditor pipeline.
//!
//! The auditor pipeline signs each manifest with a one-run ephemeral key
//! and binds that key to the root signer's identity with a single
//! certificate, so a hardware-backed signer is touched exactly once per
//! run rather than once per directory.

use crate::error::{BytecheckError, Result, SignerError};
use crate::manifest::{HmacKey, Manifest};
use crate::scanner::Scanner;
use crate::signing::{Certificate, Signer};
use ed25519_dalek::{Signer as _, SigningKey};
use rand::rngs::OsRng;
use std::path::{Path, PathBuf};

/// Generates and writes manifests for a directory tree.
pub struct Generator<'a> {
    scanner: &'a Scanner,
    signer: &'a dyn Signer,
    hmac_key: &'a HmacKey,
    generated: Vec<PathBuf>,
}

impl<'a> Generator<'a> {
    #[must_use]
    pub fn new(scanner: &'a Scanner, signer: &'a dyn Signer, hmac_key: &'a HmacKey) -> Self {
        Self {
            scanner,
            signer,
            hmac_key,
            generated: Vec::new(),
        }
    }

    /// Generate manifests for every directory under `root`.
    ///
    /// Directories reused from a fresh stored manifest are left
    /// untouched.
    ///
    /// # Errors
    ///
    /// Fails on scan errors, signer failures (other than the no-op
    /// sentinel, which selects the unsigned pipeline), and write
    /// failures.
    pub fn run(&mut self, root: &Path) -> Result<()> {
        let mut processor = self.create_processor()?;
        let scanner = self.scanner;
        let hmac_key = self.hmac_key;
        let manifest_name = scanner.manifest_name().to_string();
        let generated = &mut self.generated;

        scanner.walk(root, hmac_key, &mut |dir, mut manifest, cached| {
            if cached {
                return Ok(());
            }
            processor.process(dir, &mut manifest, &manifest_name)?;
            generated.push(dir.to_path_buf());
            Ok(())
        })
    }

    /// Directories whose manifests were written this run.
    #[must_use]
    pub fn generated(&self) -> &[PathBuf] {
        &self.generated
    }

    /// Probe the signer to decide between the signed and unsigned
    /// pipelines.
    fn create_processor(&self) -> Result<Box<dyn ManifestProcessor + 'a>> {
        match self.signer.sign(b"test") {
            Ok(_) => Ok(Box::new(SignedProcessor::new(self.signer, self.hmac_key)?)),
            Err(SignerError::NotImplemented) => {
                Ok(Box::new(UnsignedProcessor::new(self.hmac_key)))
            }
            Err(err) => Err(BytecheckError::Signer(err)),
        }
    }
}

/// Per-directory manifest finalization.
trait ManifestProcessor {
    fn process(&mut self, dir: &Path, manifest: &mut Manifest, manifest_name: &str) -> Result<()>;
}

/// Saves manifests without an auditor block.
struct UnsignedProcessor<'k> {
    hmac_key: &'k HmacKey,
}

impl<'k> UnsignedProcessor<'k> {
    fn new(hmac_key: &'k HmacKey) -> Self {
        Self { hmac_key }
    }
}

impl ManifestProcessor for UnsignedProcessor<'_> {
    fn process(&mut self, dir: &Path, manifest: &mut Manifest, manifest_name: &str) -> Result<()> {
        manifest.clear_auditor();
        manifest.save(&dir.join(manifest_name), self.hmac_key)
    }
}

/// Seals each manifest with an auditor block.
///
/// Construction generates the ephemeral key pair and has the root signer
/// certify it; per-directory processing only ever uses the ephemeral key.
struct SignedProcessor<'k> {
    certificate: Certificate,
    ephemeral: SigningKey,
    hmac_key: &'k HmacKey,
}

impl<'k> SignedProcessor<'k> {
    fn new(root_signer: &dyn Signer, hmac_key: &'k HmacKey) -> Result<Self> {
        let ephemeral = SigningKey::generate(&mut OsRng);
        let certificate = Certificate::issue(&ephemeral.verifying_key(), root_signer)?;
        Ok(Self {
            certificate,
            ephemeral,
            hmac_key,
        })
    }
}

impl ManifestProcessor for SignedProcessor<'_> {
    fn process(&mut self, dir: &Path, manifest: &mut Manifest, manifest_name: &str) -> Result<()> {
        // The signature covers {entities, hmac}, so the HMAC must be in
        // its final state before signing.
        manifest.clear_auditor();
        manifest.compute_hmac(self.hmac_key)?;
        let message = manifest.data_without_auditor()?;
        let signature = self.ephemeral.sign(&message);

        manifest.set_audited_by(self.certificate.to_data(), &signature.to_bytes());
        manifest.save(&dir.join(manifest_name), self.hmac_key)
    }
}
