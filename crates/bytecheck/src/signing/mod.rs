//! Signing keys and the abstraction over where they live.
//!
//! A [`Signer`] is any holder of an ed25519 identity that can sign bytes:
//! an in-memory key, a key file, or an external `ssh-keygen` invocation
//! backed by a hardware token. The generator never needs to know which.

use crate::error::SignerError;
use ed25519_dalek::{Signer as _, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub mod certificate;
pub mod openssh;
pub mod sshsig;

pub use certificate::{verify_signature, Certificate};

/// A signing identity with an externally meaningful reference.
///
/// Implementations own their key material or hardware handle; dropping
/// the signer releases it.
pub trait Signer: Send + Sync {
    /// Sign arbitrary bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::NotImplemented`] from signers that cannot
    /// sign (selecting the unsigned pipeline) and
    /// [`SignerError::Failure`] for real failures.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, SignerError>;

    /// The signer's ed25519 public key.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::Failure`] if the key cannot be produced.
    fn public_key(&self) -> Result<VerifyingKey, SignerError>;

    /// The `scheme:identifier` reference naming this signer's external
    /// identity (e.g. `github:alice`).
    fn reference(&self) -> &str;
}

// ---------------------------------------------------------------------------
// In-memory ed25519 signer
// ---------------------------------------------------------------------------

/// Signer holding an ed25519 private key in memory.
pub struct Ed25519Signer {
    key: SigningKey,
    reference: String,
}

impl Ed25519Signer {
    /// Wrap an existing key.
    #[must_use]
    pub fn new(key: SigningKey, reference: impl Into<String>) -> Self {
        Self {
            key,
            reference: reference.into(),
        }
    }

    /// Generate a fresh random key.
    #[must_use]
    pub fn generate(reference: impl Into<String>) -> Self {
        Self::new(SigningKey::generate(&mut OsRng), reference.into())
    }

    /// Load an unencrypted OpenSSH-format ed25519 private key from a file.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::Failure`] when the file cannot be read or
    /// is not an unencrypted ed25519 key.
    pub fn from_openssh_file(
        path: &Path,
        reference: impl Into<String>,
    ) -> Result<Self, SignerError> {
        let key = openssh::read_private_key(path)
            .map_err(|err| SignerError::Failure(format!("could not load private key: {err}")))?;
        Ok(Self::new(key, reference))
    }
}

impl Signer for Ed25519Signer {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, SignerError> {
        Ok(self.key.sign(data).to_bytes().to_vec())
    }

    fn public_key(&self) -> Result<VerifyingKey, SignerError> {
        Ok(self.key.verifying_key())
    }

    fn reference(&self) -> &str {
        &self.reference
    }
}

// ---------------------------------------------------------------------------
// No-op signer
// ---------------------------------------------------------------------------

/// Signer that cannot sign. Passing it to the generator selects the
/// unsigned pipeline via the [`SignerError::NotImplemented`] sentinel.
#[derive(Debug, Default)]
pub struct NoopSigner;

impl NoopSigner {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Signer for NoopSigner {
    fn sign(&self, _data: &[u8]) -> Result<Vec<u8>, SignerError> {
        Err(SignerError::NotImplemented)
    }

    fn public_key(&self) -> Result<VerifyingKey, SignerError> {
        Err(SignerError::NotImplemented)
    }

    fn reference(&self) -> &str {
        ""
    }
}

// ---------------------------------------------------------------------------
// ssh-keygen delegating signer (hardware-backed keys)
// ---------------------------------------------------------------------------

/// Signer that shells out to `ssh-keygen -Y sign` for FIDO2
/// security-key-backed private keys, which cannot be loaded directly.
///
/// Each `sign` call requires a user-presence tap on the token; the
/// generator therefore signs with it exactly once per run, to certify
/// the ephemeral key.
pub struct SshKeygenSigner {
    private_key_path: PathBuf,
    reference: String,
}

impl SshKeygenSigner {
    /// Create a signer for the key at `private_key_path`.
    ///
    /// Requires the sibling `.pub` file to declare an
    /// `sk-ssh-ed25519` key; plain keys should use
    /// [`Ed25519Signer::from_openssh_file`] instead.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::Failure`] when either key file is missing
    /// or the public key is not security-key backed.
    pub fn new(
        private_key_path: &Path,
        reference: impl Into<String>,
    ) -> Result<Self, SignerError> {
        if !private_key_path.exists() {
            return Err(SignerError::Failure(format!(
                "private key file not found: {}",
                private_key_path.display()
            )));
        }
        let pub_path = openssh::public_key_path(private_key_path);
        let pub_text = std::fs::read_to_string(&pub_path).map_err(|err| {
            SignerError::Failure(format!(
                "public key file {} not readable: {err}",
                pub_path.display()
            ))
        })?;
        if !pub_text.contains("sk-ssh-ed25519") {
            return Err(SignerError::Failure(
                "public key is not a security-key ed25519 key".to_string(),
            ));
        }

        Ok(Self {
            private_key_path: private_key_path.to_path_buf(),
            reference: reference.into(),
        })
    }
}

impl Signer for SshKeygenSigner {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, SignerError> {
        use std::io::Write;

        tracing::info!("signing with security key, a touch may be required");
        let mut child = Command::new("ssh-keygen")
            .args(["-Y", "sign", "-n", "file", "-q", "-f"])
            .arg(&self.private_key_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| SignerError::Failure(format!("could not run ssh-keygen: {err}")))?;

        if let Some(stdin) = child.stdin.take() {
            let mut stdin = stdin;
            stdin
                .write_all(data)
                .map_err(|err| SignerError::Failure(format!("ssh-keygen stdin: {err}")))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|err| SignerError::Failure(format!("ssh-keygen did not finish: {err}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SignerError::Failure(format!(
                "ssh-keygen signing failed: {}",
                stderr.trim()
            )));
        }

        let pem = String::from_utf8_lossy(&output.stdout);
        openssh::pem_decode(&pem, "SSH SIGNATURE")
            .map_err(|err| SignerError::Failure(format!("bad ssh-keygen output: {err}")))
    }

    fn public_key(&self) -> Result<VerifyingKey, SignerError> {
        let pub_path = openssh::public_key_path(&self.private_key_path);
        let text = std::fs::read_to_string(&pub_path)
            .map_err(|err| SignerError::Failure(format!("public key not readable: {err}")))?;
        text.lines()
            .find_map(openssh::parse_authorized_key)
            .filter(|(algo, _)| algo == openssh::ALGO_SK_ED25519)
            .map(|(_, key)| key)
            .ok_or_else(|| {
                SignerError::Failure("no sk-ssh-ed25519 public key in .pub file".to_string())
            })
    }

    fn reference(&self) -> &str {
        &self.reference
    }
}
