//! Decoder for OpenSSH `SSHSIG` envelopes carrying FIDO2 ed25519
//! signatures.
//!
//! `ssh-keygen -Y sign` with a security key emits a PEM-armored blob in
//! the format described by OpenSSH's PROTOCOL.sshsig. The hardware does
//! not sign the file directly: it signs an authenticator message derived
//! from hashes of the envelope payload. This module recovers the raw
//! 64-byte ed25519 signature and rebuilds that message so the rest of the
//! system only ever deals in plain ed25519.

use crate::error::{BytecheckError, Result};
use crate::signing::openssh::{public_key_from_blob, WireReader, WireWriter, ALGO_SK_ED25519};
use ed25519_dalek::{Signature, Verifier as _, VerifyingKey};
use sha2::{Digest, Sha256, Sha512};

const SSHSIG_MAGIC: &[u8; 6] = b"SSHSIG";

/// Application identifier `ssh-keygen` registers with the authenticator.
const SSH_APP_ID: &str = "ssh:";

/// Parsed outer `SSHSIG` envelope.
#[derive(Debug, Clone)]
pub struct SshSignature {
    pub version: u32,
    /// SSH wire blob of the signing public key.
    pub public_key_blob: Vec<u8>,
    /// Signing namespace; `ssh-keygen -n file` sets `"file"`.
    pub namespace: String,
    /// Opaque field; some tools write `"file"` here. Ignored.
    pub reserved: String,
    /// Outer hash algorithm; only `"sha512"` is supported.
    pub hash_algorithm: String,
    /// Inner signature blob (FIDO2 format for sk keys).
    pub inner_signature: Vec<u8>,
}

/// Parsed inner FIDO2 signature blob.
#[derive(Debug, Clone)]
pub struct SkSignature {
    pub key_type: String,
    /// The raw 64-byte ed25519 signature.
    pub raw_signature: [u8; 64],
    /// Authenticator flags (user-presence, user-verification bits).
    pub flags: u8,
    /// Authenticator signature counter.
    pub counter: u32,
}

/// Parse the outer `SSHSIG` envelope.
///
/// # Errors
///
/// Returns `BytecheckError::Decode` on a bad magic, truncated fields, or
/// non-UTF-8 strings.
pub fn parse_ssh_signature(data: &[u8]) -> Result<SshSignature> {
    let mut reader = WireReader::new(data);

    let magic = reader.read_exact(SSHSIG_MAGIC.len())?;
    if magic != SSHSIG_MAGIC {
        return Err(BytecheckError::Decode(format!(
            "invalid SSHSIG magic: {magic:?}"
        )));
    }

    Ok(SshSignature {
        version: reader.read_u32()?,
        public_key_blob: reader.read_bytes()?.to_vec(),
        namespace: reader.read_string()?,
        reserved: reader.read_string()?,
        hash_algorithm: reader.read_string()?,
        inner_signature: reader.read_bytes()?.to_vec(),
    })
}

/// Parse the inner FIDO2 blob of an sk-ed25519 signature.
///
/// # Errors
///
/// Returns `BytecheckError::Decode` for other key types or a signature
/// that is not 64 bytes.
pub fn parse_sk_signature(data: &[u8]) -> Result<SkSignature> {
    let mut reader = WireReader::new(data);

    let key_type = reader.read_string()?;
    if key_type != ALGO_SK_ED25519 {
        return Err(BytecheckError::Decode(format!(
            "unexpected inner signature key type: {key_type}"
        )));
    }

    let raw = reader.read_bytes()?;
    let raw_signature: [u8; 64] = raw.try_into().map_err(|_| {
        BytecheckError::Decode(format!("expected 64 signature bytes, got {}", raw.len()))
    })?;

    Ok(SkSignature {
        key_type,
        raw_signature,
        flags: reader.read_u8()?,
        counter: reader.read_u32()?,
    })
}

/// Reconstruct the payload covered by the outer SSH signature:
/// `"SSHSIG" ‖ lp(namespace) ‖ lp("") ‖ lp(hash_alg) ‖ lp(SHA512(data))`.
///
/// # Errors
///
/// Returns `BytecheckError::Decode` for hash algorithms other than
/// `sha512`.
pub fn build_signed_payload(namespace: &str, hash_algorithm: &str, data: &[u8]) -> Result<Vec<u8>> {
    if hash_algorithm != "sha512" {
        return Err(BytecheckError::Decode(format!(
            "unsupported hash algorithm: {hash_algorithm}"
        )));
    }
    let data_hash = Sha512::digest(data);

    let mut writer = WireWriter::new();
    writer.write_raw(SSHSIG_MAGIC);
    writer.write_string(namespace);
    writer.write_string("");
    writer.write_string(hash_algorithm);
    writer.write_bytes(&data_hash);
    Ok(writer.into_bytes())
}

/// Reconstruct the message the FIDO2 authenticator actually signed:
/// `SHA256(app_id) ‖ flags ‖ counter_be ‖ SHA256(payload)`.
#[must_use]
pub fn build_fido2_message(app_id: &str, payload: &[u8], flags: u8, counter: u32) -> Vec<u8> {
    let app_hash = Sha256::digest(app_id.as_bytes());
    let payload_hash = Sha256::digest(payload);

    let mut message = Vec::with_capacity(32 + 1 + 4 + 32);
    message.extend_from_slice(&app_hash);
    message.push(flags);
    message.extend_from_slice(&counter.to_be_bytes());
    message.extend_from_slice(&payload_hash);
    message
}

/// Verify an `SSHSIG` blob over `data` against an expected public key.
///
/// Parses both envelope layers, rebuilds the authenticator message, checks
/// that the key embedded in the envelope matches `public_key`, and
/// verifies the raw ed25519 signature.
///
/// # Errors
///
/// Returns `BytecheckError::Decode` for structural problems and
/// `BytecheckError::Crypto` for a key mismatch or bad signature.
pub fn verify(public_key: &VerifyingKey, data: &[u8], signature_blob: &[u8]) -> Result<()> {
    let envelope = parse_ssh_signature(signature_blob)?;
    let sk = parse_sk_signature(&envelope.inner_signature)?;

    let payload = build_signed_payload(&envelope.namespace, &envelope.hash_algorithm, data)?;
    let message = build_fido2_message(SSH_APP_ID, &payload, sk.flags, sk.counter);

    let embedded = public_key_from_blob(&envelope.public_key_blob)?;
    if embedded != *public_key {
        return Err(BytecheckError::Crypto(
            "signature public key does not match certificate issuer key".to_string(),
        ));
    }

    let signature = Signature::from_bytes(&sk.raw_signature);
    public_key
        .verify(&message, &signature)
        .map_err(|_| BytecheckError::Crypto("SSH signature is invalid".to_string()))
}
