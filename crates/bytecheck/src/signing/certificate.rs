//! Issuer-signed certificates binding an ephemeral signing key to an
//! externally verifiable identity.
//!
//! The certificate is self-contained: verification needs only the fields
//! it carries, no chain traversal. Whether the issuer's public key is
//! actually trustworthy is a separate question answered by the trust
//! resolver after the walk.

use crate::error::{BytecheckError, Result};
use crate::manifest::CertificateData;
use crate::signing::{sshsig, Signer};
use ed25519_dalek::{Signature, Verifier as _, VerifyingKey, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};

/// A certificate over an ephemeral subject key, signed by an issuer.
#[derive(Debug, Clone)]
pub struct Certificate {
    public_key: VerifyingKey,
    issuer_public_key: VerifyingKey,
    issuer_reference: String,
    signature: Vec<u8>,
}

impl Certificate {
    /// Issue a certificate: the issuer signs
    /// `subject_public_key ‖ issuer_reference_utf8`.
    ///
    /// # Errors
    ///
    /// Returns `BytecheckError::Signer` if the issuer cannot sign or
    /// expose its public key.
    pub fn issue(subject: &VerifyingKey, issuer: &dyn Signer) -> Result<Self> {
        let issuer_public_key = issuer.public_key()?;
        let issuer_reference = issuer.reference().to_string();
        let payload = signed_payload(subject, &issuer_reference);
        let signature = issuer.sign(&payload)?;

        Ok(Self {
            public_key: *subject,
            issuer_public_key,
            issuer_reference,
            signature,
        })
    }

    /// Verify the issuer's signature over the subject key and reference.
    ///
    /// The wire format carries no algorithm tag: a 64-byte signature is
    /// raw ed25519, anything else is treated as an `SSHSIG` envelope from
    /// a hardware-backed issuer.
    ///
    /// # Errors
    ///
    /// Returns `BytecheckError::Crypto` when the signature does not
    /// verify and `BytecheckError::Decode` for malformed envelopes.
    pub fn verify(&self) -> Result<()> {
        let payload = signed_payload(&self.public_key, &self.issuer_reference);
        verify_signature(&self.issuer_public_key, &payload, &self.signature)
    }

    /// The subject's (ephemeral) public key.
    #[must_use]
    pub fn public_key(&self) -> &VerifyingKey {
        &self.public_key
    }

    /// The issuer's public key.
    #[must_use]
    pub fn issuer_public_key(&self) -> &VerifyingKey {
        &self.issuer_public_key
    }

    /// The issuer's `scheme:identifier` reference.
    #[must_use]
    pub fn issuer_reference(&self) -> &str {
        &self.issuer_reference
    }

    /// Hex-encode into the manifest wire form.
    #[must_use]
    pub fn to_data(&self) -> CertificateData {
        CertificateData {
            public_key: hex::encode(self.public_key.as_bytes()),
            signature: hex::encode(&self.signature),
            issuer_public_key: hex::encode(self.issuer_public_key.as_bytes()),
            issuer_reference: self.issuer_reference.clone(),
        }
    }

    /// Decode from the manifest wire form.
    ///
    /// # Errors
    ///
    /// Returns `BytecheckError::Decode` for bad hex or key material of
    /// the wrong shape.
    pub fn from_data(data: &CertificateData) -> Result<Self> {
        Ok(Self {
            public_key: decode_public_key(&data.public_key, "publicKey")?,
            issuer_public_key: decode_public_key(&data.issuer_public_key, "issuerPublicKey")?,
            issuer_reference: data.issuer_reference.clone(),
            signature: hex::decode(&data.signature).map_err(|err| {
                BytecheckError::Decode(format!("certificate signature is not hex: {err}"))
            })?,
        })
    }
}

/// The exact byte string an issuer signs: subject key bytes followed by
/// the UTF-8 reference, no separator. Both sides must build it the same
/// way.
fn signed_payload(subject: &VerifyingKey, issuer_reference: &str) -> Vec<u8> {
    let mut payload = Vec::with_capacity(PUBLIC_KEY_LENGTH + issuer_reference.len());
    payload.extend_from_slice(subject.as_bytes());
    payload.extend_from_slice(issuer_reference.as_bytes());
    payload
}

/// Verify a signature that is either raw ed25519 (exactly 64 bytes) or a
/// hardware `SSHSIG` envelope (anything longer).
///
/// # Errors
///
/// Returns `BytecheckError::Crypto` on verification failure.
pub fn verify_signature(public_key: &VerifyingKey, data: &[u8], signature: &[u8]) -> Result<()> {
    if signature.len() == SIGNATURE_LENGTH {
        let signature = Signature::from_slice(signature)
            .map_err(|err| BytecheckError::Decode(format!("invalid signature: {err}")))?;
        public_key
            .verify(data, &signature)
            .map_err(|_| BytecheckError::Crypto("ed25519 signature is invalid".to_string()))
    } else {
        sshsig::verify(public_key, data, signature)
    }
}

fn decode_public_key(hex_value: &str, field: &str) -> Result<VerifyingKey> {
    let bytes = hex::decode(hex_value)
        .map_err(|err| BytecheckError::Decode(format!("{field} is not hex: {err}")))?;
    let bytes: [u8; PUBLIC_KEY_LENGTH] = bytes.try_into().map_err(|_| {
        BytecheckError::Decode(format!("{field} is not {PUBLIC_KEY_LENGTH} bytes"))
    })?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|err| BytecheckError::Decode(format!("{field} is not a valid key: {err}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::signing::Ed25519Signer;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    fn issuer() -> Ed25519Signer {
        Ed25519Signer::generate("github:alice")
    }

    fn subject() -> VerifyingKey {
        SigningKey::generate(&mut OsRng).verifying_key()
    }

    #[test]
    fn issued_certificate_verifies() {
        let cert = Certificate::issue(&subject(), &issuer()).unwrap();
        cert.verify().unwrap();
        assert_eq!(cert.issuer_reference(), "github:alice");
    }

    #[test]
    fn wire_round_trip_preserves_validity() {
        let cert = Certificate::issue(&subject(), &issuer()).unwrap();
        let data = cert.to_data();
        let restored = Certificate::from_data(&data).unwrap();
        restored.verify().unwrap();
        assert_eq!(restored.public_key(), cert.public_key());
        assert_eq!(restored.issuer_public_key(), cert.issuer_public_key());
    }

    #[test]
    fn reference_is_bound_into_signature() {
        let cert = Certificate::issue(&subject(), &issuer()).unwrap();
        let mut data = cert.to_data();
        data.issuer_reference = "github:mallory".to_string();
        let forged = Certificate::from_data(&data).unwrap();
        assert!(matches!(forged.verify(), Err(BytecheckError::Crypto(_))));
    }

    #[test]
    fn tampered_subject_key_fails() {
        let cert = Certificate::issue(&subject(), &issuer()).unwrap();
        let mut data = cert.to_data();
        data.public_key = hex::encode(subject().as_bytes());
        let forged = Certificate::from_data(&data).unwrap();
        assert!(matches!(forged.verify(), Err(BytecheckError::Crypto(_))));
    }

    #[test]
    fn tampered_issuer_key_fails() {
        let cert = Certificate::issue(&subject(), &issuer()).unwrap();
        let mut data = cert.to_data();
        data.issuer_public_key = hex::encode(subject().as_bytes());
        let forged = Certificate::from_data(&data).unwrap();
        assert!(matches!(forged.verify(), Err(BytecheckError::Crypto(_))));
    }

    #[test]
    fn tampered_signature_fails() {
        let cert = Certificate::issue(&subject(), &issuer()).unwrap();
        let mut data = cert.to_data();
        // Flip the first hex digit.
        let mut chars: Vec<char> = data.signature.chars().collect();
        chars[0] = if chars[0] == '0' { '1' } else { '0' };
        data.signature = chars.into_iter().collect();
        let forged = Certificate::from_data(&data).unwrap();
        assert!(matches!(forged.verify(), Err(BytecheckError::Crypto(_))));
    }

    #[test]
    fn from_data_rejects_bad_material() {
        let cert = Certificate::issue(&subject(), &issuer()).unwrap();

        let mut bad_hex = cert.to_data();
        bad_hex.public_key = "zz".repeat(32);
        assert!(matches!(
            Certificate::from_data(&bad_hex),
            Err(BytecheckError::Decode(_))
        ));

        let mut short_key = cert.to_data();
        short_key.issuer_public_key = "ab".repeat(16);
        assert!(matches!(
            Certificate::from_data(&short_key),
            Err(BytecheckError::Decode(_))
        ));
    }

    #[test]
    fn raw_signature_dispatch_by_length() {
        use ed25519_dalek::Signer as _;
        let key = SigningKey::generate(&mut OsRng);
        let signature = key.sign(b"payload");
        verify_signature(&key.verifying_key(), b"payload", &signature.to_bytes()).unwrap();

        // A non-64-byte signature goes down the SSHSIG path and fails to
        // decode rather than verifying as raw ed25519.
        let result = verify_signature(&key.verifying_key(), b"payload", &[0u8; 80]);
        assert!(matches!(result, Err(BytecheckError::Decode(_))));
    }
}
