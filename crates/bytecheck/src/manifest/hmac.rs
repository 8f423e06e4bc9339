//! Keyed HMAC binding for manifest entity lists.
//!
//! The HMAC input is the canonical JSON of the entity list alone; the
//! stored `hmac` field and the auditor block never feed back into it.
//! The shared key is an integrity-only measure, not an access-control
//! boundary.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Built-in key used when no key is configured. Kept stable so manifests
/// remain interoperable across installations that never set
/// `BYTECHECK_HMAC_KEY`.
const DEFAULT_HMAC_KEY: &[u8] = b"this-is-obscurity-key-that";

/// Key material for the manifest HMAC. Zeroized on drop.
pub struct HmacKey(Zeroizing<Vec<u8>>);

impl HmacKey {
    /// Wrap raw key bytes.
    #[must_use]
    pub fn from_bytes(key: &[u8]) -> Self {
        Self(Zeroizing::new(key.to_vec()))
    }

    /// Compute the lowercase hex HMAC-SHA256 of `data`.
    #[must_use]
    pub fn compute_hex(&self, data: &[u8]) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.0).expect("HMAC accepts keys of any length");
        mac.update(data);
        hex::encode(mac.finalize().into_bytes())
    }
}

impl Default for HmacKey {
    fn default() -> Self {
        Self::from_bytes(DEFAULT_HMAC_KEY)
    }
}

impl std::fmt::Debug for HmacKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.debug_tuple("HmacKey").field(&"..").finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn compute_is_deterministic() {
        let key = HmacKey::default();
        assert_eq!(key.compute_hex(b"payload"), key.compute_hex(b"payload"));
    }

    #[test]
    fn compute_is_hex_of_expected_length() {
        let mac = HmacKey::default().compute_hex(b"payload");
        assert_eq!(mac.len(), 64);
        assert!(mac.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_keys_produce_different_macs() {
        let a = HmacKey::from_bytes(b"key-a");
        let b = HmacKey::from_bytes(b"key-b");
        assert_ne!(a.compute_hex(b"payload"), b.compute_hex(b"payload"));
    }

    #[test]
    fn different_payloads_produce_different_macs() {
        let key = HmacKey::default();
        assert_ne!(key.compute_hex(b"a"), key.compute_hex(b"b"));
    }

    #[test]
    fn debug_does_not_leak_key() {
        let key = HmacKey::from_bytes(b"super-secret");
        assert!(!format!("{key:?}").contains("super-secret"));
    }
}
