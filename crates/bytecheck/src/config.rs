//! Process-wide configuration resolved once at startup.
//!
//! Environment variables are read exactly once here and carried into
//! components as plain values, so nothing on the scan or verify hot path
//! touches the environment.

use crate::manifest::HmacKey;

/// Environment variable overriding the manifest HMAC key.
pub const HMAC_KEY_ENV_VAR: &str = "BYTECHECK_HMAC_KEY";

/// Environment variable binding the `custom:` trust scheme to a URL template.
pub const CUSTOM_VERIFIER_ENV_VAR: &str = "BYTECHECK_CUSTOM_AUDITOR_VERIFIER_URL_TEMPLATE";

/// Resolved process configuration.
#[derive(Debug)]
pub struct Config {
    /// Key for the manifest HMAC binding.
    pub hmac_key: HmacKey,
    /// URL template for the `custom:` trust scheme, when configured.
    /// `None` means the scheme is absent and `custom:` references classify
    /// as unsupported.
    pub custom_verifier_template: Option<String>,
}

impl Config {
    /// Resolve configuration from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        let hmac_key = match std::env::var(HMAC_KEY_ENV_VAR) {
            Ok(value) => {
                tracing::info!("using HMAC key from environment variable {HMAC_KEY_ENV_VAR}");
                HmacKey::from_bytes(value.as_bytes())
            }
            Err(_) => HmacKey::default(),
        };

        let custom_verifier_template = std::env::var(CUSTOM_VERIFIER_ENV_VAR)
            .ok()
            .filter(|template| !template.is_empty());

        Self {
            hmac_key,
            custom_verifier_template,
        }
    }
}
