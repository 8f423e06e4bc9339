//! URL-template trusted-key sources.
//!
//! A source owns one scheme and one URL template with a single `%s`
//! placeholder that receives the identifier after the scheme. The fetched
//! body is parsed as `authorized_keys` lines; only ed25519 entries
//! contribute to the trusted set, everything else is skipped silently.

use crate::error::{BytecheckError, Result};
use crate::signing::openssh;
use crate::trust::{Issuer, IssuerRef, IssuerVerifier, TrustOutcome};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

/// GitHub scheme prefix.
pub const GITHUB_SCHEME: &str = "github:";
/// Custom scheme prefix, bound from configuration.
pub const CUSTOM_SCHEME: &str = "custom:";

const GITHUB_KEYS_TEMPLATE: &str = "https://github.com/%s.keys";

/// Bounded timeout for key fetches so an unreachable source degrades to
/// an `error` status instead of stalling the report.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Trusted-key source fetching `authorized_keys` listings from a URL
/// template. Accepts `http(s)://` and `file://` URLs.
pub struct UrlKeySource {
    scheme: String,
    template: String,
    agent: ureq::Agent,
}

impl UrlKeySource {
    /// Create a source for `scheme` (including the trailing colon) with a
    /// `%s` URL template.
    #[must_use]
    pub fn new(scheme: impl Into<String>, template: impl Into<String>) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(FETCH_TIMEOUT))
            .build()
            .new_agent();
        Self {
            scheme: scheme.into(),
            template: template.into(),
            agent,
        }
    }

    /// The `github:` source backed by `https://github.com/<user>.keys`.
    #[must_use]
    pub fn github() -> Self {
        Self::new(GITHUB_SCHEME, GITHUB_KEYS_TEMPLATE)
    }

    /// The `custom:` source with a caller-supplied template.
    #[must_use]
    pub fn custom(template: impl Into<String>) -> Self {
        Self::new(CUSTOM_SCHEME, template)
    }

    /// Fetch and parse the trusted key set for one reference.
    fn fetch_keys(&self, reference: &IssuerRef) -> Result<HashSet<[u8; 32]>> {
        let identifier = reference.identifier_for(&self.scheme).ok_or_else(|| {
            BytecheckError::TrustFetch(format!("missing identifier in '{reference}'"))
        })?;
        let url = self.template.replacen("%s", identifier, 1);

        let body = if let Some(path) = url.strip_prefix("file://") {
            std::fs::read_to_string(path)
                .map_err(|err| BytecheckError::TrustFetch(format!("failed to read {url}: {err}")))?
        } else {
            let response = self.agent.get(&url).call().map_err(|err| {
                BytecheckError::TrustFetch(format!("failed to fetch {url}: {err}"))
            })?;
            if response.status() != 200 {
                return Err(BytecheckError::TrustFetch(format!(
                    "failed to fetch {url}: status {}",
                    response.status()
                )));
            }
            response.into_body().read_to_string().map_err(|err| {
                BytecheckError::TrustFetch(format!("failed to read body of {url}: {err}"))
            })?
        };

        Ok(parse_trusted_keys(&body))
    }

    fn classify(&self, reference: &IssuerRef, group: &[Issuer]) -> TrustOutcome {
        match self.fetch_keys(reference) {
            Ok(trusted) => {
                let absent = group
                    .iter()
                    .any(|issuer| !trusted.contains(issuer.public_key.as_bytes()));
                if absent {
                    TrustOutcome::Fishy {
                        detail: format!(
                            "a public key seen for '{reference}' is not in the trusted source"
                        ),
                    }
                } else {
                    TrustOutcome::Trusted
                }
            }
            Err(err) => {
                tracing::warn!("trust resolution for '{reference}' failed: {err}");
                TrustOutcome::Error {
                    detail: err.to_string(),
                }
            }
        }
    }
}

impl IssuerVerifier for UrlKeySource {
    fn supports(&self, reference: &IssuerRef) -> bool {
        reference.as_str().starts_with(&self.scheme)
    }

    fn verify(&self, issuers: &[Issuer]) -> BTreeMap<IssuerRef, TrustOutcome> {
        let mut groups: BTreeMap<IssuerRef, Vec<Issuer>> = BTreeMap::new();
        for issuer in issuers {
            if self.supports(&issuer.reference) {
                groups
                    .entry(issuer.reference.clone())
                    .or_default()
                    .push(issuer.clone());
            }
        }

        groups
            .into_iter()
            .map(|(reference, group)| {
                let outcome = self.classify(&reference, &group);
                (reference, outcome)
            })
            .collect()
    }
}

/// Parse an `authorized_keys`-format body into the set of raw ed25519
/// keys it contains. Malformed lines and other algorithms are ignored.
fn parse_trusted_keys(body: &str) -> HashSet<[u8; 32]> {
    body.lines()
        .filter_map(openssh::parse_authorized_key)
        .map(|(_, key)| key.to_bytes())
        .collect()
}
