//! Issuer trust resolution.
//!
//! Auditing a manifest proves cryptographically that *someone* holding a
//! key sealed it. Whether that key belongs to who the certificate claims
//! is decided here: each issuer reference (`github:alice`,
//! `custom:build-bot`) maps to an external source of authorized public
//! keys, and the keys seen during the walk are checked against it.
//!
//! Fetch failures are deliberately non-fatal: offline verification still
//! produces a useful report, with the affected references marked as
//! unresolved rather than the whole run failing.

use ed25519_dalek::VerifyingKey;
use std::collections::BTreeMap;

pub mod url_source;

pub use url_source::UrlKeySource;

use crate::config::Config;

/// A `scheme:identifier` issuer reference, e.g. `github:alice`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IssuerRef(String);

impl IssuerRef {
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identifier part after `scheme_prefix`, when this reference
    /// uses that scheme and the identifier is non-empty.
    #[must_use]
    pub fn identifier_for(&self, scheme_prefix: &str) -> Option<&str> {
        self.0
            .strip_prefix(scheme_prefix)
            .filter(|identifier| !identifier.is_empty())
    }
}

impl std::fmt::Display for IssuerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One issuer identity observed during manifest auditing: a reference
/// plus a public key that vouched under it.
#[derive(Debug, Clone)]
pub struct Issuer {
    pub reference: IssuerRef,
    pub public_key: VerifyingKey,
}

/// Classification of one issuer reference after trust resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustOutcome {
    /// Every observed public key for this reference appears in the
    /// fetched trusted set.
    Trusted,
    /// The trusted set was fetched but at least one observed key is
    /// absent from it.
    Fishy { detail: String },
    /// The trusted set could not be fetched.
    Error { detail: String },
    /// No verifier recognizes this reference's scheme.
    Unsupported,
}

impl TrustOutcome {
    #[must_use]
    pub fn is_trusted(&self) -> bool {
        matches!(self, Self::Trusted)
    }
}

impl std::fmt::Display for TrustOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trusted => f.write_str("trusted"),
            Self::Fishy { detail } => write!(f, "fishy: {detail}"),
            Self::Error { detail } => write!(f, "error: {detail}"),
            Self::Unsupported => f.write_str("unsupported"),
        }
    }
}

/// Resolves issuer references against external trusted-key sources.
pub trait IssuerVerifier {
    /// Whether this verifier handles the reference's scheme.
    fn supports(&self, reference: &IssuerRef) -> bool;

    /// Classify every distinct reference among `issuers`.
    fn verify(&self, issuers: &[Issuer]) -> BTreeMap<IssuerRef, TrustOutcome>;
}

/// Ordered collection of verifiers; the first one whose scheme matches a
/// reference handles it. There is no fallback chaining across verifiers:
/// a key unknown to its own scheme's source must not be upgraded by
/// another source.
#[derive(Default)]
pub struct MultiSourceVerifier {
    verifiers: Vec<Box<dyn IssuerVerifier>>,
}

impl MultiSourceVerifier {
    #[must_use]
    pub fn new(verifiers: Vec<Box<dyn IssuerVerifier>>) -> Self {
        Self { verifiers }
    }

    /// The standard verifier set: `github:` always, `custom:` when the
    /// configuration binds a URL template for it.
    #[must_use]
    pub fn with_default_sources(config: &Config) -> Self {
        let mut verifiers: Vec<Box<dyn IssuerVerifier>> = vec![Box::new(UrlKeySource::github())];
        if let Some(template) = &config.custom_verifier_template {
            verifiers.push(Box::new(UrlKeySource::custom(template.clone())));
        }
        Self::new(verifiers)
    }
}

impl IssuerVerifier for MultiSourceVerifier {
    fn supports(&self, _reference: &IssuerRef) -> bool {
        true
    }

    fn verify(&self, issuers: &[Issuer]) -> BTreeMap<IssuerRef, TrustOutcome> {
        let mut results = BTreeMap::new();
        for issuer in issuers {
            if results.contains_key(&issuer.reference) {
                continue;
            }
            let group: Vec<Issuer> = issuers
                .iter()
                .filter(|candidate| candidate.reference == issuer.reference)
                .cloned()
                .collect();

            let outcome = match self
                .verifiers
                .iter()
                .find(|verifier| verifier.supports(&issuer.reference))
            {
                Some(verifier) => verifier
                    .verify(&group)
                    .remove(&issuer.reference)
                    .unwrap_or(TrustOutcome::Unsupported),
                None => TrustOutcome::Unsupported,
            };
            results.insert(issuer.reference.clone(), outcome);
        }
        results
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    fn issuer(reference: &str) -> Issuer {
        Issuer {
            reference: IssuerRef::new(reference),
            public_key: SigningKey::generate(&mut OsRng).verifying_key(),
        }
    }

    /// Verifier that recognizes one scheme and returns a fixed outcome.
    struct FixedVerifier {
        scheme: &'static str,
        outcome: TrustOutcome,
    }

    impl IssuerVerifier for FixedVerifier {
        fn supports(&self, reference: &IssuerRef) -> bool {
            reference.as_str().starts_with(self.scheme)
        }

        fn verify(&self, issuers: &[Issuer]) -> BTreeMap<IssuerRef, TrustOutcome> {
            issuers
                .iter()
                .map(|i| (i.reference.clone(), self.outcome.clone()))
                .collect()
        }
    }

    #[test]
    fn identifier_extraction() {
        let reference = IssuerRef::new("github:alice");
        assert_eq!(reference.identifier_for("github:"), Some("alice"));
        assert_eq!(reference.identifier_for("custom:"), None);
        assert_eq!(IssuerRef::new("github:").identifier_for("github:"), None);
    }

    #[test]
    fn first_matching_verifier_wins() {
        let multi = MultiSourceVerifier::new(vec![
            Box::new(FixedVerifier {
                scheme: "github:",
                outcome: TrustOutcome::Trusted,
            }),
            Box::new(FixedVerifier {
                scheme: "github:",
                outcome: TrustOutcome::Unsupported,
            }),
        ]);
        let results = multi.verify(&[issuer("github:alice")]);
        assert_eq!(
            results[&IssuerRef::new("github:alice")],
            TrustOutcome::Trusted
        );
    }

    #[test]
    fn unrecognized_scheme_is_unsupported() {
        let multi = MultiSourceVerifier::new(vec![Box::new(FixedVerifier {
            scheme: "github:",
            outcome: TrustOutcome::Trusted,
        })]);
        let results = multi.verify(&[issuer("gitlab:bob")]);
        assert_eq!(
            results[&IssuerRef::new("gitlab:bob")],
            TrustOutcome::Unsupported
        );
    }

    #[test]
    fn each_reference_classified_once() {
        let multi = MultiSourceVerifier::new(vec![Box::new(FixedVerifier {
            scheme: "github:",
            outcome: TrustOutcome::Trusted,
        })]);
        let issuers = vec![
            issuer("github:alice"),
            issuer("github:alice"),
            issuer("github:bob"),
        ];
        let results = multi.verify(&issuers);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn default_sources_without_custom_template() {
        let config = Config {
            hmac_key: crate::manifest::HmacKey::default(),
            custom_verifier_template: None,
        };
        let multi = MultiSourceVerifier::with_default_sources(&config);
        let results = multi.verify(&[issuer("custom:build-bot")]);
        assert_eq!(
            results[&IssuerRef::new("custom:build-bot")],
            TrustOutcome::Unsupported
        );
    }

    #[test]
    fn outcome_display_labels() {
        assert_eq!(TrustOutcome::Trusted.to_string(), "trusted");
        assert_eq!(TrustOutcome::Unsupported.to_string(), "unsupported");
        assert!(TrustOutcome::Error {
            detail: "offline".to_string()
        }
        .to_string()
        .starts_with("error"));
    }
}
