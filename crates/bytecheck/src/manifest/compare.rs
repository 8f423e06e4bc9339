//! Manifest comparison.

use crate::manifest::{Entity, Manifest};
use serde::Serialize;
use std::collections::BTreeMap;

/// The kind of difference found between two manifests for one entity name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DifferenceKind {
    /// Entity exists in B but not in A.
    MissingInA,
    /// Entity exists in A but not in B.
    MissingInB,
    /// Entities exist in both with different checksums.
    ChecksumMismatch,
    /// One side is a file and the other a directory. Shadows any
    /// checksum mismatch for the same name.
    TypeMismatch,
}

impl std::fmt::Display for DifferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::MissingInA => "missing_in_a",
            Self::MissingInB => "missing_in_b",
            Self::ChecksumMismatch => "checksum_mismatch",
            Self::TypeMismatch => "type_mismatch",
        };
        f.write_str(label)
    }
}

/// A single difference between two manifests.
#[derive(Debug, Clone, Serialize)]
pub struct EntityDifference {
    /// Entity name the difference applies to.
    pub name: String,
    /// What kind of difference was found.
    pub kind: DifferenceKind,
    /// The entity as recorded in manifest A, when present.
    pub expected: Option<Entity>,
    /// The entity as recorded in manifest B, when present.
    pub actual: Option<Entity>,
}

/// Compare two manifests by entity name.
///
/// Returns whether the manifests are identical plus the list of
/// differences in ascending name order. Comparison is symmetric over the
/// name sets; the HMAC and auditor fields do not participate.
#[must_use]
pub fn compare(a: &Manifest, b: &Manifest) -> (bool, Vec<EntityDifference>) {
    let by_name = |m: &Manifest| -> BTreeMap<String, Entity> {
        m.entities
            .iter()
            .map(|e| (e.name.clone(), e.clone()))
            .collect()
    };
    let entities_a = by_name(a);
    let entities_b = by_name(b);

    let mut names: Vec<&String> = entities_a.keys().chain(entities_b.keys()).collect();
    names.sort();
    names.dedup();

    let mut differences = Vec::new();
    for name in names {
        match (entities_a.get(name), entities_b.get(name)) {
            (Some(entity_a), None) => differences.push(EntityDifference {
                name: name.clone(),
                kind: DifferenceKind::MissingInB,
                expected: Some(entity_a.clone()),
                actual: None,
            }),
            (None, Some(entity_b)) => differences.push(EntityDifference {
                name: name.clone(),
                kind: DifferenceKind::MissingInA,
                expected: None,
                actual: Some(entity_b.clone()),
            }),
            (Some(entity_a), Some(entity_b)) => {
                let kind = if entity_a.is_dir != entity_b.is_dir {
                    Some(DifferenceKind::TypeMismatch)
                } else if entity_a.checksum != entity_b.checksum {
                    Some(DifferenceKind::ChecksumMismatch)
                } else {
                    None
                };
                if let Some(kind) = kind {
                    differences.push(EntityDifference {
                        name: name.clone(),
                        kind,
                        expected: Some(entity_a.clone()),
                        actual: Some(entity_b.clone()),
                    });
                }
            }
            (None, None) => unreachable!("name came from one of the maps"),
        }
    }

    (differences.is_empty(), differences)
}
