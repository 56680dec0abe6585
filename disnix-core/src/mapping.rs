// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! The distributed derivation: an ordered mapping from targets to the
//! derivations they must carry.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::store_path::DerivationPath;
use crate::target::Target;

/// One (derivation, target) pair from the input document.
///
/// Order within the containing [`DistributedDerivation`] is significant only
/// for deterministic reporting, not for scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub derivation: DerivationPath,
    pub target: Target,
}

/// The parsed top-level input: an ordered list of mapping entries.
///
/// Consumed once; no schema version negotiation is performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributedDerivation {
    pub mappings: Vec<MappingEntry>,
}

#[derive(Debug, thiserror::Error)]
pub enum DistributedDerivationError {
    #[error("failed to read distributed derivation file {path:?}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed distributed derivation document: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(
        "duplicate mapping entry: derivation {derivation} already mapped to target {target}"
    )]
    DuplicateEntry {
        derivation: String,
        target: String,
    },
}

impl DistributedDerivation {
    /// Parse a distributed derivation document from its JSON text form.
    pub fn from_json_str(contents: &str) -> Result<Self, DistributedDerivationError> {
        let parsed: Self = serde_json::from_str(contents)?;
        parsed.check_invariants()?;
        Ok(parsed)
    }

    /// Parse a distributed derivation document from a file on disk.
    pub fn from_file(path: &Path) -> Result<Self, DistributedDerivationError> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| DistributedDerivationError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json_str(&contents)
    }

    /// Each (derivation, target) pair must appear at most once.
    fn check_invariants(&self) -> Result<(), DistributedDerivationError> {
        let mut seen = std::collections::BTreeSet::new();
        for entry in &self.mappings {
            let key = (entry.derivation.as_str().to_string(), entry.target.name.clone());
            if !seen.insert(key) {
                return Err(DistributedDerivationError::DuplicateEntry {
                    derivation: entry.derivation.as_str().to_string(),
                    target: entry.target.name.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"
        {
          "mappings": [
            {
              "derivation": "/nix/store/aaaa-foo.drv",
              "target": {
                "name": "t1",
                "target_property": "hostname",
                "client_interface": "disnix-ssh-client",
                "properties": { "hostname": "10.0.0.1" }
              }
            }
          ]
        }
        "#
    }

    #[test]
    fn parses_minimal_document() {
        let doc = DistributedDerivation::from_json_str(sample_json()).unwrap();
        assert_eq!(doc.mappings.len(), 1);
        assert_eq!(doc.mappings[0].target.name, "t1");
    }

    #[test]
    fn rejects_malformed_document() {
        let err = DistributedDerivation::from_json_str("not json").unwrap_err();
        assert!(matches!(err, DistributedDerivationError::Malformed(_)));
    }

    #[test]
    fn rejects_duplicate_mapping_entries() {
        let json = r#"
        {
          "mappings": [
            { "derivation": "/nix/store/aaaa-foo.drv", "target": { "name": "t1", "target_property": "hostname", "client_interface": "c", "properties": {} } },
            { "derivation": "/nix/store/aaaa-foo.drv", "target": { "name": "t1", "target_property": "hostname", "client_interface": "c", "properties": {} } }
          ]
        }
        "#;
        let err = DistributedDerivation::from_json_str(json).unwrap_err();
        assert!(matches!(
            err,
            DistributedDerivationError::DuplicateEntry { .. }
        ));
    }

    #[test]
    fn empty_mapping_list_is_valid() {
        let doc = DistributedDerivation::from_json_str(r#"{"mappings": []}"#).unwrap();
        assert!(doc.mappings.is_empty());
    }
}
