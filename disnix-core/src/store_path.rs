// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Store path and derivation path types.
//!
//! Deliberately minimal: the coordinator never computes content hashes or
//! parses a store path's internal structure, it only compares, orders and
//! transports opaque path strings. No IO happens here.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An absolute filesystem path under the package manager's store, treated as
/// an opaque identifier. Two store paths compare by byte equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorePath(String);

/// A [`StorePath`] that does not look like an absolute store path.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("not an absolute store path: {0:?}")]
pub struct InvalidStorePath(String);

impl StorePath {
    pub fn new(path: impl Into<String>) -> Result<Self, InvalidStorePath> {
        let path = path.into();
        if !path.starts_with('/') || path.len() < 2 {
            return Err(InvalidStorePath(path));
        }
        Ok(Self(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// The final path component, e.g. `aaaa...-foo-1.0`.
    pub fn base_name(&self) -> &str {
        self.as_path()
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for StorePath {
    type Err = InvalidStorePath;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for StorePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A store path whose content is a build recipe. Realising it yields one or
/// more output store paths.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DerivationPath(StorePath);

/// A [`StorePath`] that is not a derivation (does not end in `.drv`).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("not a derivation path (missing .drv suffix): {0}")]
pub struct NotADerivation(StorePath);

impl DerivationPath {
    pub fn new(path: StorePath) -> Result<Self, NotADerivation> {
        if path.as_str().ends_with(".drv") {
            Ok(Self(path))
        } else {
            Err(NotADerivation(path))
        }
    }

    pub fn as_store_path(&self) -> &StorePath {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for DerivationPath {
    type Err = DerivationPathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let path = StorePath::new(s)?;
        Ok(Self::new(path)?)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DerivationPathParseError {
    #[error(transparent)]
    InvalidPath(#[from] InvalidStorePath),
    #[error(transparent)]
    NotADerivation(#[from] NotADerivation),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_relative_paths() {
        assert!(StorePath::new("relative/path").is_err());
        assert!(StorePath::new("").is_err());
    }

    #[test]
    fn accepts_absolute_paths() {
        let p = StorePath::new("/nix/store/aaaa-foo").unwrap();
        assert_eq!(p.as_str(), "/nix/store/aaaa-foo");
        assert_eq!(p.base_name(), "aaaa-foo");
    }

    #[test]
    fn derivation_path_requires_drv_suffix() {
        let p = StorePath::new("/nix/store/aaaa-foo").unwrap();
        assert!(DerivationPath::new(p).is_err());

        let drv = StorePath::new("/nix/store/aaaa-foo.drv").unwrap();
        assert!(DerivationPath::new(drv).is_ok());
    }

    #[test]
    fn equality_is_byte_equality() {
        let a = StorePath::new("/nix/store/aaaa-foo").unwrap();
        let b = StorePath::new("/nix/store/aaaa-foo").unwrap();
        let c = StorePath::new("/nix/store/bbbb-foo").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
