// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Closure bundles: temporary files holding a serialised store closure.
//!
//! Owned by whichever job created them; released (file deleted) on drop, so
//! "no bundle leaks on failure" holds on every exit path including an early
//! return via `?`.

use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::StoreError;

/// A temporary file holding the serialised transitive closure of a set of
/// store paths, named `<tmpdir>/disnix.XXXXXX` in the spirit of `mkstemp`.
pub struct ClosureBundle {
    file: NamedTempFile,
}

impl ClosureBundle {
    /// Allocate a new, empty bundle file under `tmp_dir`. Creation happens
    /// before any child process is spawned, so a failure here aborts before
    /// any fork/exec takes place.
    pub fn allocate(tmp_dir: &Path) -> Result<Self, StoreError> {
        let file = tempfile::Builder::new()
            .prefix("disnix.")
            .tempfile_in(tmp_dir)
            .map_err(StoreError::BundleAllocation)?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Re-open the bundle file for reading, for handing to an importer as
    /// stdin.
    pub fn reopen(&self) -> Result<std::fs::File, StoreError> {
        self.file.reopen().map_err(StoreError::BundleAllocation)
    }

    /// Hand over the open file descriptor for writing, consuming nothing —
    /// used to attach the bundle as a child's stdout during export.
    pub fn try_clone_handle(&self) -> Result<std::fs::File, StoreError> {
        self.file.as_file().try_clone().map_err(StoreError::BundleAllocation)
    }
}
