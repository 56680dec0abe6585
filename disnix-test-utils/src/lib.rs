// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Test infrastructure: fake store / client-interface executables.
//!
//! The coordinator never links against the package manager directly — it
//! only shells out to it — so its tests can stand in a tiny shell script for
//! `nix-store`, `nix-env`, or a target's client-interface program instead of
//! requiring a real Nix installation.

use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use tempfile::TempDir;

/// A temporary directory with a canonicalized path, so comparisons against
/// paths returned by child processes (which may themselves canonicalize)
/// are stable.
pub struct CanonicalTempDir {
    _inner: TempDir,
    path: PathBuf,
}

impl CanonicalTempDir {
    pub fn new() -> std::io::Result<Self> {
        let inner = TempDir::new()?;
        let path = inner.path().canonicalize()?;
        Ok(Self { _inner: inner, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A small shell script standing in for an external executable (`nix-store`,
/// `nix-env`, or a client-interface program) in tests.
pub struct FakeScript {
    _dir: TempDir,
    pub path: PathBuf,
}

impl FakeScript {
    /// Write `body` as the contents of a `#!/bin/sh` script named `name`,
    /// make it executable, and return a handle whose `path` can be passed
    /// as `argv[0]`.
    pub fn new(name: &str, body: &str) -> std::io::Result<Self> {
        let dir = TempDir::new()?;
        let path = dir.path().join(name);
        std::fs::write(&path, format!("#!/bin/sh\nset -e\n{body}\n"))?;

        #[cfg(unix)]
        {
            let mut perms = std::fs::metadata(&path)?.permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&path, perms)?;
        }

        Ok(Self { _dir: dir, path })
    }

    /// A fake that always succeeds, optionally echoing `stdout_lines`
    /// (newline separated) to stdout first.
    pub fn succeeding(name: &str, stdout_lines: &[&str]) -> std::io::Result<Self> {
        let echoes: String = stdout_lines
            .iter()
            .map(|line| format!("echo '{line}'\n"))
            .collect();
        Self::new(name, &format!("{echoes}exit 0"))
    }

    /// A fake that always fails with the given exit code.
    pub fn failing(name: &str, exit_code: u8) -> std::io::Result<Self> {
        Self::new(name, &format!("exit {exit_code}"))
    }

    pub fn as_str(&self) -> &str {
        self.path.to_str().expect("fake script path is valid utf8")
    }
}
