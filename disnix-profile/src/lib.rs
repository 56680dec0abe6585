// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Coordinator-profile writer.
//!
//! After a successful deployment, records the active manifest path in a
//! per-user profile symlink so later tools can recover the "last deployed
//! configuration". The record is made by invoking the store's
//! `set_profile` primitive, which materialises the path as an atomic
//! symlink flip; writing is a no-op if the symlink (after following at
//! most one generation indirection) already points at the new manifest.

mod error;

pub use error::ProfileError;

use std::path::{Path, PathBuf};

use log::debug;

use disnix_store::StoreClient;

/// Default profile name used when the caller doesn't pick one.
pub const DEFAULT_PROFILE_NAME: &str = "default";

/// Directory segment under the state dir holding per-user coordinator
/// profiles: `<state-dir>/profiles/per-user/<user>/disnix-coordinator`.
const PROFILE_SUBPATH: &str = "disnix-coordinator";

/// Writes (idempotently) the coordinator's "last deployed configuration"
/// symlink.
pub struct ProfileWriter {
    store: StoreClient,
    base_dir: PathBuf,
}

impl ProfileWriter {
    /// Resolve the per-user profile directory under `state_dir`, unless
    /// `override_dir` names one explicitly.
    pub fn new(
        store: StoreClient,
        state_dir: &Path,
        override_dir: Option<PathBuf>,
    ) -> Result<Self, ProfileError> {
        let base_dir = match override_dir {
            Some(dir) => dir,
            None => {
                let user = current_username()?;
                state_dir
                    .join("profiles")
                    .join("per-user")
                    .join(user)
                    .join(PROFILE_SUBPATH)
            }
        };
        Ok(Self { store, base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Record `manifest_path` under `profile_name`. A no-op if the profile
    /// symlink already resolves to the same path.
    pub async fn record(
        &self,
        profile_name: &str,
        manifest_path: &str,
    ) -> Result<(), ProfileError> {
        std::fs::create_dir_all(&self.base_dir).map_err(|source| ProfileError::CreateDir {
            path: self.base_dir.clone(),
            source,
        })?;

        let normalised = normalise_manifest_path(manifest_path);
        let symlink_path = self.base_dir.join(profile_name);

        if let Some(current) = resolve_current_target(&symlink_path) {
            if current.to_string_lossy() == normalised {
                debug!(
                    "coordinator profile {profile_name:?} already points at {normalised:?}; no-op"
                );
                return Ok(());
            }
        }

        debug!("coordinator profile {profile_name:?}: setting to {normalised:?}");
        self.store
            .set_profile(&symlink_path, &normalised)
            .await
            .map_err(ProfileError::SetProfile)
    }
}

fn current_username() -> Result<String, ProfileError> {
    #[cfg(unix)]
    {
        let uid = nix::unistd::Uid::current();
        let user = nix::unistd::User::from_uid(uid)
            .map_err(|_| ProfileError::UnknownUser)?
            .ok_or(ProfileError::UnknownUser)?;
        Ok(user.name)
    }
    #[cfg(not(unix))]
    {
        std::env::var("USERNAME").map_err(|_| ProfileError::UnknownUser)
    }
}

/// `path` unchanged if it already begins with `/` or `./`; otherwise `./`
/// is prepended, so `set_profile` always receives a path-like string.
fn normalise_manifest_path(path: &str) -> String {
    if path.starts_with('/') || path.as_bytes().get(1) == Some(&b'/') {
        path.to_string()
    } else {
        format!("./{path}")
    }
}

/// Read the symlink at `path`, following one additional hop within the
/// same directory if it resolves to a bare generation name (no `/`).
/// Returns `None` if `path` doesn't exist or isn't a symlink.
fn resolve_current_target(path: &Path) -> Option<PathBuf> {
    let target = std::fs::read_link(path).ok()?;

    let is_generation_name = target
        .to_str()
        .map(|s| !s.is_empty() && !s.contains('/'))
        .unwrap_or(false);

    if !is_generation_name {
        return Some(target);
    }

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let indirect = dir.join(&target);
    match std::fs::read_link(&indirect) {
        Ok(resolved) => Some(resolved),
        Err(_) => Some(indirect),
    }
}
