// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Typed wrappers around the package manager's store primitives.
//!
//! Every method here shells out to a configurable command name (defaulting
//! to the real `nix-store`/`nix-env`/`nix-collect-garbage`, looked up via
//! `PATH`) and returns one of the futures from `disnix-process`.

use std::path::Path;

use disnix_core::store_path::{DerivationPath, StorePath};
use disnix_process::{BoolFuture, Stdio, StrvFuture};
use tokio_util::sync::CancellationToken;

use crate::bundle::ClosureBundle;
use crate::error::StoreError;

/// Which external command names to invoke. Defaults match the real tools;
/// tests substitute fakes.
#[derive(Debug, Clone)]
pub struct StoreCommands {
    pub store_cmd: String,
    pub env_cmd: String,
    pub collect_garbage_cmd: String,
}

impl Default for StoreCommands {
    fn default() -> Self {
        Self {
            store_cmd: "nix-store".to_string(),
            env_cmd: "nix-env".to_string(),
            collect_garbage_cmd: "nix-collect-garbage".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StoreClient {
    commands: StoreCommands,
}

fn parse_paths(lines: Vec<String>) -> Result<Vec<StorePath>, StoreError> {
    lines
        .into_iter()
        .map(|line| StorePath::new(line.clone()).map_err(|e| StoreError::MalformedPath(line, e)))
        .collect()
}

impl StoreClient {
    pub fn new(commands: StoreCommands) -> Self {
        Self { commands }
    }

    /// `nix-store --realise <paths...>` — yields the realised output paths.
    ///
    /// Raced against `cancel`: if cancellation arrives mid-build, the child
    /// is sent `SIGTERM` and the call reports `StoreError::Realise`.
    pub async fn realise(
        &self,
        derivations: &[DerivationPath],
        cancel: &CancellationToken,
    ) -> Result<Vec<StorePath>, StoreError> {
        let mut argv = vec![self.commands.store_cmd.clone(), "--realise".to_string()];
        argv.extend(derivations.iter().map(|d| d.as_str().to_string()));

        let future = StrvFuture::spawn(&argv, Stdio::Null, None, '\n').map_err(StoreError::Realise)?;
        let lines = future
            .wait_cancellable(cancel)
            .await
            .map_err(StoreError::Realise)?;
        parse_paths(lines)
    }

    /// `nix-store --query --requisites <paths...>`.
    pub async fn query_requisites(
        &self,
        paths: &[StorePath],
    ) -> Result<Vec<StorePath>, StoreError> {
        let mut argv = vec![
            self.commands.store_cmd.clone(),
            "--query".to_string(),
            "--requisites".to_string(),
        ];
        argv.extend(paths.iter().map(|p| p.as_str().to_string()));

        let future =
            StrvFuture::spawn(&argv, Stdio::Null, None, '\n').map_err(StoreError::QueryRequisites)?;
        let lines = future.wait().await.map_err(StoreError::QueryRequisites)?;
        parse_paths(lines)
    }

    /// `nix-store --check-validity --print-invalid <paths...>`.
    pub async fn print_invalid(&self, paths: &[StorePath]) -> Result<Vec<StorePath>, StoreError> {
        let mut argv = vec![
            self.commands.store_cmd.clone(),
            "--check-validity".to_string(),
            "--print-invalid".to_string(),
        ];
        argv.extend(paths.iter().map(|p| p.as_str().to_string()));

        let future =
            StrvFuture::spawn(&argv, Stdio::Null, None, '\n').map_err(StoreError::PrintInvalid)?;
        let lines = future.wait().await.map_err(StoreError::PrintInvalid)?;
        parse_paths(lines)
    }

    /// `nix-store --export <paths...>`, with stdout attached to a freshly
    /// allocated closure bundle under `tmp_dir`.
    ///
    /// The bundle is created before the child is spawned; if allocation
    /// fails, nothing is forked.
    ///
    /// Raced against `cancel`, same contract as [`StoreClient::realise`].
    pub async fn export_closure(
        &self,
        paths: &[StorePath],
        tmp_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<ClosureBundle, StoreError> {
        let bundle = ClosureBundle::allocate(tmp_dir)?;
        let stdout_handle = bundle.try_clone_handle()?;

        let mut argv = vec![self.commands.store_cmd.clone(), "--export".to_string()];
        argv.extend(paths.iter().map(|p| p.as_str().to_string()));

        let future = BoolFuture::spawn(&argv, Stdio::Null, Stdio::File(stdout_handle), None)
            .map_err(StoreError::Export)?;
        future
            .wait_cancellable(cancel)
            .await
            .map_err(StoreError::Export)?;

        Ok(bundle)
    }

    /// `nix-store --import`, reading the bundle on stdin.
    pub async fn import_closure(&self, bundle: &ClosureBundle) -> Result<(), StoreError> {
        let stdin_handle = bundle.reopen()?;
        let argv = [self.commands.store_cmd.clone(), "--import".to_string()];
        let future = BoolFuture::spawn(&argv, Stdio::File(stdin_handle), Stdio::Inherit, None)
            .map_err(StoreError::Import)?;
        future.wait().await.map_err(StoreError::Import)
    }

    /// `nix-collect-garbage [-d]`.
    pub async fn collect_garbage(&self, delete_old: bool) -> Result<(), StoreError> {
        let mut argv = vec![self.commands.collect_garbage_cmd.clone()];
        if delete_old {
            argv.push("-d".to_string());
        }
        let future = BoolFuture::spawn(&argv, Stdio::Null, Stdio::Inherit, None)
            .map_err(StoreError::CollectGarbage)?;
        future.wait().await.map_err(StoreError::CollectGarbage)
    }

    /// `nix-env -p <profile> --set <path>`.
    ///
    /// `target` is taken as a plain path string rather than a [`StorePath`]:
    /// the coordinator-profile writer normalises manifest paths to begin
    /// with `/` or `./` before calling this, and the latter is not a valid
    /// `StorePath` (store paths are always absolute).
    pub async fn set_profile(&self, profile: &Path, target: &str) -> Result<(), StoreError> {
        let argv = [
            self.commands.env_cmd.clone(),
            "-p".to_string(),
            profile.to_string_lossy().into_owned(),
            "--set".to_string(),
            target.to_string(),
        ];
        let future = BoolFuture::spawn(&argv, Stdio::Null, Stdio::Inherit, None)
            .map_err(StoreError::SetProfile)?;
        future.wait().await.map_err(StoreError::SetProfile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use disnix_test_utils::FakeScript;
    use std::str::FromStr;

    fn client_with_fake(fake: &FakeScript) -> StoreClient {
        StoreClient::new(StoreCommands {
            store_cmd: fake.as_str().to_string(),
            env_cmd: fake.as_str().to_string(),
            collect_garbage_cmd: fake.as_str().to_string(),
        })
    }

    #[tokio::test]
    async fn realise_parses_output_paths() {
        let fake = FakeScript::succeeding(
            "nix-store",
            &["/nix/store/aaaa-out1", "/nix/store/bbbb-out2"],
        )
        .unwrap();
        let client = client_with_fake(&fake);
        let drv = DerivationPath::from_str("/nix/store/cccc-foo.drv").unwrap();
        let outputs = client
            .realise(&[drv], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            outputs,
            vec![
                StorePath::new("/nix/store/aaaa-out1").unwrap(),
                StorePath::new("/nix/store/bbbb-out2").unwrap(),
            ]
        );
    }

    #[tokio::test]
    async fn realise_failure_is_propagated() {
        let fake = FakeScript::failing("nix-store", 1).unwrap();
        let client = client_with_fake(&fake);
        let drv = DerivationPath::from_str("/nix/store/cccc-foo.drv").unwrap();
        assert!(client
            .realise(&[drv], &CancellationToken::new())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn realise_is_terminated_when_cancelled_mid_build() {
        let fake = FakeScript::new("nix-store", "sleep 30").unwrap();
        let client = client_with_fake(&fake);
        let drv = DerivationPath::from_str("/nix/store/cccc-foo.drv").unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(client.realise(&[drv], &cancel).await.is_err());
    }

    #[tokio::test]
    async fn export_then_import_round_trips_through_bundle_file() {
        let export_fake = FakeScript::new("nix-store", "echo exported-payload").unwrap();
        let import_fake = FakeScript::new(
            "nix-store",
            "cat > /dev/null",
        )
        .unwrap();

        let tmp = tempfile::tempdir().unwrap();
        let export_client = client_with_fake(&export_fake);
        let path = StorePath::new("/nix/store/aaaa-foo").unwrap();
        let bundle = export_client
            .export_closure(&[path], tmp.path(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(bundle.path()).unwrap().trim(),
            "exported-payload"
        );

        let import_client = client_with_fake(&import_fake);
        import_client.import_closure(&bundle).await.unwrap();
    }

    #[tokio::test]
    async fn export_failure_does_not_leak_bundle_file() {
        let fake = FakeScript::failing("nix-store", 1).unwrap();
        let client = client_with_fake(&fake);
        let tmp = tempfile::tempdir().unwrap();
        let path = StorePath::new("/nix/store/aaaa-foo").unwrap();
        let err = client
            .export_closure(&[path], tmp.path(), &CancellationToken::new())
            .await;
        assert!(err.is_err());
        // No bundle file should remain in tmp_dir (aside from unrelated entries).
        let leftover: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert!(leftover.is_empty());
    }

    #[tokio::test]
    async fn set_profile_invokes_env_cmd_with_profile_and_target() {
        let fake = FakeScript::new(
            "nix-env",
            "[ \"$1\" = -p ] && [ \"$3\" = --set ]",
        )
        .unwrap();
        let client = client_with_fake(&fake);
        client
            .set_profile(Path::new("/nix/var/nix/profiles/default"), "./manifest")
            .await
            .unwrap();
    }
}
