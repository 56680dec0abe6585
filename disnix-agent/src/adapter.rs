// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Adapter driving a target's client-interface executable.
//!
//! Composes invocations of the form `<client-interface> <address> --export`
//! (copy-to, reading the closure bundle on stdin) and `<client-interface>
//! <address> --import` (remote-import, no stdin), mirroring the disnix
//! client contract. Stdout is not interpreted; only the exit status matters.

use disnix_core::target::Target;
use disnix_process::{BoolFuture, Stdio};
use disnix_store::ClosureBundle;
use tokio_util::sync::CancellationToken;

use crate::error::AgentError;

pub struct RemoteAgent {
    client_interface: String,
    address: String,
}

impl RemoteAgent {
    pub fn for_target(target: &Target) -> Result<Self, AgentError> {
        let address = target.address()?.to_string();
        Ok(Self {
            client_interface: target.client_interface.clone(),
            address,
        })
    }

    /// Transfer `bundle`'s contents to the target over the client-interface
    /// in copy-to mode.
    ///
    /// Raced against `cancel`: a transfer still running when cancellation
    /// arrives is sent `SIGTERM` rather than left to finish.
    pub async fn copy_to(
        &self,
        bundle: &ClosureBundle,
        cancel: &CancellationToken,
    ) -> Result<(), AgentError> {
        let stdin = std::fs::File::open(bundle.path()).map_err(AgentError::OpenBundle)?;
        let argv = [
            self.client_interface.clone(),
            self.address.clone(),
            "--export".to_string(),
        ];
        let future = BoolFuture::spawn(&argv, Stdio::File(stdin), Stdio::Inherit, None)
            .map_err(AgentError::CopyTo)?;
        future
            .wait_cancellable(cancel)
            .await
            .map_err(AgentError::CopyTo)
    }

    /// Instruct the remote agent to import the bundle just transferred.
    ///
    /// Raced against `cancel`, same contract as [`RemoteAgent::copy_to`].
    pub async fn remote_import(&self, cancel: &CancellationToken) -> Result<(), AgentError> {
        let argv = [
            self.client_interface.clone(),
            self.address.clone(),
            "--import".to_string(),
        ];
        let future = BoolFuture::spawn(&argv, Stdio::Null, Stdio::Inherit, None)
            .map_err(AgentError::RemoteImport)?;
        future
            .wait_cancellable(cancel)
            .await
            .map_err(AgentError::RemoteImport)
    }
}
