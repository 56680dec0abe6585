// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

use disnix_core::target::TargetError;
use disnix_process::ProcessError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("cannot reach target: {0}")]
    UnresolvedAddress(#[from] TargetError),

    #[error("copy-to failed: {0}")]
    CopyTo(#[source] ProcessError),

    #[error("remote import failed: {0}")]
    RemoteImport(#[source] ProcessError),

    #[error("failed to open bundle for transfer: {0}")]
    OpenBundle(#[source] std::io::Error),
}
