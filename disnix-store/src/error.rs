// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

use disnix_process::ProcessError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to allocate closure bundle: {0}")]
    BundleAllocation(#[source] std::io::Error),

    #[error("failed to realise derivation(s): {0}")]
    Realise(#[source] ProcessError),

    #[error("failed to export closure: {0}")]
    Export(#[source] ProcessError),

    #[error("failed to import closure: {0}")]
    Import(#[source] ProcessError),

    #[error("failed to query requisites: {0}")]
    QueryRequisites(#[source] ProcessError),

    #[error("failed to print invalid paths: {0}")]
    PrintInvalid(#[source] ProcessError),

    #[error("failed to collect garbage: {0}")]
    CollectGarbage(#[source] ProcessError),

    #[error("failed to set profile: {0}")]
    SetProfile(#[source] ProcessError),

    #[error("store returned a malformed path {0:?}: {1}")]
    MalformedPath(String, disnix_core::store_path::InvalidStorePath),

    #[error("failed to open bundle for import: {0}")]
    OpenBundle(#[source] std::io::Error),
}
