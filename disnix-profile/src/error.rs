// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

use disnix_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("failed to determine the current user")]
    UnknownUser,

    #[error("failed to create profile directory {path:?}: {source}")]
    CreateDir {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to set coordinator profile: {0}")]
    SetProfile(#[from] StoreError),
}
