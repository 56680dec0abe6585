// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use thiserror::Error;

use crate::args::UsageError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error("failed to read config file {path:?}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file: {0}")]
    MalformedConfig(#[from] toml::de::Error),

    #[error(transparent)]
    Structural(#[from] disnix_core::mapping::DistributedDerivationError),
}

impl CliError {
    /// Usage and config errors are both "bad input before any effectful
    /// work"; structural errors (an unreadable/malformed deployment file)
    /// get their own exit code per the driver's documented contract.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) | CliError::ReadConfig { .. } | CliError::MalformedConfig(_) => 1,
            CliError::Structural(_) => 3,
        }
    }
}
