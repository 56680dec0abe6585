// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Driver configuration: store-command overrides, the default transfer cap,
//! the coordinator state directory, and the default profile name.
//!
//! Loadable from an optional TOML file; every field defaults so the file
//! may be partial or absent entirely. CLI flags take precedence over
//! whatever a config file sets, which in turn takes precedence over these
//! built-in defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CliError;

pub const ENV_CONFIG_PATH: &str = "DISNIX_COORDINATOR_CONFIG";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// `nix-store` command name, looked up via `PATH`.
    pub store_cmd: String,
    /// `nix-env` command name.
    pub env_cmd: String,
    /// `nix-collect-garbage` command name.
    pub collect_garbage_cmd: String,
    /// Default cap on concurrent transfers; overridden by `-m`.
    pub max_concurrent_transfers: usize,
    /// Root of the coordinator's persisted state
    /// (`<state_dir>/profiles/per-user/<user>/disnix-coordinator`).
    pub state_dir: PathBuf,
    /// Default profile name; overridden by `--profile`.
    pub profile_name: String,
    /// Optional overall wall-clock budget for one deployment run. Not set
    /// by default — individual child processes have no internal timeout,
    /// and neither does the run as a whole unless a caller opts in.
    pub timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_cmd: "nix-store".to_string(),
            env_cmd: "nix-env".to_string(),
            collect_garbage_cmd: "nix-collect-garbage".to_string(),
            max_concurrent_transfers: 2,
            state_dir: PathBuf::from("/nix/var/nix"),
            profile_name: "default".to_string(),
            timeout_secs: None,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, CliError> {
        let contents = std::fs::read_to_string(path).map_err(|source| CliError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn store_commands(&self) -> disnix_store::StoreCommands {
        disnix_store::StoreCommands {
            store_cmd: self.store_cmd.clone(),
            env_cmd: self.env_cmd.clone(),
            collect_garbage_cmd: self.collect_garbage_cmd.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_built_in_values() {
        let config = Config::default();
        assert_eq!(config.max_concurrent_transfers, 2);
        assert_eq!(config.profile_name, "default");
    }

    #[test]
    fn partial_toml_file_falls_back_to_defaults() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "max_concurrent_transfers = 5\n").unwrap();

        let config = Config::from_file(tmp.path()).unwrap();
        assert_eq!(config.max_concurrent_transfers, 5);
        assert_eq!(config.store_cmd, "nix-store");
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let err = Config::from_file(Path::new("/no/such/config.toml"));
        assert!(err.is_err());
    }
}
