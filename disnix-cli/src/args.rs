// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Command-line argument parsing.
//!
//! One positional argument (the distributed-derivation file) plus a small
//! set of long/short options. No argument-parsing crate is pulled in for
//! this — the surface is small enough that a hand-rolled loop stays more
//! legible than a derive macro's generated help text.

use std::path::PathBuf;

pub const USAGE: &str = "\
Usage: disnix-coordinator [OPTIONS] <DISTRIBUTED-DERIVATION-FILE>

Realises and deploys a distributed derivation: builds the derivations each
target needs locally, then transfers and imports the resulting closures.

Options:
  -m, --max-concurrent-transfers <N>   Cap on concurrent transfers (default 2)
      --config <PATH>                 Optional TOML configuration file
      --profile <NAME>                 Coordinator profile name (default \"default\")
      --coordinator-profile-path <PATH>  Override the profile base directory
      --metrics                        Print a Prometheus text snapshot after the run
  -h, --help                           Print this help and exit
";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("missing required argument: distributed derivation file")]
    MissingFile,
    #[error("unrecognised option: {0}")]
    UnknownOption(String),
    #[error("option {0} requires a value")]
    MissingValue(String),
    #[error("invalid value {value:?} for {option}: {reason}")]
    InvalidValue {
        option: String,
        value: String,
        reason: String,
    },
    #[error("unexpected extra argument: {0}")]
    UnexpectedArgument(String),
}

#[derive(Debug, Clone)]
pub struct Args {
    pub file: PathBuf,
    pub max_concurrent_transfers: Option<usize>,
    pub config_path: Option<PathBuf>,
    pub profile: Option<String>,
    pub coordinator_profile_path: Option<PathBuf>,
    pub metrics: bool,
}

/// The outcome of parsing: either a request to print help and exit
/// cleanly, or a fully parsed set of arguments to run with.
pub enum ParsedArgs {
    Help,
    Run(Args),
}

pub fn parse(argv: &[String]) -> Result<ParsedArgs, UsageError> {
    let mut file: Option<PathBuf> = None;
    let mut max_concurrent_transfers: Option<usize> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut profile: Option<String> = None;
    let mut coordinator_profile_path: Option<PathBuf> = None;
    let mut metrics = false;

    let mut iter = argv.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(ParsedArgs::Help),
            "-m" | "--max-concurrent-transfers" => {
                let value = iter
                    .next()
                    .ok_or_else(|| UsageError::MissingValue(arg.clone()))?;
                let parsed: i64 = value.parse().map_err(|_| UsageError::InvalidValue {
                    option: arg.clone(),
                    value: value.clone(),
                    reason: "not an integer".to_string(),
                })?;
                if parsed <= 0 {
                    return Err(UsageError::InvalidValue {
                        option: arg.clone(),
                        value: value.clone(),
                        reason: "must be greater than zero".to_string(),
                    });
                }
                max_concurrent_transfers = Some(parsed as usize);
            }
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| UsageError::MissingValue(arg.clone()))?;
                config_path = Some(PathBuf::from(value));
            }
            "--profile" => {
                let value = iter
                    .next()
                    .ok_or_else(|| UsageError::MissingValue(arg.clone()))?;
                profile = Some(value.clone());
            }
            "--coordinator-profile-path" => {
                let value = iter
                    .next()
                    .ok_or_else(|| UsageError::MissingValue(arg.clone()))?;
                coordinator_profile_path = Some(PathBuf::from(value));
            }
            "--metrics" => metrics = true,
            other if other.starts_with('-') => {
                return Err(UsageError::UnknownOption(other.to_string()));
            }
            positional => {
                if file.is_some() {
                    return Err(UsageError::UnexpectedArgument(positional.to_string()));
                }
                file = Some(PathBuf::from(positional));
            }
        }
    }

    let file = file.ok_or(UsageError::MissingFile)?;

    Ok(ParsedArgs::Run(Args {
        file,
        max_concurrent_transfers,
        config_path,
        profile,
        coordinator_profile_path,
        metrics,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_minimal_invocation() {
        let parsed = parse(&argv(&["deploy.json"])).unwrap();
        match parsed {
            ParsedArgs::Run(args) => {
                assert_eq!(args.file, PathBuf::from("deploy.json"));
                assert_eq!(args.max_concurrent_transfers, None);
                assert!(!args.metrics);
            }
            ParsedArgs::Help => panic!("expected Run"),
        }
    }

    #[test]
    fn parses_all_options() {
        let parsed = parse(&argv(&[
            "-m",
            "4",
            "--config",
            "cfg.toml",
            "--profile",
            "staging",
            "--coordinator-profile-path",
            "/tmp/profiles",
            "--metrics",
            "deploy.json",
        ]))
        .unwrap();
        match parsed {
            ParsedArgs::Run(args) => {
                assert_eq!(args.max_concurrent_transfers, Some(4));
                assert_eq!(args.config_path, Some(PathBuf::from("cfg.toml")));
                assert_eq!(args.profile, Some("staging".to_string()));
                assert_eq!(
                    args.coordinator_profile_path,
                    Some(PathBuf::from("/tmp/profiles"))
                );
                assert!(args.metrics);
                assert_eq!(args.file, PathBuf::from("deploy.json"));
            }
            ParsedArgs::Help => panic!("expected Run"),
        }
    }

    #[test]
    fn help_flag_short_circuits() {
        assert!(matches!(
            parse(&argv(&["--help"])).unwrap(),
            ParsedArgs::Help
        ));
        assert!(matches!(parse(&argv(&["-h"])).unwrap(), ParsedArgs::Help));
    }

    #[test]
    fn missing_file_is_a_usage_error() {
        assert_eq!(parse(&argv(&[])).unwrap_err(), UsageError::MissingFile);
    }

    #[rstest::rstest]
    #[case::zero("0")]
    #[case::negative("-1")]
    #[case::not_a_number("abc")]
    #[case::float("1.5")]
    fn max_concurrent_transfers_rejects_invalid_values(#[case] value: &str) {
        assert!(matches!(
            parse(&argv(&["-m", value, "deploy.json"])),
            Err(UsageError::InvalidValue { .. })
        ));
    }

    #[test]
    fn unknown_option_is_rejected() {
        assert!(matches!(
            parse(&argv(&["--bogus", "deploy.json"])),
            Err(UsageError::UnknownOption(_))
        ));
    }

    #[test]
    fn second_positional_argument_is_rejected() {
        assert!(matches!(
            parse(&argv(&["deploy.json", "extra.json"])),
            Err(UsageError::UnexpectedArgument(_))
        ));
    }
}
