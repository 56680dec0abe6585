// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! `disnix-coordinator`: the driver entry point.
//!
//! Parses arguments, resolves configuration, runs the transfer scheduler
//! to quiescence, and — on success — records the coordinator profile.
//! Exit codes: `0` success, `1` usage error, `2` deployment failure
//! (one or more jobs failed), `3` structural/input error.

mod args;
mod config;
mod error;

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{error, info, warn};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use disnix_core::mapping::DistributedDerivation;
use disnix_profile::ProfileWriter;
use disnix_scheduler::{Scheduler, SchedulerOutcome, SchedulerReport};
use disnix_store::StoreClient;

use args::{ParsedArgs, USAGE};
use config::{Config, ENV_CONFIG_PATH};
use error::CliError;

const EXIT_OK: i32 = 0;
const EXIT_DEPLOYMENT_FAILURE: i32 = 2;

#[tokio::main]
async fn main() {
    env_logger::init();
    let argv: Vec<String> = std::env::args().skip(1).collect();
    std::process::exit(run(argv).await);
}

async fn run(argv: Vec<String>) -> i32 {
    let parsed = match args::parse(&argv) {
        Ok(parsed) => parsed,
        Err(e) => return report_error(CliError::Usage(e)),
    };

    let args = match parsed {
        ParsedArgs::Help => {
            print!("{USAGE}");
            return EXIT_OK;
        }
        ParsedArgs::Run(args) => args,
    };

    match run_deployment(args).await {
        Ok(code) => code,
        Err(e) => report_error(e),
    }
}

fn report_error(e: CliError) -> i32 {
    error!("{e}");
    if matches!(&e, CliError::Usage(_)) {
        eprint!("{USAGE}");
    }
    e.exit_code()
}

async fn run_deployment(args: args::Args) -> Result<i32, CliError> {
    let config_path = args
        .config_path
        .clone()
        .or_else(|| std::env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from));
    let mut config = match config_path {
        Some(path) => Config::from_file(&path)?,
        None => Config::default(),
    };

    if let Some(max) = args.max_concurrent_transfers {
        config.max_concurrent_transfers = max;
    }
    let profile_name = args.profile.clone().unwrap_or(config.profile_name.clone());

    let doc = DistributedDerivation::from_file(&args.file)?;
    info!(
        "loaded distributed derivation with {} mapping entries",
        doc.mappings.len()
    );

    let store = StoreClient::new(config.store_commands());
    let scheduler = Scheduler::new(
        store.clone(),
        std::env::temp_dir(),
        config.max_concurrent_transfers,
    );

    let cancel = CancellationToken::new();
    let report = match config.timeout_secs {
        Some(secs) => {
            match tokio::time::timeout(
                Duration::from_secs(secs),
                run_to_quiescence(&scheduler, &doc, cancel.clone()),
            )
            .await
            {
                Ok(report) => report,
                Err(_) => {
                    cancel.cancel();
                    error!("deployment exceeded configured timeout of {secs}s");
                    return Ok(EXIT_DEPLOYMENT_FAILURE);
                }
            }
        }
        None => run_to_quiescence(&scheduler, &doc, cancel.clone()).await,
    };

    for job in report.failed_jobs() {
        warn!(
            "job failed: derivation {} -> target {} at step {}",
            job.derivation, job.target_name, job_step(job)
        );
    }

    if args.metrics {
        println!("{}", scheduler.metrics().render());
    }

    let code = match report.outcome {
        SchedulerOutcome::Success => {
            record_profile(
                store,
                &config,
                &profile_name,
                &args.file,
                args.coordinator_profile_path.clone(),
            )
            .await;
            info!("deployment succeeded: {} jobs ok", report.jobs.len());
            EXIT_OK
        }
        SchedulerOutcome::Failure => {
            error!(
                "deployment failed: {} of {} jobs did not complete",
                report.failed_jobs().count(),
                report.jobs.len()
            );
            EXIT_DEPLOYMENT_FAILURE
        }
    };
    Ok(code)
}

/// Run the scheduler to completion, racing it against a shutdown signal so
/// Ctrl-C/SIGTERM drive the scheduler's own cancellation token rather than
/// killing the process outright.
async fn run_to_quiescence(
    scheduler: &Scheduler,
    doc: &DistributedDerivation,
    cancel: CancellationToken,
) -> SchedulerReport {
    let scheduler_fut = scheduler.run(doc, cancel.clone());
    tokio::pin!(scheduler_fut);

    tokio::select! {
        report = &mut scheduler_fut => report,
        _ = shutdown_signal() => {
            warn!("received shutdown signal; cancelling in-flight jobs");
            cancel.cancel();
            scheduler_fut.await
        }
    }
}

/// A successful deployment's on-the-wire effects are already committed, so
/// a profile-write failure is logged as a warning rather than changing the
/// process exit code.
async fn record_profile(
    store: StoreClient,
    config: &Config,
    profile_name: &str,
    deployment_file: &Path,
    override_dir: Option<PathBuf>,
) {
    let writer = match ProfileWriter::new(store, &config.state_dir, override_dir) {
        Ok(writer) => writer,
        Err(e) => {
            warn!("failed to prepare coordinator profile writer: {e}");
            return;
        }
    };

    let manifest_path = std::fs::canonicalize(deployment_file)
        .unwrap_or_else(|_| deployment_file.to_path_buf())
        .to_string_lossy()
        .into_owned();

    if let Err(e) = writer.record(profile_name, &manifest_path).await {
        warn!("failed to record coordinator profile: {e}");
    }
}

fn job_step(job: &disnix_scheduler::JobOutcome) -> String {
    match &job.state {
        disnix_scheduler::JobState::DoneFailed { step } => step.to_string(),
        _ => "unknown".to_string(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
