// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Transfer scheduler: drives each mapping entry through
//! {realise → export → copy-to → remote-import}, bounding concurrent
//! transfers with a semaphore held across steps 2–4 only.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use disnix_agent::RemoteAgent;
use disnix_core::mapping::{DistributedDerivation, MappingEntry};
use disnix_process::ConcurrencyGate;
use disnix_store::StoreClient;

use crate::job::{JobOutcome, Step};
use crate::metrics::SchedulerMetrics;

/// The scheduler's aggregated verdict over a whole deployment run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerOutcome {
    Success,
    Failure,
}

/// Final report: every job's outcome, in input order, plus the aggregate
/// verdict.
#[derive(Debug, Clone)]
pub struct SchedulerReport {
    pub outcome: SchedulerOutcome,
    pub jobs: Vec<JobOutcome>,
}

impl SchedulerReport {
    pub fn failed_jobs(&self) -> impl Iterator<Item = &JobOutcome> {
        self.jobs.iter().filter(|j| {
            matches!(j.state, crate::job::JobState::DoneFailed { .. })
        })
    }
}

pub struct Scheduler {
    store: StoreClient,
    tmp_dir: PathBuf,
    transfer_gate: ConcurrencyGate,
    metrics: SchedulerMetrics,
}

impl Scheduler {
    pub fn new(store: StoreClient, tmp_dir: PathBuf, max_concurrent_transfers: usize) -> Self {
        Self {
            store,
            tmp_dir,
            transfer_gate: ConcurrencyGate::new(max_concurrent_transfers),
            metrics: SchedulerMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &SchedulerMetrics {
        &self.metrics
    }

    /// Run every mapping entry to quiescence, honouring `cancel`. A job
    /// blocked on a child process or on the transfer gate at the moment
    /// `cancel` fires is unblocked immediately: any live child is sent
    /// `SIGTERM` and reaped, and a job still waiting for a transfer permit
    /// is failed without ever starting one. No job reaches a later step
    /// once cancellation has been observed.
    pub async fn run(
        &self,
        doc: &DistributedDerivation,
        cancel: CancellationToken,
    ) -> SchedulerReport {
        let results: Arc<Mutex<BTreeMap<usize, JobOutcome>>> = Arc::new(Mutex::new(BTreeMap::new()));
        let mut handles = Vec::with_capacity(doc.mappings.len());

        for (index, entry) in doc.mappings.iter().cloned().enumerate() {
            let store = self.store.clone();
            let tmp_dir = self.tmp_dir.clone();
            let gate = self.transfer_gate.clone();
            let metrics = self.metrics.clone();
            let results = results.clone();
            let cancel = cancel.clone();

            handles.push(tokio::spawn(async move {
                let outcome = run_job(index, entry, &store, &tmp_dir, &gate, &metrics, &cancel).await;
                results.lock().await.insert(index, outcome);
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }

        let jobs: Vec<JobOutcome> = results.lock().await.values().cloned().collect();

        let outcome = if jobs.iter().all(|j| matches!(j.state, crate::job::JobState::DoneOk)) {
            SchedulerOutcome::Success
        } else {
            SchedulerOutcome::Failure
        };

        for job in &jobs {
            let outcome_label = match &job.state {
                crate::job::JobState::DoneOk => "ok",
                crate::job::JobState::DoneFailed { .. } => "failed",
                _ => "incomplete",
            };
            self.metrics.record_outcome(outcome_label);
        }

        info!(
            "deployment finished: {:?}, {}/{} jobs ok",
            outcome,
            jobs.iter().filter(|j| matches!(j.state, crate::job::JobState::DoneOk)).count(),
            jobs.len()
        );

        SchedulerReport { outcome, jobs }
    }
}

async fn run_job(
    index: usize,
    entry: MappingEntry,
    store: &StoreClient,
    tmp_dir: &std::path::Path,
    gate: &ConcurrencyGate,
    metrics: &SchedulerMetrics,
    cancel: &CancellationToken,
) -> JobOutcome {
    let MappingEntry { derivation, target } = entry;
    let target_name = target.name.clone();

    if cancel.is_cancelled() {
        return JobOutcome::failed(index, derivation, target_name, Step::Cancelled);
    }

    debug!("job {index} ({derivation} -> {target_name}): realising");
    metrics.set_state("realising", 1.0);
    let outputs = match store.realise(&[derivation.clone()], cancel).await {
        Ok(outputs) => outputs,
        Err(e) => {
            metrics.set_state("realising", -1.0);
            if cancel.is_cancelled() {
                warn!("job {index} ({derivation} -> {target_name}): realise cancelled");
                return JobOutcome::failed(index, derivation, target_name, Step::Cancelled);
            }
            warn!("job {index} ({derivation} -> {target_name}): realise failed: {e}");
            return JobOutcome::failed(index, derivation, target_name, Step::Realising);
        }
    };
    metrics.set_state("realising", -1.0);

    if cancel.is_cancelled() {
        return JobOutcome::failed(index, derivation, target_name, Step::Cancelled);
    }

    debug!("job {index} ({derivation} -> {target_name}): acquiring transfer permit");
    let permit = match gate.acquire_cancellable(cancel).await {
        Some(Ok(permit)) => permit,
        Some(Err(e)) => {
            warn!("job {index} ({derivation} -> {target_name}): transfer gate closed: {e}");
            return JobOutcome::failed(index, derivation, target_name, Step::Exporting);
        }
        None => {
            warn!(
                "job {index} ({derivation} -> {target_name}): cancelled while waiting for a transfer permit"
            );
            return JobOutcome::failed(index, derivation, target_name, Step::Cancelled);
        }
    };
    metrics.permit_acquired();

    debug!("job {index} ({derivation} -> {target_name}): exporting");
    metrics.set_state("exporting", 1.0);
    let bundle = match store.export_closure(&outputs, tmp_dir, cancel).await {
        Ok(bundle) => bundle,
        Err(e) => {
            metrics.set_state("exporting", -1.0);
            drop(permit);
            metrics.permit_released();
            if cancel.is_cancelled() {
                warn!("job {index} ({derivation} -> {target_name}): export cancelled");
                return JobOutcome::failed(index, derivation, target_name, Step::Cancelled);
            }
            warn!("job {index} ({derivation} -> {target_name}): export failed: {e}");
            return JobOutcome::failed(index, derivation, target_name, Step::Exporting);
        }
    };
    metrics.set_state("exporting", -1.0);

    let agent = match RemoteAgent::for_target(&target) {
        Ok(agent) => agent,
        Err(e) => {
            warn!("job {index} ({derivation} -> {target_name}): cannot reach target: {e}");
            drop(bundle);
            drop(permit);
            metrics.permit_released();
            return JobOutcome::failed(index, derivation, target_name, Step::Transferring);
        }
    };

    debug!("job {index} ({derivation} -> {target_name}): transferring");
    metrics.set_state("transferring", 1.0);
    if let Err(e) = agent.copy_to(&bundle, cancel).await {
        metrics.set_state("transferring", -1.0);
        drop(bundle);
        drop(permit);
        metrics.permit_released();
        if cancel.is_cancelled() {
            warn!("job {index} ({derivation} -> {target_name}): transfer cancelled");
            return JobOutcome::failed(index, derivation, target_name, Step::Cancelled);
        }
        warn!("job {index} ({derivation} -> {target_name}): copy-to failed: {e}");
        return JobOutcome::failed(index, derivation, target_name, Step::Transferring);
    }
    metrics.set_state("transferring", -1.0);

    debug!("job {index} ({derivation} -> {target_name}): importing");
    metrics.set_state("importing", 1.0);
    if let Err(e) = agent.remote_import(cancel).await {
        metrics.set_state("importing", -1.0);
        drop(bundle);
        drop(permit);
        metrics.permit_released();
        if cancel.is_cancelled() {
            warn!("job {index} ({derivation} -> {target_name}): import cancelled");
            return JobOutcome::failed(index, derivation, target_name, Step::Cancelled);
        }
        warn!("job {index} ({derivation} -> {target_name}): remote import failed: {e}");
        return JobOutcome::failed(index, derivation, target_name, Step::Importing);
    }
    metrics.set_state("importing", -1.0);

    drop(bundle);
    drop(permit);
    metrics.permit_released();
    debug!("job {index} ({derivation} -> {target_name}): done");
    JobOutcome::done_ok(index, derivation, target_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use disnix_core::mapping::MappingEntry;
    use disnix_core::store_path::{DerivationPath, StorePath};
    use disnix_core::target::Target;
    use disnix_store::{StoreClient, StoreCommands};
    use disnix_test_utils::FakeScript;
    use std::collections::BTreeMap as Map;
    use std::str::FromStr;

    fn target_with(client: &FakeScript, hostname: &str, name: &str) -> Target {
        Target {
            name: name.to_string(),
            target_property: "hostname".to_string(),
            client_interface: client.as_str().to_string(),
            properties: Map::from([("hostname".to_string(), hostname.to_string())]),
        }
    }

    fn entry(drv: &str, target: Target) -> MappingEntry {
        MappingEntry {
            derivation: DerivationPath::from_str(drv).unwrap(),
            target,
        }
    }

    fn happy_store(store_fake: &FakeScript) -> StoreClient {
        StoreClient::new(StoreCommands {
            store_cmd: store_fake.as_str().to_string(),
            env_cmd: store_fake.as_str().to_string(),
            collect_garbage_cmd: store_fake.as_str().to_string(),
        })
    }

    #[tokio::test]
    async fn single_entry_happy_path_reaches_done_ok() {
        let store_fake =
            FakeScript::new("nix-store", "case \"$1\" in --realise) echo /nix/store/aaaa-out ;; --export) echo payload ;; *) : ;; esac").unwrap();
        let client_fake = FakeScript::new("client", "cat > /dev/null 2>&1 || true").unwrap();

        let doc = DistributedDerivation {
            mappings: vec![entry(
                "/nix/store/bbbb-foo.drv",
                target_with(&client_fake, "10.0.0.1", "t1"),
            )],
        };

        let tmp = tempfile::tempdir().unwrap();
        let scheduler = Scheduler::new(happy_store(&store_fake), tmp.path().to_path_buf(), 2);
        let report = scheduler.run(&doc, CancellationToken::new()).await;

        assert_eq!(report.outcome, SchedulerOutcome::Success);
        assert_eq!(report.jobs.len(), 1);
        assert!(matches!(report.jobs[0].state, crate::job::JobState::DoneOk));
    }

    #[tokio::test]
    async fn partial_failure_reports_aggregate_failure_without_stopping_other_jobs() {
        let store_fake =
            FakeScript::new("nix-store", "case \"$1\" in --realise) echo /nix/store/aaaa-out ;; --export) echo payload ;; *) : ;; esac").unwrap();
        let good_client = FakeScript::new("client-good", "cat > /dev/null 2>&1 || true").unwrap();
        let bad_client = FakeScript::new("client-bad", "exit 1").unwrap();

        let doc = DistributedDerivation {
            mappings: vec![
                entry(
                    "/nix/store/bbbb-foo.drv",
                    target_with(&good_client, "10.0.0.1", "t1"),
                ),
                entry(
                    "/nix/store/cccc-bar.drv",
                    target_with(&bad_client, "10.0.0.2", "t2"),
                ),
            ],
        };

        let tmp = tempfile::tempdir().unwrap();
        let scheduler = Scheduler::new(happy_store(&store_fake), tmp.path().to_path_buf(), 2);
        let report = scheduler.run(&doc, CancellationToken::new()).await;

        assert_eq!(report.outcome, SchedulerOutcome::Failure);
        let t1 = report.jobs.iter().find(|j| j.target_name == "t1").unwrap();
        let t2 = report.jobs.iter().find(|j| j.target_name == "t2").unwrap();
        assert!(matches!(t1.state, crate::job::JobState::DoneOk));
        assert!(matches!(
            t2.state,
            crate::job::JobState::DoneFailed {
                step: Step::Transferring
            }
        ));
    }

    #[tokio::test]
    async fn empty_mapping_list_is_vacuously_successful() {
        let store_fake = FakeScript::new("nix-store", ":").unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let scheduler = Scheduler::new(happy_store(&store_fake), tmp.path().to_path_buf(), 2);
        let report = scheduler
            .run(&DistributedDerivation { mappings: vec![] }, CancellationToken::new())
            .await;
        assert_eq!(report.outcome, SchedulerOutcome::Success);
        assert!(report.jobs.is_empty());
    }

    #[tokio::test]
    async fn cancellation_terminates_in_flight_transfer_and_reports_cancelled_step() {
        let store_fake =
            FakeScript::new("nix-store", "case \"$1\" in --realise) echo /nix/store/aaaa-out ;; --export) echo payload ;; *) : ;; esac").unwrap();
        let slow_client = FakeScript::new("client", "sleep 30").unwrap();

        let doc = DistributedDerivation {
            mappings: vec![entry(
                "/nix/store/bbbb-foo.drv",
                target_with(&slow_client, "10.0.0.1", "t1"),
            )],
        };

        let tmp = tempfile::tempdir().unwrap();
        let scheduler = Scheduler::new(happy_store(&store_fake), tmp.path().to_path_buf(), 2);
        let cancel = CancellationToken::new();

        let cancel_task = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            cancel_task.cancel();
        });

        let report = scheduler.run(&doc, cancel).await;

        assert_eq!(report.outcome, SchedulerOutcome::Failure);
        assert!(matches!(
            report.jobs[0].state,
            crate::job::JobState::DoneFailed {
                step: Step::Cancelled
            }
        ));
    }

    #[tokio::test]
    async fn cancellation_before_any_work_starts_fails_without_spawning() {
        let store_fake = FakeScript::new("nix-store", "exit 7").unwrap();
        let client_fake = FakeScript::new("client", "exit 7").unwrap();

        let doc = DistributedDerivation {
            mappings: vec![entry(
                "/nix/store/bbbb-foo.drv",
                target_with(&client_fake, "10.0.0.1", "t1"),
            )],
        };

        let tmp = tempfile::tempdir().unwrap();
        let scheduler = Scheduler::new(happy_store(&store_fake), tmp.path().to_path_buf(), 2);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = scheduler.run(&doc, cancel).await;

        assert_eq!(report.outcome, SchedulerOutcome::Failure);
        assert!(matches!(
            report.jobs[0].state,
            crate::job::JobState::DoneFailed {
                step: Step::Cancelled
            }
        ));
    }

    #[tokio::test]
    async fn results_are_sorted_by_input_order_not_completion_order() {
        // The fast target (t1) would naturally finish before the slow one
        // (t2) if they raced; the scheduler must still report them by
        // their original index.
        let store_fake =
            FakeScript::new("nix-store", "case \"$1\" in --realise) echo /nix/store/aaaa-out ;; --export) echo payload ;; *) : ;; esac").unwrap();
        let slow_client = FakeScript::new("client-slow", "sleep 0.05; cat > /dev/null 2>&1 || true").unwrap();
        let fast_client = FakeScript::new("client-fast", "cat > /dev/null 2>&1 || true").unwrap();

        let doc = DistributedDerivation {
            mappings: vec![
                entry(
                    "/nix/store/bbbb-slow.drv",
                    target_with(&slow_client, "10.0.0.1", "slow"),
                ),
                entry(
                    "/nix/store/cccc-fast.drv",
                    target_with(&fast_client, "10.0.0.2", "fast"),
                ),
            ],
        };

        let tmp = tempfile::tempdir().unwrap();
        let scheduler = Scheduler::new(happy_store(&store_fake), tmp.path().to_path_buf(), 2);
        let report = scheduler.run(&doc, CancellationToken::new()).await;

        assert_eq!(report.jobs[0].target_name, "slow");
        assert_eq!(report.jobs[1].target_name, "fast");
    }
}
