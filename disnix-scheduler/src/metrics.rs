// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Scheduler metrics, exposed as a `prometheus::Registry` the driver may
//! render to text on request. Never served over HTTP by this crate.

use prometheus::{GaugeVec, IntCounterVec, Opts, Registry};

#[derive(Clone)]
pub struct SchedulerMetrics {
    pub jobs_by_state: GaugeVec,
    pub completed_by_outcome: IntCounterVec,
    pub transfer_permits_in_use: GaugeVec,
    registry: Registry,
}

impl SchedulerMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let jobs_by_state = GaugeVec::new(
            Opts::new("disnix_jobs_by_state", "Number of jobs currently in each state"),
            &["state"],
        )
        .expect("static metric definition");
        let completed_by_outcome = IntCounterVec::new(
            Opts::new(
                "disnix_completed_jobs_total",
                "Completed jobs by terminal outcome",
            ),
            &["outcome"],
        )
        .expect("static metric definition");
        let transfer_permits_in_use = GaugeVec::new(
            Opts::new(
                "disnix_transfer_permits_in_use",
                "Transfer permits currently held",
            ),
            &["pool"],
        )
        .expect("static metric definition");

        registry
            .register(Box::new(jobs_by_state.clone()))
            .expect("metric registration");
        registry
            .register(Box::new(completed_by_outcome.clone()))
            .expect("metric registration");
        registry
            .register(Box::new(transfer_permits_in_use.clone()))
            .expect("metric registration");

        Self {
            jobs_by_state,
            completed_by_outcome,
            transfer_permits_in_use,
            registry,
        }
    }

    pub fn set_state(&self, state_name: &str, delta: f64) {
        self.jobs_by_state.with_label_values(&[state_name]).add(delta);
    }

    pub fn record_outcome(&self, outcome_name: &str) {
        self.completed_by_outcome
            .with_label_values(&[outcome_name])
            .inc();
    }

    pub fn permit_acquired(&self) {
        self.transfer_permits_in_use
            .with_label_values(&["transfer"])
            .inc();
    }

    pub fn permit_released(&self) {
        self.transfer_permits_in_use
            .with_label_values(&["transfer"])
            .dec();
    }

    /// Render the current snapshot in Prometheus text exposition format.
    pub fn render(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buf = Vec::new();
        let _ = encoder.encode(&self.registry.gather(), &mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl Default for SchedulerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
