// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Job state machine types.

use disnix_core::store_path::DerivationPath;

/// Which step of the pipeline a job failed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Realising,
    Exporting,
    Transferring,
    Importing,
    /// Cancellation arrived before the job reached a terminal state; the
    /// step it was cancelled at is not otherwise distinguished.
    Cancelled,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Step::Realising => "realising",
            Step::Exporting => "exporting",
            Step::Transferring => "transferring",
            Step::Importing => "importing",
            Step::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// The job's current state, advancing strictly through each variant in
/// order until it reaches one of the two terminal states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Realising,
    Exporting,
    Transferring,
    Importing,
    DoneOk,
    DoneFailed { step: Step },
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::DoneOk | JobState::DoneFailed { .. })
    }
}

/// The final state of one mapping entry, tagged with its original position
/// so the scheduler can report results in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub index: usize,
    pub derivation: DerivationPath,
    pub target_name: String,
    pub state: JobState,
}

impl JobOutcome {
    pub fn done_ok(index: usize, derivation: DerivationPath, target_name: String) -> Self {
        Self {
            index,
            derivation,
            target_name,
            state: JobState::DoneOk,
        }
    }

    pub fn failed(
        index: usize,
        derivation: DerivationPath,
        target_name: String,
        step: Step,
    ) -> Self {
        Self {
            index,
            derivation,
            target_name,
            state: JobState::DoneFailed { step },
        }
    }
}
