// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! The global concurrency gate: a FIFO admission semaphore.
//!
//! Admits a new child only if the count of currently-held permits is below
//! the configured cap; otherwise a caller waiting on [`ConcurrencyGate::acquire`]
//! blocks until another permit is released. `tokio::sync::Semaphore`'s wait
//! queue is itself FIFO, so no separate queueing discipline is needed.

use std::sync::Arc;

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// Process-wide admission gate bounding concurrent external invocations.
#[derive(Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
}

/// A held admission permit. Dropping it releases the slot back to the gate.
pub type GatePermit = OwnedSemaphorePermit;

impl ConcurrencyGate {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
        }
    }

    /// Wait for a free slot, then hold it until the returned permit is
    /// dropped.
    pub async fn acquire(&self) -> Result<GatePermit, AcquireError> {
        self.semaphore.clone().acquire_owned().await
    }

    /// Like [`ConcurrencyGate::acquire`], but racing the wait against
    /// `cancel`. Returns `None` if `cancel` fires before a slot frees up, so
    /// a caller blocked here at the moment of cancellation never goes on to
    /// start new work.
    pub async fn acquire_cancellable(
        &self,
        cancel: &CancellationToken,
    ) -> Option<Result<GatePermit, AcquireError>> {
        tokio::select! {
            permit = self.acquire() => Some(permit),
            _ = cancel.cancelled() => None,
        }
    }

    /// How many slots are currently free. For diagnostics only — do not use
    /// for admission decisions, as it is inherently racy.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}
