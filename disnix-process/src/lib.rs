// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Process supervision: spawn external commands, wait on typed futures, and
//! bound how many run concurrently.
//!
//! Two abstractions cover every external invocation the coordinator makes:
//! [`supervisor::BoolFuture`] for commands whose outcome is pass/fail, and
//! [`supervisor::StrvFuture`] for commands whose stdout is a newline (or
//! other delimiter) separated list the caller wants back as strings.
//! [`gate::ConcurrencyGate`] is the FIFO admission semaphore callers place in
//! front of whichever future-creation calls they want bounded.

pub mod gate;
pub mod supervisor;

pub use gate::{ConcurrencyGate, GatePermit};
pub use supervisor::{BoolFuture, ProcessError, Stdio, StrvFuture};
