// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Pure data model for distributed derivations.
//!
//! This crate provides the fundamental types for describing a deployment:
//! store paths, targets and the mapping between them. It is intentionally
//! IO-free beyond reading the input document itself — all types are plain
//! values with no network or process dependencies, so the scheduler crate
//! can be tested against them without spawning anything.

pub mod mapping;
pub mod store_path;
pub mod target;

pub use mapping::{DistributedDerivation, DistributedDerivationError, MappingEntry};
pub use store_path::{DerivationPath, StorePath};
pub use target::Target;
