// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Target machine identity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A machine identity participating in a deployment.
///
/// Targets are immutable for the duration of one deployment run. The
/// `properties` map holds any free-form attributes the input document
/// carries that the coordinator itself does not interpret, plus the
/// attribute named by `target_property` (the network address).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// A stable, human-readable identity for the target, used in reporting.
    pub name: String,
    /// Which attribute of `properties` holds the network address.
    pub target_property: String,
    /// Name of the client-interface executable used to reach this target.
    pub client_interface: String,
    /// Free-form attributes, including the one named by `target_property`.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// A target document is missing the attribute its own `target_property`
/// names, or is otherwise unusable by the scheduler.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("target {name:?} has no value for its target-property {property:?}")]
    MissingAddress { name: String, property: String },
}

impl Target {
    /// The network address of this target, resolved through
    /// `target_property`.
    pub fn address(&self) -> Result<&str, TargetError> {
        self.properties
            .get(&self.target_property)
            .map(String::as_str)
            .ok_or_else(|| TargetError::MissingAddress {
                name: self.name.clone(),
                property: self.target_property.clone(),
            })
    }
}
