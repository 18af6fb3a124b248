// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fault records.

use crate::device::Device;
use serde::{Deserialize, Serialize};

/// Severity/type tag carried in a fault report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultType {
    /// Forces the device into the FAULT state.
    Fault,
    /// Logged and forwarded without a state change.
    Warning,
}

/// One fault report, as carried on the bus and appended to a device's
/// fault history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct FaultRecord {
    pub component: String,
    pub device: Device,
    pub fault_type: FaultType,
    pub error_code: u32,
    pub description: String,
}
