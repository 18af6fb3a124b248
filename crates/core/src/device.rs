// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Commandable devices and their OCS summary states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The commandable image-handling devices the DMCS fronts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Device {
    /// Archiver foreman
    #[serde(rename = "AR")]
    Archiver,
    /// Prompt-process foreman
    #[serde(rename = "PP")]
    PromptProcess,
    /// Catchup archiver foreman
    #[serde(rename = "CU")]
    Catchup,
    /// Auxiliary telescope spectrograph foreman
    #[serde(rename = "AT")]
    AuxTel,
}

impl Device {
    pub const ALL: [Device; 4] = [
        Device::Archiver,
        Device::PromptProcess,
        Device::Catchup,
        Device::AuxTel,
    ];

    /// Two-letter wire code (`AR`, `PP`, `CU`, `AT`).
    pub fn code(&self) -> &'static str {
        match self {
            Device::Archiver => "AR",
            Device::PromptProcess => "PP",
            Device::Catchup => "CU",
            Device::AuxTel => "AT",
        }
    }

    pub fn parse(code: &str) -> Option<Device> {
        match code {
            "AR" => Some(Device::Archiver),
            "PP" => Some(Device::PromptProcess),
            "CU" => Some(Device::Catchup),
            "AT" => Some(Device::AuxTel),
            _ => None,
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// OCS-standard summary state of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceState {
    Offline,
    Standby,
    Disable,
    Enable,
    Fault,
}

impl DeviceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Offline => "OFFLINE",
            DeviceState::Standby => "STANDBY",
            DeviceState::Disable => "DISABLE",
            DeviceState::Enable => "ENABLE",
            DeviceState::Fault => "FAULT",
        }
    }

    pub fn parse(s: &str) -> Option<DeviceState> {
        match s {
            "OFFLINE" => Some(DeviceState::Offline),
            "STANDBY" => Some(DeviceState::Standby),
            "DISABLE" => Some(DeviceState::Disable),
            "ENABLE" => Some(DeviceState::Enable),
            "FAULT" => Some(DeviceState::Fault),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
