// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OCS commands and the state each one targets.

use crate::device::DeviceState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle commands the OCS issues against a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OcsCommand {
    EnterControl,
    Start,
    Standby,
    Disable,
    Enable,
    ExitControl,
    Abort,
    Stop,
    SetValue,
    ResetFromFault,
}

impl OcsCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcsCommand::EnterControl => "ENTER_CONTROL",
            OcsCommand::Start => "START",
            OcsCommand::Standby => "STANDBY",
            OcsCommand::Disable => "DISABLE",
            OcsCommand::Enable => "ENABLE",
            OcsCommand::ExitControl => "EXIT_CONTROL",
            OcsCommand::Abort => "ABORT",
            OcsCommand::Stop => "STOP",
            OcsCommand::SetValue => "SET_VALUE",
            OcsCommand::ResetFromFault => "RESET_FROM_FAULT",
        }
    }

    pub fn parse(s: &str) -> Option<OcsCommand> {
        match s {
            "ENTER_CONTROL" => Some(OcsCommand::EnterControl),
            "START" => Some(OcsCommand::Start),
            "STANDBY" => Some(OcsCommand::Standby),
            "DISABLE" => Some(OcsCommand::Disable),
            "ENABLE" => Some(OcsCommand::Enable),
            "EXIT_CONTROL" => Some(OcsCommand::ExitControl),
            "ABORT" => Some(OcsCommand::Abort),
            "STOP" => Some(OcsCommand::Stop),
            "SET_VALUE" => Some(OcsCommand::SetValue),
            "RESET_FROM_FAULT" => Some(OcsCommand::ResetFromFault),
            _ => None,
        }
    }

    /// The summary state this command drives the device toward.
    ///
    /// `SET_VALUE` and `RESET_FROM_FAULT` are not matrix transitions: the
    /// former requires `ENABLE` and leaves the state alone, the latter is the
    /// sole escape from `FAULT` and returns the device to `OFFLINE`.
    pub fn target_state(&self) -> Option<DeviceState> {
        match self {
            OcsCommand::EnterControl => Some(DeviceState::Standby),
            OcsCommand::Start => Some(DeviceState::Disable),
            OcsCommand::Standby => Some(DeviceState::Standby),
            OcsCommand::Disable => Some(DeviceState::Disable),
            OcsCommand::Enable => Some(DeviceState::Enable),
            OcsCommand::ExitControl => Some(DeviceState::Offline),
            OcsCommand::Abort => Some(DeviceState::Disable),
            OcsCommand::Stop => Some(DeviceState::Disable),
            OcsCommand::SetValue | OcsCommand::ResetFromFault => None,
        }
    }
}

impl fmt::Display for OcsCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
