// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    archiver = { Device::Archiver, "AR" },
    prompt = { Device::PromptProcess, "PP" },
    catchup = { Device::Catchup, "CU" },
    auxtel = { Device::AuxTel, "AT" },
)]
fn device_code_round_trip(device: Device, code: &str) {
    assert_eq!(device.code(), code);
    assert_eq!(Device::parse(code), Some(device));
    assert_eq!(device.to_string(), code);
}

#[test]
fn unknown_device_code() {
    assert_eq!(Device::parse("XX"), None);
    assert_eq!(Device::parse(""), None);
}

#[parameterized(
    offline = { DeviceState::Offline, "OFFLINE" },
    standby = { DeviceState::Standby, "STANDBY" },
    disable = { DeviceState::Disable, "DISABLE" },
    enable = { DeviceState::Enable, "ENABLE" },
    fault = { DeviceState::Fault, "FAULT" },
)]
fn state_round_trip(state: DeviceState, name: &str) {
    assert_eq!(state.as_str(), name);
    assert_eq!(DeviceState::parse(name), Some(state));
}

#[test]
fn device_serde_uses_wire_codes() {
    let yaml = serde_yaml::to_string(&Device::AuxTel).unwrap();
    assert_eq!(yaml.trim(), "AT");

    let parsed: DeviceState = serde_yaml::from_str("ENABLE").unwrap();
    assert_eq!(parsed, DeviceState::Enable);
}
