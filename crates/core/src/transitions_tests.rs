// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::device::DeviceState::*;

/// The matrix, spelled out. Rows are `from`, columns `to`, in the order
/// OFFLINE, STANDBY, DISABLE, ENABLE, FAULT.
const MATRIX: [[bool; 5]; 5] = [
    [false, true, false, false, false],  // OFFLINE
    [true, false, true, false, true],    // STANDBY
    [false, true, false, true, true],    // DISABLE
    [false, false, true, false, true],   // ENABLE
    [false, false, false, false, false], // FAULT (left only via reset)
];

const STATES: [crate::device::DeviceState; 5] = [Offline, Standby, Disable, Enable, Fault];

#[test]
fn matrix_is_exhaustive() {
    for (i, from) in STATES.iter().enumerate() {
        for (j, to) in STATES.iter().enumerate() {
            assert_eq!(
                transition_allowed(*from, *to),
                MATRIX[i][j],
                "transition {from} -> {to}"
            );
        }
    }
}

#[test]
fn same_state_is_refused_with_324() {
    for state in STATES {
        let refusal = validate_transition(state, state).unwrap_err();
        assert_eq!(refusal, TransitionRefusal::SameState);
        assert_eq!(refusal.ack_code(), -324);
    }
}

#[test]
fn unreachable_is_refused_with_320() {
    let refusal = validate_transition(Offline, Enable).unwrap_err();
    assert_eq!(refusal, TransitionRefusal::Unreachable);
    assert_eq!(refusal.ack_code(), -320);
}

#[test]
fn fault_is_terminal_in_the_matrix() {
    for to in STATES {
        assert!(validate_transition(Fault, to).is_err());
    }
}

#[test]
fn valid_transitions_pass() {
    assert!(validate_transition(Offline, Standby).is_ok());
    assert!(validate_transition(Standby, Disable).is_ok());
    assert!(validate_transition(Disable, Enable).is_ok());
    assert!(validate_transition(Enable, Disable).is_ok());
    assert!(validate_transition(Standby, Offline).is_ok());
}

#[test]
fn start_emits_settings_events_in_order() {
    use TransitionEvent::*;
    assert_eq!(
        transition_events(crate::command::OcsCommand::Start),
        &[SummaryState, SettingsApplied, AppliedSettingsMatchStart]
    );
}

#[test]
fn enter_control_emits_recommended_settings() {
    use TransitionEvent::*;
    assert_eq!(
        transition_events(crate::command::OcsCommand::EnterControl),
        &[SummaryState, RecommendedSettingsVersion]
    );
}

#[test]
fn plain_transitions_emit_summary_only() {
    use TransitionEvent::*;
    for cmd in [
        crate::command::OcsCommand::Enable,
        crate::command::OcsCommand::Disable,
        crate::command::OcsCommand::Standby,
        crate::command::OcsCommand::ExitControl,
    ] {
        assert_eq!(transition_events(cmd), &[SummaryState]);
    }
}

#[test]
fn fault_entry_emits_summary_then_error_code() {
    use TransitionEvent::*;
    assert_eq!(fault_entry_events(), &[SummaryState, ErrorCode]);
}
