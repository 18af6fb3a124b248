// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The device transition matrix and the events a valid transition emits.
//!
//! ```text
//! OFFLINE ↔ STANDBY ↔ DISABLE ↔ ENABLE
//! STANDBY → FAULT   DISABLE → FAULT   ENABLE → FAULT
//! FAULT → OFFLINE           (via RESET_FROM_FAULT only)
//! ```

use crate::command::OcsCommand;
use crate::device::DeviceState;

/// Ack code returned for a same-state transition request.
pub const ACK_CODE_SAME_STATE: i32 = -324;

/// Ack code returned for an unreachable transition request.
pub const ACK_CODE_BAD_TRANSITION: i32 = -320;

/// Why a requested transition was refused. State is never changed on refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionRefusal {
    /// Requested state equals the current state (ack code −324).
    SameState,
    /// The pair (current, requested) is false in the matrix (ack code −320).
    Unreachable,
}

impl TransitionRefusal {
    pub fn ack_code(&self) -> i32 {
        match self {
            TransitionRefusal::SameState => ACK_CODE_SAME_STATE,
            TransitionRefusal::Unreachable => ACK_CODE_BAD_TRANSITION,
        }
    }
}

/// True when `from → to` is a legal transition.
///
/// Fault entry is deliberately absent from the reset path: `FAULT` is left
/// only through `RESET_FROM_FAULT`, which is handled outside the matrix.
pub fn transition_allowed(from: DeviceState, to: DeviceState) -> bool {
    use DeviceState::*;
    matches!(
        (from, to),
        (Offline, Standby)
            | (Standby, Offline)
            | (Standby, Disable)
            | (Standby, Fault)
            | (Disable, Standby)
            | (Disable, Enable)
            | (Disable, Fault)
            | (Enable, Disable)
            | (Enable, Fault)
    )
}

/// Validate a requested transition without applying it.
pub fn validate_transition(
    from: DeviceState,
    to: DeviceState,
) -> Result<(), TransitionRefusal> {
    if from == to {
        return Err(TransitionRefusal::SameState);
    }
    if !transition_allowed(from, to) {
        return Err(TransitionRefusal::Unreachable);
    }
    Ok(())
}

/// The OCS-visible events a successful transition emits, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEvent {
    SummaryState,
    SettingsApplied,
    AppliedSettingsMatchStart,
    RecommendedSettingsVersion,
    ErrorCode,
}

/// Event set for a completed command, in the order they must be published.
///
/// Every transition emits a summary-state event; `START` and `ENTER_CONTROL`
/// add their settings events, and fault entry adds the error-code event.
pub fn transition_events(command: OcsCommand) -> &'static [TransitionEvent] {
    use TransitionEvent::*;
    match command {
        OcsCommand::Start => &[SummaryState, SettingsApplied, AppliedSettingsMatchStart],
        OcsCommand::EnterControl => &[SummaryState, RecommendedSettingsVersion],
        _ => &[SummaryState],
    }
}

/// Event set for fault entry (not a commanded transition).
pub fn fault_entry_events() -> &'static [TransitionEvent] {
    &[TransitionEvent::SummaryState, TransitionEvent::ErrorCode]
}

#[cfg(test)]
#[path = "transitions_tests.rs"]
mod tests;
