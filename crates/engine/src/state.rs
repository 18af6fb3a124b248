// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The device state manager: the authoritative OCS state machine.
//!
//! Every OCS command lands here. Transitions are validated against the
//! matrix in `dmcs_core::transitions`; a valid one updates the state
//! scoreboard, acks positively, and emits the OCS-visible event set for that
//! command. Refusals ack negatively with the rejection code and leave state
//! untouched.

use crate::ack_wait::AckCoordinator;
use crate::error::EngineError;
use dmcs_core::clock::Clock;
use dmcs_core::message::{CommandAck, CommandBody, Message, StateEvent};
use dmcs_core::transitions::{self, TransitionEvent, TransitionRefusal};
use dmcs_core::{Device, DeviceState, OcsCommand, SessionId};
use dmcs_scoreboard::{SequenceScoreboard, StateScoreboard};
use dmcs_transport::MessageBus;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Versions reported in the settings-applied event.
#[derive(Debug, Clone)]
pub struct GeneralSettings {
    pub ts_xml_version: String,
    pub ts_sal_version: String,
    pub l1_dm_repo_tag: String,
}

/// Pending-ack window for new-session fan-out replies.
const NEW_SESSION_ACK_WAIT: Duration = Duration::from_secs(3);

/// Settings tag reported until the settings database exists.
const APPLIED_SETTINGS: &str = "L1SysCfg_1";

pub struct DeviceStateManager<B, C: Clock> {
    bus: Arc<B>,
    state: StateScoreboard,
    sequences: SequenceScoreboard,
    coordinator: AckCoordinator<C>,
    clock: C,
    ocs_publish: String,
    dmcs_ack_queue: String,
    settings: GeneralSettings,
    /// Raft set bound to each new session.
    session_rafts: Vec<String>,
}

impl<B: MessageBus, C: Clock> DeviceStateManager<B, C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bus: Arc<B>,
        state: StateScoreboard,
        sequences: SequenceScoreboard,
        coordinator: AckCoordinator<C>,
        clock: C,
        ocs_publish: impl Into<String>,
        dmcs_ack_queue: impl Into<String>,
        settings: GeneralSettings,
        session_rafts: Vec<String>,
    ) -> Self {
        Self {
            bus,
            state,
            sequences,
            coordinator,
            clock,
            ocs_publish: ocs_publish.into(),
            dmcs_ack_queue: dmcs_ack_queue.into(),
            settings,
            session_rafts,
        }
    }

    /// Process one OCS command end to end.
    pub async fn process_command(
        &self,
        command: OcsCommand,
        body: &CommandBody,
    ) -> Result<(), EngineError> {
        match command {
            OcsCommand::SetValue => self.process_set_value(body).await,
            OcsCommand::ResetFromFault => self.process_reset_from_fault(body).await,
            _ => self.process_transition(command, body).await,
        }
    }

    async fn process_transition(
        &self,
        command: OcsCommand,
        body: &CommandBody,
    ) -> Result<(), EngineError> {
        let device = body.device;
        let Some(target) = command.target_state() else {
            return Ok(());
        };
        let current = self
            .state
            .device_state(device)?
            .ok_or(EngineError::UnknownDevice(device))?;

        // START may carry a cfg key; a bad key refuses the whole command
        // before any transition check.
        let mut cfg_response = String::new();
        if command == OcsCommand::Start {
            if let Some(key) = &body.cfg_key {
                if self.state.cfg_keys_contain(device, key)? {
                    self.state.set_device_cfg_key(device, key)?;
                    cfg_response = format!(" CFG Key set to {key}");
                } else {
                    let statement = format!("Bad CFG Key - remaining in {current}");
                    warn!(device = %device, key, "refusing START: unknown cfg key");
                    self.send_command_ack(command, body, false, &statement, None)
                        .await?;
                    return Ok(());
                }
            }
        }

        match transitions::validate_transition(current, target) {
            Ok(()) => {
                self.state.set_device_state(device, target)?;
                let statement = format!("{device} device in {target}{cfg_response}");
                info!(device = %device, from = %current, to = %target, "transition accepted");
                self.send_command_ack(command, body, true, &statement, None)
                    .await?;
                self.send_transition_events(device, command).await?;

                // A fresh control period opens a fresh session
                if matches!(command, OcsCommand::EnterControl | OcsCommand::Standby) {
                    self.open_new_session().await?;
                }
            }
            Err(refusal) => {
                let statement = match refusal {
                    TransitionRefusal::SameState => {
                        format!("Invalid same state transition: {current} to {target}")
                    }
                    TransitionRefusal::Unreachable => {
                        format!("Invalid transition: {current} to {target}")
                    }
                };
                warn!(device = %device, from = %current, to = %target, code = refusal.ack_code(), "transition refused");
                self.send_command_ack(command, body, false, &statement, Some(refusal.ack_code()))
                    .await?;
            }
        }
        Ok(())
    }

    /// `RESET_FROM_FAULT` is the sole exit from FAULT: the device returns to
    /// OFFLINE and the summary state is re-announced.
    async fn process_reset_from_fault(&self, body: &CommandBody) -> Result<(), EngineError> {
        let device = body.device;
        self.state.set_device_state(device, DeviceState::Offline)?;
        let statement = format!("Resetting {device} to OFFLINE state.");
        self.send_command_ack(OcsCommand::ResetFromFault, body, true, &statement, None)
            .await?;
        self.send_summary_state(device).await?;
        Ok(())
    }

    /// `SET_VALUE` applies only in ENABLE and never transitions.
    async fn process_set_value(&self, body: &CommandBody) -> Result<(), EngineError> {
        let device = body.device;
        let current = self
            .state
            .device_state(device)?
            .ok_or(EngineError::UnknownDevice(device))?;

        let (ack_bool, statement) = if current != DeviceState::Enable {
            (
                false,
                format!(
                    "Current state is {current}. Device state must be in ENABLE state for SET_VALUE command."
                ),
            )
        } else {
            match &body.value {
                Some(value) => {
                    let rendered = serde_yaml::to_string(value)
                        .map(|s| s.trim().to_string())
                        .unwrap_or_default();
                    (
                        true,
                        format!("Device {device} set to new value: {rendered}"),
                    )
                }
                None => (false, format!("Value is not valid for {device}")),
            }
        };
        self.send_command_ack(OcsCommand::SetValue, body, ack_bool, &statement, None)
            .await
    }

    /// Draw a session id, mark it current, bind the raft snapshot, and fan
    /// `<DEV>_NEW_SESSION` out to every registered device.
    async fn open_new_session(&self) -> Result<(), EngineError> {
        let session = self.sequences.next_session_id()?;
        self.state.set_current_session(&session)?;
        self.state
            .set_rafts_for_session(&session, &self.session_rafts)?;
        info!(session = %session, "opened new session");
        self.send_new_session(&session).await
    }

    async fn send_new_session(&self, session: &SessionId) -> Result<(), EngineError> {
        for device in Device::ALL {
            let Some(queue) = self.state.device_consume_queue(device)? else {
                continue;
            };
            let ack_id = self.sequences.next_ack_id(
                &format!("{device}_NEW_SESSION_ACK"),
                self.clock.now_utc(),
            )?;
            self.bus
                .publish(
                    &queue,
                    &Message::NewSession {
                        device,
                        session_id: session.clone(),
                        ack_id: ack_id.clone(),
                        reply_queue: self.dmcs_ack_queue.clone(),
                    },
                )
                .await?;
            self.coordinator.add_pending(&ack_id, NEW_SESSION_ACK_WAIT)?;
        }
        Ok(())
    }

    async fn send_command_ack(
        &self,
        command: OcsCommand,
        body: &CommandBody,
        ack_bool: bool,
        statement: &str,
        ack_code: Option<i32>,
    ) -> Result<(), EngineError> {
        self.bus
            .publish(
                &self.ocs_publish,
                &Message::CommandAck(
                    command,
                    CommandAck {
                        device: body.device,
                        ack_id: body.ack_id.clone(),
                        cmd_id: body.cmd_id,
                        ack_bool,
                        ack_statement: statement.to_string(),
                        ack_code,
                    },
                ),
            )
            .await?;
        Ok(())
    }

    /// Emit the OCS-visible events for a completed command, in order.
    async fn send_transition_events(
        &self,
        device: Device,
        command: OcsCommand,
    ) -> Result<(), EngineError> {
        for event in transitions::transition_events(command) {
            match event {
                TransitionEvent::SummaryState => self.send_summary_state(device).await?,
                TransitionEvent::SettingsApplied => {
                    self.publish_event(StateEvent::SettingsApplied {
                        device,
                        applied: true,
                        settings: APPLIED_SETTINGS.to_string(),
                        ts_xml_version: self.settings.ts_xml_version.clone(),
                        ts_sal_version: self.settings.ts_sal_version.clone(),
                        l1_dm_repo_tag: self.settings.l1_dm_repo_tag.clone(),
                    })
                    .await?;
                }
                TransitionEvent::AppliedSettingsMatchStart => {
                    self.publish_event(StateEvent::AppliedSettingsMatchStart {
                        device,
                        applied: true,
                    })
                    .await?;
                }
                TransitionEvent::RecommendedSettingsVersion => {
                    let cfg_key = self.state.device_cfg_key(device)?.unwrap_or_default();
                    self.publish_event(StateEvent::RecommendedSettingsVersion { device, cfg_key })
                        .await?;
                }
                TransitionEvent::ErrorCode => {
                    self.publish_event(StateEvent::ErrorCode {
                        device,
                        error_code: dmcs_core::codes::ERR_CODE_EVENT_VALUE,
                    })
                    .await?;
                }
            }
        }
        Ok(())
    }

    async fn send_summary_state(&self, device: Device) -> Result<(), EngineError> {
        let current_state = self
            .state
            .device_state(device)?
            .ok_or(EngineError::UnknownDevice(device))?;
        self.publish_event(StateEvent::SummaryState {
            device,
            current_state,
        })
        .await
    }

    async fn publish_event(&self, event: StateEvent) -> Result<(), EngineError> {
        self.bus
            .publish(&self.ocs_publish, &Message::StateEvent(event))
            .await?;
        Ok(())
    }
}
