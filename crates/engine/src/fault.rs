// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fault and telemetry routing.

use crate::error::EngineError;
use dmcs_core::fault::{FaultRecord, FaultType};
use dmcs_core::message::{Message, StateEvent};
use dmcs_core::{codes, Device, DeviceState};
use dmcs_scoreboard::StateScoreboard;
use dmcs_transport::MessageBus;
use std::sync::Arc;
use tracing::{error, info};

/// Classifies inbound faults, records them, and republishes to the OCS.
pub struct FaultRouter<B> {
    bus: Arc<B>,
    state: StateScoreboard,
    ocs_publish: String,
    telemetry_queue: String,
}

impl<B: MessageBus> FaultRouter<B> {
    pub fn new(
        bus: Arc<B>,
        state: StateScoreboard,
        ocs_publish: impl Into<String>,
        telemetry_queue: impl Into<String>,
    ) -> Self {
        Self {
            bus,
            state,
            ocs_publish: ocs_publish.into(),
            telemetry_queue: telemetry_queue.into(),
        }
    }

    /// Handle one fault report.
    ///
    /// The record goes to the device's history first, then fault entry is
    /// forced (accepted from any non-fault state, no matrix check) with the
    /// fault event set, and the report is re-emitted upstream.
    pub async fn process_fault(&self, record: &FaultRecord) -> Result<(), EngineError> {
        error!(
            device = %record.device,
            code = record.error_code,
            component = %record.component,
            "fault: {}",
            record.description
        );

        self.state.append_fault_history(record.device, record)?;

        if matches!(record.fault_type, FaultType::Fault)
            && self.state.device_state(record.device)? != Some(DeviceState::Fault)
        {
            self.enter_fault_state(record.device).await?;
        }

        self.bus
            .publish(&self.ocs_publish, &Message::Fault(record.clone()))
            .await?;
        Ok(())
    }

    /// Force a device into FAULT and emit the OCS-visible event pair.
    async fn enter_fault_state(&self, device: Device) -> Result<(), EngineError> {
        self.state.set_device_state(device, DeviceState::Fault)?;
        self.bus
            .publish(
                &self.ocs_publish,
                &Message::StateEvent(StateEvent::SummaryState {
                    device,
                    current_state: DeviceState::Fault,
                }),
            )
            .await?;
        self.bus
            .publish(
                &self.ocs_publish,
                &Message::StateEvent(StateEvent::ErrorCode {
                    device,
                    error_code: codes::ERR_CODE_EVENT_VALUE,
                }),
            )
            .await?;
        Ok(())
    }

    /// Emit a telemetry datum to the telemetry sink.
    pub async fn send_telemetry(
        &self,
        device: Device,
        status_code: u32,
        description: &str,
    ) -> Result<(), EngineError> {
        info!(device = %device, status_code, "telemetry: {description}");
        self.bus
            .publish(
                &self.telemetry_queue,
                &Message::Telemetry {
                    device,
                    status_code,
                    description: description.to_string(),
                },
            )
            .await?;
        Ok(())
    }
}
