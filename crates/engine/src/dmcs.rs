// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The DMCS coordinator: queue-facing handlers over the state manager,
//! fault router, and scoreboards.
//!
//! Exposure events fan out to every ENABLE device with a fresh job number
//! and a pending ack; replies and faults land back here and are persisted
//! before any fast-path handling.

use crate::ack_wait::AckCoordinator;
use crate::error::EngineError;
use crate::fault::FaultRouter;
use crate::state::DeviceStateManager;
use dmcs_core::clock::Clock;
use dmcs_core::job::{Job, JobState};
use dmcs_core::message::{
    AckBody, ExposureEvent, HeaderReadyBody, ImageMeta, Message, ReadoutBody,
    StartIntegrationBody,
};
use dmcs_core::visit::Visit;
use dmcs_core::{Device, DeviceState};
use dmcs_scoreboard::{
    BacklogScoreboard, JobScoreboard, SequenceScoreboard, StateScoreboard,
};
use dmcs_transport::MessageBus;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pending-ack window for exposure dispatches.
const DISPATCH_ACK_WAIT: Duration = Duration::from_secs(5);

/// Receipt values that mark a CCD transfer as failed.
const RECEIPT_NO_FILE: &str = "0";
const RECEIPT_BAD_CHECKSUM: &str = "-1";

/// Queue names and per-exposure composition inputs.
#[derive(Debug, Clone)]
pub struct DmcsConfig {
    pub ocs_publish: String,
    pub dmcs_ack_queue: String,
    /// Full-frame ccd list used for non-auxtel devices.
    pub ccd_list: Vec<String>,
    /// Wavefront raft/ccd pair used for the auxtel device.
    pub wfs_raft: String,
    pub wfs_ccd: String,
}

pub struct Dmcs<B, C: Clock> {
    bus: Arc<B>,
    cfg: DmcsConfig,
    state_manager: DeviceStateManager<B, C>,
    fault_router: FaultRouter<B>,
    coordinator: AckCoordinator<C>,
    state: StateScoreboard,
    jobs: JobScoreboard,
    sequences: SequenceScoreboard,
    backlog: BacklogScoreboard,
    clock: C,
}

impl<B: MessageBus, C: Clock> Dmcs<B, C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bus: Arc<B>,
        cfg: DmcsConfig,
        state_manager: DeviceStateManager<B, C>,
        fault_router: FaultRouter<B>,
        coordinator: AckCoordinator<C>,
        state: StateScoreboard,
        jobs: JobScoreboard,
        sequences: SequenceScoreboard,
        backlog: BacklogScoreboard,
        clock: C,
    ) -> Self {
        Self {
            bus,
            cfg,
            state_manager,
            fault_router,
            coordinator,
            state,
            jobs,
            sequences,
            backlog,
            clock,
        }
    }

    /// Handler for `ocs_dmcs_consume`: commands and exposure events.
    pub async fn handle_ocs(&self, msg: Message) -> Result<(), EngineError> {
        match msg {
            Message::Command(command, body) => {
                self.state_manager.process_command(command, &body).await
            }
            Message::ExposureEvent(event) => self.handle_exposure_event(event).await,
            other => {
                warn!(msg_type = %other.msg_type(), "unexpected message on OCS queue, dropping");
                Ok(())
            }
        }
    }

    async fn handle_exposure_event(&self, event: ExposureEvent) -> Result<(), EngineError> {
        match event {
            ExposureEvent::StartIntegration { image_id, meta } => {
                self.dispatch_start_integration(&image_id, &meta).await
            }
            ExposureEvent::EndReadout { image_id, meta } => {
                self.dispatch_end_readout(&image_id, &meta).await
            }
            ExposureEvent::HeaderReady { filename, image_id } => {
                self.dispatch_header_ready(&filename, &image_id).await
            }
            ExposureEvent::NextVisit {
                visit_id,
                bore_sight,
            } => {
                info!(visit = %visit_id, "next visit");
                self.state.push_visit(&Visit {
                    id: visit_id,
                    bore_sight,
                })?;
                Ok(())
            }
        }
    }

    /// Open a job on every ENABLE device and hand it the exposure.
    async fn dispatch_start_integration(
        &self,
        image_id: &str,
        meta: &ImageMeta,
    ) -> Result<(), EngineError> {
        let enabled = self.state.devices_by_state(DeviceState::Enable)?;
        if enabled.is_empty() {
            warn!(image_id, "start integration with no device in ENABLE");
            return Ok(());
        }
        let session = self
            .state
            .current_session()?
            .ok_or(EngineError::NoCurrentSession)?;
        let visit = self.state.current_visit_id()?;

        let mut pending = Vec::new();
        for (device, queue) in enabled {
            let (raft_list, raft_ccd_list) = self.work_lists_for(device, &session)?;
            let job_num = self.sequences.next_job_num(&session)?;
            let mut job = Job::new(
                job_num.clone(),
                device,
                image_id,
                raft_list.clone(),
                raft_ccd_list.clone(),
            );
            job.visit = visit.clone();
            self.jobs.put_job(&job)?;
            self.state.set_current_device_job(device, &job_num)?;
            self.jobs.set_job_state(&job_num, JobState::Dispatched)?;

            let ack_id = self.sequences.next_ack_id(
                &format!("{device}_START_INT_ACK"),
                self.clock.now_utc(),
            )?;
            debug!(device = %device, job = %job_num, image_id, "dispatching start integration");
            self.bus
                .publish(
                    &queue,
                    &Message::DeviceStartIntegration(
                        device,
                        StartIntegrationBody {
                            image_id: image_id.to_string(),
                            session_id: session.clone(),
                            job_num,
                            ack_id: ack_id.clone(),
                            reply_queue: self.cfg.dmcs_ack_queue.clone(),
                            raft_list,
                            raft_ccd_list,
                            meta: meta.clone(),
                        },
                    ),
                )
                .await?;
            pending.push(ack_id);
        }

        for ack_id in &pending {
            self.coordinator.add_pending(ack_id, DISPATCH_ACK_WAIT)?;
        }
        Ok(())
    }

    async fn dispatch_end_readout(
        &self,
        image_id: &str,
        meta: &ImageMeta,
    ) -> Result<(), EngineError> {
        let session = self
            .state
            .current_session()?
            .ok_or(EngineError::NoCurrentSession)?;

        for (device, queue) in self.state.devices_by_state(DeviceState::Enable)? {
            let Some(job_num) = self.state.current_device_job(device)? else {
                warn!(device = %device, "end readout with no current job");
                continue;
            };
            let ack_id = self.sequences.next_ack_id(
                &format!("{device}_END_READOUT_ACK"),
                self.clock.now_utc(),
            )?;
            self.jobs.set_job_state(&job_num, JobState::Readout)?;
            self.bus
                .publish(
                    &queue,
                    &Message::DeviceEndReadout(
                        device,
                        ReadoutBody {
                            image_id: image_id.to_string(),
                            session_id: session.clone(),
                            job_num,
                            ack_id: ack_id.clone(),
                            reply_queue: self.cfg.dmcs_ack_queue.clone(),
                            meta: meta.clone(),
                        },
                    ),
                )
                .await?;
            self.coordinator.add_pending(&ack_id, DISPATCH_ACK_WAIT)?;
        }
        Ok(())
    }

    async fn dispatch_header_ready(
        &self,
        filename: &str,
        image_id: &str,
    ) -> Result<(), EngineError> {
        for (device, queue) in self.state.devices_by_state(DeviceState::Enable)? {
            let Some(job_num) = self.state.current_device_job(device)? else {
                continue;
            };
            let ack_id = self.sequences.next_ack_id(
                &format!("{device}_HEADER_READY_ACK"),
                self.clock.now_utc(),
            )?;
            self.jobs.set_job_state(&job_num, JobState::HeaderReady)?;
            self.bus
                .publish(
                    &queue,
                    &Message::DeviceHeaderReady(
                        device,
                        HeaderReadyBody {
                            filename: filename.to_string(),
                            image_id: image_id.to_string(),
                            ack_id,
                            reply_queue: foreman_ack_queue(device),
                        },
                    ),
                )
                .await?;
        }
        Ok(())
    }

    /// Handler for `dmcs_ack_consume`: replies and pending registrations.
    pub async fn handle_ack(&self, msg: Message) -> Result<(), EngineError> {
        match msg {
            Message::Ack(body) => {
                if body.kind.ends_with("_READOUT_ACK") {
                    self.process_readout_results(&body)?;
                }
                self.coordinator.acks().add_timed_ack(&body)?;
                Ok(())
            }
            Message::PendingAck {
                ack_id,
                expiry_epoch_ms,
            } => {
                self.coordinator.acks().add_pending(&ack_id, expiry_epoch_ms)?;
                Ok(())
            }
            other => {
                warn!(msg_type = %other.msg_type(), "unexpected message on ack queue, dropping");
                Ok(())
            }
        }
    }

    /// Close out a job from its readout reply: mark complete, store results,
    /// park failed CCDs on the backlog.
    fn process_readout_results(&self, body: &AckBody) -> Result<(), EngineError> {
        let Some(job_num) = &body.job_num else {
            return Ok(());
        };
        if !body.ack_bool {
            warn!(job = %job_num, kind = %body.kind, "negative readout ack, job left as-is");
            return Ok(());
        }
        let results = body.result_list.as_ref().or(body.result_set.as_ref());
        let Some(results) = results else {
            self.jobs.set_job_state(job_num, JobState::Complete)?;
            return Ok(());
        };

        self.jobs.set_job_state(job_num, JobState::Complete)?;
        self.jobs.set_results(job_num, results)?;

        // Receipt 0 = no file, -1 = bad checksum
        let failed: Vec<String> = results
            .filename_list
            .iter()
            .zip(results.receipt_list.iter())
            .filter(|(_, receipt)| {
                receipt.as_str() == RECEIPT_NO_FILE || receipt.as_str() == RECEIPT_BAD_CHECKSUM
            })
            .map(|(file, _)| file.clone())
            .collect();
        if !failed.is_empty() {
            warn!(job = %job_num, count = failed.len(), "parking failed CCDs on backlog");
            self.backlog.add_ccds_by_job(
                job_num,
                failed,
                body.image_id.as_deref().unwrap_or_default(),
            )?;
        }
        Ok(())
    }

    /// Handler for `dmcs_fault_consume`.
    pub async fn handle_fault(&self, msg: Message) -> Result<(), EngineError> {
        match msg {
            Message::Fault(record) => self.fault_router.process_fault(&record).await,
            other => {
                warn!(msg_type = %other.msg_type(), "unexpected message on fault queue, dropping");
                Ok(())
            }
        }
    }

    /// Handler for the general queue (`gen_dmcs_consume`).
    pub async fn handle_general(&self, msg: Message) -> Result<(), EngineError> {
        match msg {
            Message::RequestAckId => {
                let ack_id = self.sequences.next_ack_id("", self.clock.now_utc())?;
                self.bus
                    .publish(
                        &self.cfg.ocs_publish,
                        &Message::ResponseAckId {
                            ack_id_value: ack_id.to_string(),
                        },
                    )
                    .await?;
                Ok(())
            }
            other => {
                warn!(msg_type = %other.msg_type(), "unexpected message on general queue, dropping");
                Ok(())
            }
        }
    }

    fn work_lists_for(
        &self,
        device: Device,
        session: &dmcs_core::SessionId,
    ) -> Result<(Vec<String>, Vec<Vec<String>>), EngineError> {
        if device == Device::AuxTel {
            return Ok((
                vec![self.cfg.wfs_raft.clone()],
                vec![vec![self.cfg.wfs_ccd.clone()]],
            ));
        }
        let rafts = self.state.rafts_for_session(session)?;
        let ccds = rafts.iter().map(|_| self.cfg.ccd_list.clone()).collect();
        Ok((rafts, ccds))
    }
}

/// The per-device foreman ack queue (`at_foreman_ack_publish`, …).
pub fn foreman_ack_queue(device: Device) -> String {
    format!("{}_foreman_ack_publish", device.code().to_lowercase())
}

#[cfg(test)]
#[path = "dmcs_tests.rs"]
mod tests;
