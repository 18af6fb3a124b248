// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The auxtel exposure orchestrator (foreman).
//!
//! Runs the per-exposure choreography: health-check the forwarders, get a
//! target directory from the archive controller, program the chosen
//! forwarder with transfer parameters, accept the job, then relay readout
//! and header-ready. Forwarder responses are tracked in an in-orchestrator
//! state dict (this device runs one forwarder and a spare, which does not
//! justify a dedicated scoreboard); every inbound ack is also persisted to
//! the ack scoreboard.

use crate::ack_wait::AckCoordinator;
use crate::error::EngineError;
use crate::instance::InstanceGuard;
use dmcs_core::ack::AckId;
use dmcs_core::clock::Clock;
use dmcs_core::codes;
use dmcs_core::fault::{FaultRecord, FaultType};
use dmcs_core::job::{JobNum, JobState, ResultSet};
use dmcs_core::message::{
    AckBody, HeaderReadyBody, Message, ReadoutBody, StartIntegrationBody, XferParams,
    XferParamsBody,
};
use dmcs_core::work::divide_work;
use dmcs_core::Device;
use dmcs_scoreboard::{JobScoreboard, SequenceScoreboard};
use dmcs_transport::MessageBus;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Window for forwarder health-check replies.
const HEALTH_CHECK_WAIT: Duration = Duration::from_secs(2);

/// Window for the archive-controller directory reply.
const ARCHIVE_ITEM_WAIT: Duration = Duration::from_secs(4);

/// Window for the forwarder xfer-params reply.
const XFER_PARAMS_WAIT: Duration = Duration::from_secs(30);

/// Window for the archive-controller items-transferred reply.
const ITEMS_XFERD_WAIT: Duration = Duration::from_secs(8);

/// Pause between startup forwarder-acquisition rounds.
const ACQUIRE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// One registered forwarder worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwarderInfo {
    /// Fully-qualified name, as it appears in reply `COMPONENT` fields.
    pub fqn: String,
    pub consume_queue: String,
}

/// Foreman wiring and composition inputs.
#[derive(Debug, Clone)]
pub struct ForemanConfig {
    pub device: Device,
    /// Component name stamped on outbound acks (e.g. `AUX_FOREMAN`).
    pub component: String,
    pub forwarders: Vec<ForwarderInfo>,
    /// Own reply queue (`at_foreman_ack_publish`).
    pub ack_queue: String,
    /// DMCS-facing ack queue (`dmcs_ack_consume`).
    pub dmcs_ack_queue: String,
    /// Fault report queue (`dmcs_fault_consume`).
    pub fault_queue: String,
    pub telemetry_queue: String,
    /// Archive controller inbound queue (`archive_ctrl_consume`).
    pub archive_ctrl_queue: String,
    pub use_archive_ctrl: bool,
    pub archive_login: String,
    pub archive_ip: String,
    /// Fallback staging root when the controller gives no directory.
    pub archive_xfer_root: String,
}

/// Last-known response state of a forwarder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum FwdrResponse {
    #[default]
    Unknown,
    Healthy,
    Responsive,
}

#[derive(Debug, Clone, Default)]
struct FwdrStatus {
    response: FwdrResponse,
    ack_bool: Option<bool>,
    result_set: Option<ResultSet>,
}

#[derive(Debug, Clone, Default)]
struct ArchiveAck {
    responsive: bool,
    target_dir: Option<String>,
    result_set: Option<ResultSet>,
}

/// Readout bookkeeping between `END_READOUT` and its asynchronous reply.
#[derive(Debug, Clone)]
struct ReadoutContext {
    reply_queue: String,
    ack_id: AckId,
    job_num: JobNum,
    image_id: String,
}

pub struct AuxForeman<B, C: Clock> {
    cfg: ForemanConfig,
    bus: Arc<B>,
    jobs: JobScoreboard,
    sequences: SequenceScoreboard,
    coordinator: AckCoordinator<C>,
    clock: C,
    /// Fast-path ack analysis; guarded for the read-modify-write only,
    /// released before any publish or sleep.
    fwdr_state: Mutex<HashMap<String, FwdrStatus>>,
    archive_ack: Mutex<ArchiveAck>,
    current_fwdr: Mutex<Option<ForwarderInfo>>,
    readout_ctx: Mutex<Option<ReadoutContext>>,
    _guard: InstanceGuard,
}

impl<B: MessageBus, C: Clock> AuxForeman<B, C> {
    /// Build the foreman, claiming its process-wide instance slot.
    pub fn new(
        cfg: ForemanConfig,
        bus: Arc<B>,
        jobs: JobScoreboard,
        sequences: SequenceScoreboard,
        coordinator: AckCoordinator<C>,
        clock: C,
    ) -> Result<Arc<Self>, EngineError> {
        let guard = InstanceGuard::acquire(&cfg.component)?;
        let fwdr_state = cfg
            .forwarders
            .iter()
            .map(|f| (f.fqn.clone(), FwdrStatus::default()))
            .collect();
        Ok(Arc::new(Self {
            cfg,
            bus,
            jobs,
            sequences,
            coordinator,
            clock,
            fwdr_state: Mutex::new(fwdr_state),
            archive_ack: Mutex::new(ArchiveAck::default()),
            current_fwdr: Mutex::new(None),
            readout_ctx: Mutex::new(None),
            _guard: guard,
        }))
    }

    pub fn device(&self) -> Device {
        self.cfg.device
    }

    /// Block until at least one forwarder answers a health check.
    ///
    /// Startup holds the consumers back until a worker exists to take jobs.
    pub async fn acquire_forwarder(&self) -> Result<(), EngineError> {
        loop {
            if self.do_health_check().await?.is_some() {
                info!(device = %self.cfg.device, "forwarder acquired");
                return Ok(());
            }
            info!(device = %self.cfg.device, "no forwarder yet, retrying");
            tokio::time::sleep(ACQUIRE_RETRY_DELAY).await;
        }
    }

    /// Handler for the foreman consume queue.
    pub async fn handle(&self, msg: Message) -> Result<(), EngineError> {
        match msg {
            Message::DeviceStartIntegration(_, body) => {
                self.process_start_integration(body).await
            }
            Message::DeviceEndReadout(_, body) => self.process_end_readout(body).await,
            Message::DeviceHeaderReady(_, body) => self.process_header_ready(body).await,
            Message::NewSession { ack_id, reply_queue, .. } => {
                self.ack_new_session(ack_id, &reply_queue).await
            }
            other => {
                warn!(msg_type = %other.msg_type(), "unexpected message on foreman queue, dropping");
                Ok(())
            }
        }
    }

    /// Handler for the foreman ack queue and the archive controller replies.
    ///
    /// Every reply is persisted to the ack scoreboard and mirrored into the
    /// fast-path state. A readout reply may finish the readout exchange;
    /// that continuation runs on its own task so this consumer keeps
    /// draining.
    pub async fn handle_ack(self: &Arc<Self>, msg: Message) -> Result<(), EngineError> {
        let Message::Ack(body) = msg else {
            warn!(msg_type = %msg.msg_type(), "unexpected message on foreman ack queue, dropping");
            return Ok(());
        };

        self.coordinator.acks().add_timed_ack(&body)?;

        let kind = body.kind.clone();
        if kind.ends_with("_FWDR_HEALTH_CHECK_ACK") {
            self.set_fwdr_response(&body.component, FwdrResponse::Healthy);
        } else if kind.ends_with("_FWDR_XFER_PARAMS_ACK")
            || kind.ends_with("_FWDR_HEADER_READY_ACK")
        {
            self.set_fwdr_response(&body.component, FwdrResponse::Responsive);
        } else if kind.ends_with("_FWDR_END_READOUT_ACK") {
            self.note_readout_reply(&body);
            let ctx = self.readout_ctx.lock().take();
            if let Some(ctx) = ctx {
                let this = Arc::clone(self);
                let component = body.component.clone();
                tokio::spawn(async move {
                    if let Err(e) = this.complete_readout(ctx, &component).await {
                        warn!(error = %e, "readout completion failed");
                    }
                });
            }
        } else if kind.starts_with("NEW_") && kind.ends_with("_ARCHIVE_ITEM_ACK") {
            let mut archive = self.archive_ack.lock();
            archive.responsive = true;
            archive.target_dir = body.target_dir.clone();
        } else if kind.ends_with("_ITEMS_XFERD_ACK") {
            let mut archive = self.archive_ack.lock();
            archive.responsive = true;
            archive.result_set = body.result_set.clone();
        } else {
            debug!(kind = %kind, "ack with no fast-path handling");
        }
        Ok(())
    }

    /// The start-integration choreography (health check → directory →
    /// xfer params → accept).
    async fn process_start_integration(
        &self,
        body: StartIntegrationBody,
    ) -> Result<(), EngineError> {
        info!(job = %body.job_num, image = %body.image_id, "start integration");
        self.jobs.set_job_state(&body.job_num, JobState::HealthCheck)?;

        let Some(current) = self.do_health_check().await? else {
            self.jobs.set_job_state(&body.job_num, JobState::Scrubbed)?;
            self.send_fault(
                codes::ERR_NO_HEALTH_CHECK_RESPONSE,
                "No health check response from ANY fwdr",
                "FORWARDER",
            )
            .await?;
            return Ok(());
        };

        let target_dir = self.query_archive_dir(&body).await?;
        self.jobs.set_target_dir(&body.job_num, &target_dir)?;

        // Program the forwarder with its slice of the exposure
        let schedule = divide_work(
            std::slice::from_ref(&current.fqn),
            &body.raft_list,
            &body.raft_ccd_list,
        );
        self.jobs.set_schedule(&body.job_num, schedule.clone())?;
        self.jobs
            .set_job_state(&body.job_num, JobState::SendingXferParams)?;

        let xfer_ack_id = self.next_ack_id("FWDR_XFER_PARAMS_ACK")?;
        let target_location = format!(
            "{}@{}:{}",
            self.cfg.archive_login, self.cfg.archive_ip, target_dir
        );
        self.clear_fwdr_state();
        for assignment in &schedule {
            self.bus
                .publish(
                    &current.consume_queue,
                    &Message::FwdrXferParams(
                        self.cfg.device,
                        XferParamsBody {
                            session_id: body.session_id.clone(),
                            image_id: body.image_id.clone(),
                            device: self.cfg.device,
                            job_num: body.job_num.clone(),
                            ack_id: xfer_ack_id.clone(),
                            reply_queue: self.cfg.ack_queue.clone(),
                            target_location: target_location.clone(),
                            xfer_params: XferParams {
                                raft_list: assignment.raft_list.clone(),
                                raft_ccd_list: assignment.raft_ccd_list.clone(),
                                at_fwdr: assignment.forwarder.clone(),
                            },
                        },
                    ),
                )
                .await?;
        }
        self.jobs
            .set_job_state(&body.job_num, JobState::XferParamsSent)?;

        let replies = self
            .coordinator
            .progressive_ack_timer(&xfer_ack_id, schedule.len(), XFER_PARAMS_WAIT)
            .await?;
        let Some(replies) = replies else {
            self.jobs.set_job_state(&body.job_num, JobState::Scrubbed)?;
            self.send_fault(
                codes::ERR_NO_XFER_PARAMS_RESPONSE,
                "No xfer_params response from fwdr.",
                &current.fqn,
            )
            .await?;
            return Ok(());
        };

        // A forwarder that answers but declines refuses the job
        if replies.values().any(|r| !r.ack_bool) {
            self.refuse_job(&body, "forwarder declined xfer params").await?;
            return Ok(());
        }

        self.accept_job(&body).await
    }

    /// Health check every registered forwarder and pick the first healthy
    /// one as current. `None` when nobody answered inside the window.
    async fn do_health_check(&self) -> Result<Option<ForwarderInfo>, EngineError> {
        let ack_id = self.next_ack_id("FWDR_HEALTH_CHECK_ACK")?;
        self.clear_fwdr_state();
        for fwdr in &self.cfg.forwarders {
            self.bus
                .publish(
                    &fwdr.consume_queue,
                    &Message::FwdrHealthCheck {
                        device: self.cfg.device,
                        ack_id: ack_id.clone(),
                        reply_queue: self.cfg.ack_queue.clone(),
                    },
                )
                .await?;
        }

        self.coordinator
            .progressive_ack_timer(&ack_id, self.cfg.forwarders.len(), HEALTH_CHECK_WAIT)
            .await?;

        Ok(self.set_current_fwdr())
    }

    /// First healthy forwarder in registration order wins.
    fn set_current_fwdr(&self) -> Option<ForwarderInfo> {
        let chosen = {
            let state = self.fwdr_state.lock();
            self.cfg
                .forwarders
                .iter()
                .find(|f| {
                    state
                        .get(&f.fqn)
                        .is_some_and(|s| s.response == FwdrResponse::Healthy)
                })
                .cloned()
        };
        *self.current_fwdr.lock() = chosen.clone();
        chosen
    }

    /// Ask the archive controller for a target directory, falling back to
    /// the configured staging root on silence (non-fatal).
    async fn query_archive_dir(
        &self,
        body: &StartIntegrationBody,
    ) -> Result<String, EngineError> {
        if !self.cfg.use_archive_ctrl {
            return Ok(self.cfg.archive_xfer_root.clone());
        }

        self.clear_archive_ack();
        self.jobs
            .set_job_state(&body.job_num, JobState::ArNewItemQuery)?;
        let ack_id = self.next_ack_id("CTRL_NEW_ITEM")?;
        self.bus
            .publish(
                &self.cfg.archive_ctrl_queue,
                &Message::NewArchiveItem {
                    device: self.cfg.device,
                    ack_id: ack_id.clone(),
                    job_num: body.job_num.clone(),
                    session_id: body.session_id.clone(),
                    image_id: body.image_id.clone(),
                    reply_queue: self.cfg.ack_queue.clone(),
                },
            )
            .await?;

        self.coordinator
            .progressive_ack_timer(&ack_id, 1, ARCHIVE_ITEM_WAIT)
            .await?;

        let target_dir = {
            let archive = self.archive_ack.lock();
            archive.responsive.then(|| archive.target_dir.clone()).flatten()
        };
        match target_dir {
            Some(dir) => {
                self.jobs
                    .set_job_state(&body.job_num, JobState::ArNewItemResponse)?;
                Ok(dir)
            }
            None => {
                let description = format!(
                    "Non-Fatal Error - No NEW_{}_ARCHIVE_ITEM response from ArchiveCtrl. Using default Archive Dir location from CFG file: {}",
                    self.cfg.device, self.cfg.archive_xfer_root
                );
                warn!("{description}");
                self.send_telemetry(codes::STATUS_DEFAULT_ARCHIVE_DIR, &description)
                    .await?;
                Ok(self.cfg.archive_xfer_root.clone())
            }
        }
    }

    /// Accept the job toward the DMCS.
    async fn accept_job(&self, body: &StartIntegrationBody) -> Result<(), EngineError> {
        let mut ack = AckBody::new(
            format!("{}_START_INTEGRATION_ACK", self.cfg.device),
            self.cfg.component.clone(),
            body.ack_id.clone(),
            true,
        );
        ack.job_num = Some(body.job_num.clone());
        ack.session_id = Some(body.session_id.clone());
        ack.image_id = Some(body.image_id.clone());
        self.bus
            .publish(&self.cfg.dmcs_ack_queue, &Message::Ack(ack))
            .await?;
        self.jobs
            .set_job_state(&body.job_num, JobState::JobAccepted)?;
        info!(job = %body.job_num, "job accepted");
        Ok(())
    }

    /// Refuse the job toward the DMCS. Only possible at accept time.
    async fn refuse_job(
        &self,
        body: &StartIntegrationBody,
        reason: &str,
    ) -> Result<(), EngineError> {
        warn!(job = %body.job_num, reason, "refusing job");
        let mut ack = AckBody::new(
            format!("{}_START_INTEGRATION_ACK", self.cfg.device),
            self.cfg.component.clone(),
            body.ack_id.clone(),
            false,
        );
        ack.job_num = Some(body.job_num.clone());
        ack.session_id = Some(body.session_id.clone());
        ack.image_id = Some(body.image_id.clone());
        self.bus
            .publish(&self.cfg.dmcs_ack_queue, &Message::Ack(ack))
            .await?;
        self.jobs
            .set_job_state(&body.job_num, JobState::JobRefused)?;
        Ok(())
    }

    /// Relay end-readout to the current forwarder. Fire-and-forget: the
    /// result set arrives asynchronously in the readout reply.
    async fn process_end_readout(&self, body: ReadoutBody) -> Result<(), EngineError> {
        if self.do_health_check().await?.is_none() {
            self.send_fault(
                codes::ERR_NO_HEALTH_CHECK_RESPONSE,
                "No health check response from ANY fwdr",
                "FORWARDER",
            )
            .await?;
            return Ok(());
        }
        let Some(current) = self.current_fwdr.lock().clone() else {
            return Ok(());
        };

        *self.readout_ctx.lock() = Some(ReadoutContext {
            reply_queue: body.reply_queue.clone(),
            ack_id: body.ack_id.clone(),
            job_num: body.job_num.clone(),
            image_id: body.image_id.clone(),
        });
        self.jobs.set_job_state(&body.job_num, JobState::Readout)?;

        let fwdr_ack_id = self.next_ack_id("FWDR_END_READOUT_ACK")?;
        self.bus
            .publish(
                &current.consume_queue,
                &Message::FwdrEndReadout(
                    self.cfg.device,
                    ReadoutBody {
                        image_id: body.image_id,
                        session_id: body.session_id,
                        job_num: body.job_num,
                        ack_id: fwdr_ack_id,
                        reply_queue: self.cfg.ack_queue.clone(),
                        meta: body.meta,
                    },
                ),
            )
            .await?;
        Ok(())
    }

    /// Finish the readout exchange once the forwarder's reply is in.
    ///
    /// The forwarder's verdict and result set come from the fast-path state
    /// dict, where the ack handler just merged them.
    async fn complete_readout(
        &self,
        ctx: ReadoutContext,
        component: &str,
    ) -> Result<(), EngineError> {
        let (ack_bool, result_set) = {
            let state = self.fwdr_state.lock();
            match state.get(component) {
                Some(s) => (s.ack_bool.unwrap_or(false), s.result_set.clone()),
                None => (false, None),
            }
        };
        let Some(result_set) = result_set.filter(|_| ack_bool) else {
            self.send_readout_ack(&ctx, false, ResultSet::default())
                .await?;
            return Ok(());
        };

        if !self.cfg.use_archive_ctrl {
            // No controller, no receipts
            let results = ResultSet {
                filename_list: result_set.filename_list,
                receipt_list: Vec::new(),
            };
            self.jobs
                .set_job_state(&ctx.job_num, JobState::ReadoutComplete)?;
            self.send_readout_ack(&ctx, true, results).await?;
            return Ok(());
        }

        // Hand the result set to the archive controller for receipts
        self.clear_archive_ack();
        let xferd_ack_id = self.next_ack_id("ITEMS_XFERD_ACK")?;
        self.bus
            .publish(
                &self.cfg.archive_ctrl_queue,
                &Message::ItemsXferd {
                    device: self.cfg.device,
                    ack_id: xferd_ack_id.clone(),
                    reply_queue: self.cfg.ack_queue.clone(),
                    result_set,
                },
            )
            .await?;

        self.coordinator
            .progressive_ack_timer(&xferd_ack_id, 1, ITEMS_XFERD_WAIT)
            .await?;

        let results = {
            let archive = self.archive_ack.lock();
            archive.responsive.then(|| archive.result_set.clone()).flatten()
        };
        match results {
            Some(results) => {
                self.jobs
                    .set_job_state(&ctx.job_num, JobState::ReadoutComplete)?;
                self.send_readout_ack(&ctx, true, results).await
            }
            None => self.send_readout_ack(&ctx, false, ResultSet::default()).await,
        }
    }

    async fn send_readout_ack(
        &self,
        ctx: &ReadoutContext,
        ack_bool: bool,
        results: ResultSet,
    ) -> Result<(), EngineError> {
        let mut ack = AckBody::new(
            format!("{}_READOUT_ACK", self.cfg.device),
            self.cfg.component.clone(),
            ctx.ack_id.clone(),
            ack_bool,
        );
        ack.job_num = Some(ctx.job_num.clone());
        ack.image_id = Some(ctx.image_id.clone());
        ack.result_list = Some(results);
        self.bus
            .publish(&ctx.reply_queue, &Message::Ack(ack))
            .await?;
        Ok(())
    }

    /// Relay header-ready to the current forwarder.
    async fn process_header_ready(&self, body: HeaderReadyBody) -> Result<(), EngineError> {
        if self.do_health_check().await?.is_none() {
            self.send_fault(
                codes::ERR_NO_HEALTH_CHECK_RESPONSE,
                "No health check response from ANY fwdr",
                "FORWARDER",
            )
            .await?;
            return Ok(());
        }
        let Some(current) = self.current_fwdr.lock().clone() else {
            return Ok(());
        };

        let hr_ack_id = self.next_ack_id("FWDR_HEADER_READY_ACK")?;
        self.bus
            .publish(
                &current.consume_queue,
                &Message::FwdrHeaderReady(
                    self.cfg.device,
                    HeaderReadyBody {
                        filename: body.filename,
                        image_id: body.image_id,
                        ack_id: hr_ack_id,
                        reply_queue: self.cfg.ack_queue.clone(),
                    },
                ),
            )
            .await?;
        Ok(())
    }

    async fn ack_new_session(
        &self,
        ack_id: AckId,
        reply_queue: &str,
    ) -> Result<(), EngineError> {
        let ack = AckBody::new(
            format!("{}_NEW_SESSION_ACK", self.cfg.device),
            self.cfg.component.clone(),
            ack_id,
            true,
        );
        self.bus.publish(reply_queue, &Message::Ack(ack)).await?;
        Ok(())
    }

    fn note_readout_reply(&self, body: &AckBody) {
        let mut state = self.fwdr_state.lock();
        let entry = state.entry(body.component.clone()).or_default();
        entry.response = FwdrResponse::Responsive;
        entry.ack_bool = Some(body.ack_bool);
        entry.result_set = body.result_set.clone();
    }

    fn set_fwdr_response(&self, component: &str, response: FwdrResponse) {
        let mut state = self.fwdr_state.lock();
        state.entry(component.to_string()).or_default().response = response;
    }

    fn clear_fwdr_state(&self) {
        let mut state = self.fwdr_state.lock();
        for status in state.values_mut() {
            *status = FwdrStatus::default();
        }
    }

    fn clear_archive_ack(&self) {
        *self.archive_ack.lock() = ArchiveAck::default();
    }

    fn next_ack_id(&self, suffix: &str) -> Result<AckId, EngineError> {
        Ok(self.sequences.next_ack_id(
            &format!("{}_{suffix}", self.cfg.device),
            self.clock.now_utc(),
        )?)
    }

    async fn send_fault(
        &self,
        error_code: u32,
        description: &str,
        component: &str,
    ) -> Result<(), EngineError> {
        warn!(code = error_code, component, "{description}");
        self.bus
            .publish(
                &self.cfg.fault_queue,
                &Message::Fault(FaultRecord {
                    component: component.to_string(),
                    device: self.cfg.device,
                    fault_type: FaultType::Fault,
                    error_code,
                    description: description.to_string(),
                }),
            )
            .await?;
        Ok(())
    }

    async fn send_telemetry(&self, status_code: u32, description: &str) -> Result<(), EngineError> {
        self.bus
            .publish(
                &self.cfg.telemetry_queue,
                &Message::Telemetry {
                    device: self.cfg.device,
                    status_code,
                    description: description.to_string(),
                },
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "foreman_tests.rs"]
mod tests;
