// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The bus message model.
//!
//! Wire bodies are YAML maps keyed by upper-snake-case strings with a
//! `MSG_TYPE` tag. The free-form maps of the protocol are modeled as a closed
//! set of tagged variants; the [`crate::wire`] codec maps between the two,
//! including the device-prefixed tags (`AT_FWDR_HEALTH_CHECK`,
//! `NEW_AT_ARCHIVE_ITEM`) and the `<CMD>_ACK` family.

use crate::ack::AckId;
use crate::command::OcsCommand;
use crate::device::{Device, DeviceState};
use crate::fault::FaultRecord;
use crate::job::{JobNum, ResultSet};
use crate::session::SessionId;
use crate::visit::VisitId;
use serde::{Deserialize, Serialize};

/// Boresight pointing carried with a visit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct BoreSight {
    pub ra: f64,
    pub dec: f64,
    pub angle: f64,
}

/// Optional image-sequence bookkeeping on exposure traffic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ImageMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_sequence_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images_in_sequence: Option<u32>,
}

/// Body of an OCS lifecycle command. The command itself rides in `MSG_TYPE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct CommandBody {
    pub device: Device,
    pub ack_id: AckId,
    pub cmd_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cfg_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_yaml::Value>,
}

/// Reply to an OCS command, published as `<CMD>_ACK`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct CommandAck {
    pub device: Device,
    pub ack_id: AckId,
    pub cmd_id: u64,
    pub ack_bool: bool,
    pub ack_statement: String,
    /// Negative rejection code (−324 same-state, −320 unreachable).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_code: Option<i32>,
}

/// OCS-visible state events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "MSG_TYPE", rename_all_fields = "SCREAMING_SNAKE_CASE")]
pub enum StateEvent {
    #[serde(rename = "SUMMARY_STATE_EVENT")]
    SummaryState {
        device: Device,
        current_state: DeviceState,
    },
    #[serde(rename = "SETTINGS_APPLIED_EVENT")]
    SettingsApplied {
        device: Device,
        applied: bool,
        settings: String,
        ts_xml_version: String,
        ts_sal_version: String,
        l1_dm_repo_tag: String,
    },
    #[serde(rename = "APPLIED_SETTINGS_MATCH_START_EVENT")]
    AppliedSettingsMatchStart { device: Device, applied: bool },
    #[serde(rename = "RECOMMENDED_SETTINGS_VERSION_EVENT")]
    RecommendedSettingsVersion { device: Device, cfg_key: String },
    #[serde(rename = "ERROR_CODE_EVENT")]
    ErrorCode { device: Device, error_code: u32 },
}

/// Camera/OCS exposure events arriving on the OCS queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "MSG_TYPE", rename_all_fields = "SCREAMING_SNAKE_CASE")]
pub enum ExposureEvent {
    #[serde(rename = "START_INTEGRATION")]
    StartIntegration {
        image_id: String,
        #[serde(flatten)]
        meta: ImageMeta,
    },
    #[serde(rename = "END_READOUT")]
    EndReadout {
        image_id: String,
        #[serde(flatten)]
        meta: ImageMeta,
    },
    #[serde(rename = "HEADER_READY")]
    HeaderReady { filename: String, image_id: String },
    #[serde(rename = "NEXT_VISIT")]
    NextVisit {
        visit_id: VisitId,
        bore_sight: BoreSight,
    },
}

/// DMCS → device start-integration dispatch (`<DEV>_START_INTEGRATION`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct StartIntegrationBody {
    pub image_id: String,
    pub session_id: SessionId,
    pub job_num: JobNum,
    pub ack_id: AckId,
    pub reply_queue: String,
    pub raft_list: Vec<String>,
    pub raft_ccd_list: Vec<Vec<String>>,
    #[serde(flatten)]
    pub meta: ImageMeta,
}

/// Readout relay body, shared by `<DEV>_END_READOUT` (DMCS → device) and
/// `<DEV>_FWDR_END_READOUT` (device → forwarder).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ReadoutBody {
    pub image_id: String,
    pub session_id: SessionId,
    pub job_num: JobNum,
    pub ack_id: AckId,
    pub reply_queue: String,
    #[serde(flatten)]
    pub meta: ImageMeta,
}

/// Header-ready relay body, shared by `<DEV>_HEADER_READY` and
/// `<DEV>_FWDR_HEADER_READY`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct HeaderReadyBody {
    pub filename: String,
    pub image_id: String,
    pub ack_id: AckId,
    pub reply_queue: String,
}

/// Transfer parameters pushed to a forwarder (`<DEV>_FWDR_XFER_PARAMS`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct XferParamsBody {
    pub session_id: SessionId,
    pub image_id: String,
    pub device: Device,
    pub job_num: JobNum,
    pub ack_id: AckId,
    pub reply_queue: String,
    /// `login@ip:dir` for the staging destination.
    pub target_location: String,
    pub xfer_params: XferParams,
}

/// The work slice inside an xfer-params message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct XferParams {
    pub raft_list: Vec<String>,
    pub raft_ccd_list: Vec<Vec<String>>,
    /// Fully-qualified name of the assigned forwarder.
    pub at_fwdr: String,
}

/// Generic correlated reply. `kind` is the full wire `MSG_TYPE`
/// (e.g. `AT_FWDR_END_READOUT_ACK`); the optional fields cover every ack
/// family on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AckBody {
    #[serde(skip)]
    pub kind: String,
    pub component: String,
    pub ack_id: AckId,
    pub ack_bool: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_num: Option<JobNum>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    /// Allocated directory, on `NEW_<DEV>_ARCHIVE_ITEM_ACK`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_dir: Option<String>,
    /// Filenames/receipts, on readout and items-xferd acks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_set: Option<ResultSet>,
    /// Collated filenames/receipts on the final `<DEV>_READOUT_ACK`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_list: Option<ResultSet>,
}

impl AckBody {
    /// Minimal positive/negative reply for `ack_id` from `component`.
    pub fn new(kind: impl Into<String>, component: impl Into<String>, ack_id: AckId, ack_bool: bool) -> Self {
        Self {
            kind: kind.into(),
            component: component.into(),
            ack_id,
            ack_bool,
            job_num: None,
            session_id: None,
            image_id: None,
            target_dir: None,
            result_set: None,
            result_list: None,
        }
    }
}

/// Every message the core sends or receives.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// OCS lifecycle command (`MSG_TYPE` = the command name).
    Command(OcsCommand, CommandBody),
    /// Reply to an OCS command (`<CMD>_ACK`).
    CommandAck(OcsCommand, CommandAck),
    /// OCS-visible state event.
    StateEvent(StateEvent),
    /// Camera/OCS exposure event.
    ExposureEvent(ExposureEvent),
    /// `<DEV>_NEW_SESSION` fan-out.
    NewSession {
        device: Device,
        session_id: SessionId,
        ack_id: AckId,
        reply_queue: String,
    },
    /// `<DEV>_START_INTEGRATION` dispatch.
    DeviceStartIntegration(Device, StartIntegrationBody),
    /// `<DEV>_END_READOUT` relay.
    DeviceEndReadout(Device, ReadoutBody),
    /// `<DEV>_HEADER_READY` relay.
    DeviceHeaderReady(Device, HeaderReadyBody),
    /// `<DEV>_FWDR_HEALTH_CHECK` probe.
    FwdrHealthCheck {
        device: Device,
        ack_id: AckId,
        reply_queue: String,
    },
    /// `<DEV>_FWDR_XFER_PARAMS`.
    FwdrXferParams(Device, XferParamsBody),
    /// `<DEV>_FWDR_END_READOUT`.
    FwdrEndReadout(Device, ReadoutBody),
    /// `<DEV>_FWDR_HEADER_READY`.
    FwdrHeaderReady(Device, HeaderReadyBody),
    /// `NEW_<DEV>_ARCHIVE_ITEM` directory query.
    NewArchiveItem {
        device: Device,
        ack_id: AckId,
        job_num: JobNum,
        session_id: SessionId,
        image_id: String,
        reply_queue: String,
    },
    /// `<DEV>_ITEMS_XFERD` hand-off to the archive controller.
    ItemsXferd {
        device: Device,
        ack_id: AckId,
        reply_queue: String,
        result_set: ResultSet,
    },
    /// Any `*_ACK` reply that is not a command ack.
    Ack(AckBody),
    /// Deadline registration for a fire-and-forget request.
    PendingAck { ack_id: AckId, expiry_epoch_ms: u64 },
    /// General-queue request for a fresh ack id.
    RequestAckId,
    /// Reply to [`Message::RequestAckId`].
    ResponseAckId { ack_id_value: String },
    /// Fault report.
    Fault(FaultRecord),
    /// Telemetry datum for the telemetry sink.
    Telemetry {
        device: Device,
        status_code: u32,
        description: String,
    },
}

impl Message {
    /// The wire `MSG_TYPE` this message serializes under.
    pub fn msg_type(&self) -> String {
        crate::wire::msg_type_of(self)
    }

    /// The correlation ack id, for messages that carry one.
    pub fn ack_id(&self) -> Option<&AckId> {
        match self {
            Message::Command(_, b) => Some(&b.ack_id),
            Message::CommandAck(_, b) => Some(&b.ack_id),
            Message::NewSession { ack_id, .. } => Some(ack_id),
            Message::DeviceStartIntegration(_, b) => Some(&b.ack_id),
            Message::DeviceEndReadout(_, b) | Message::FwdrEndReadout(_, b) => Some(&b.ack_id),
            Message::DeviceHeaderReady(_, b) | Message::FwdrHeaderReady(_, b) => Some(&b.ack_id),
            Message::FwdrHealthCheck { ack_id, .. } => Some(ack_id),
            Message::FwdrXferParams(_, b) => Some(&b.ack_id),
            Message::NewArchiveItem { ack_id, .. } => Some(ack_id),
            Message::ItemsXferd { ack_id, .. } => Some(ack_id),
            Message::Ack(b) => Some(&b.ack_id),
            Message::PendingAck { ack_id, .. } => Some(ack_id),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
