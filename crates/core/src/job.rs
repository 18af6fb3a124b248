// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job records and their lifecycle.

use crate::device::Device;
use crate::session::SessionId;
use crate::visit::VisitId;
use crate::work::WorkAssignment;
use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Job number, rendered as `<session>_<jobseq>`.
    pub struct JobNum;
}

impl JobNum {
    /// Compose from the owning session and the job sequence counter.
    pub fn from_seq(session: &SessionId, seq: u64) -> Self {
        Self(format!("{session}_{seq}"))
    }
}

/// Lifecycle of one exposure job.
///
/// ```text
/// NEW → HEALTH_CHECK → AR_NEW_ITEM_QUERY → AR_NEW_ITEM_RESPONSE
///     → SENDING_XFER_PARAMS → XFER_PARAMS_SENT → JOB_ACCEPTED
///     → READOUT → READOUT_COMPLETE → COMPLETE
/// ```
///
/// `SCRUBBED` is reachable from any state on unrecoverable failure;
/// `JOB_REFUSED` only at accept time. `DISPATCHED` and `HEADER_READY` are
/// DMCS-side markers set while the foreman runs its own steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    New,
    Dispatched,
    HealthCheck,
    ArNewItemQuery,
    ArNewItemResponse,
    SendingXferParams,
    XferParamsSent,
    JobAccepted,
    Readout,
    HeaderReady,
    ReadoutComplete,
    Complete,
    Scrubbed,
    JobRefused,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::New => "NEW",
            JobState::Dispatched => "DISPATCHED",
            JobState::HealthCheck => "HEALTH_CHECK",
            JobState::ArNewItemQuery => "AR_NEW_ITEM_QUERY",
            JobState::ArNewItemResponse => "AR_NEW_ITEM_RESPONSE",
            JobState::SendingXferParams => "SENDING_XFER_PARAMS",
            JobState::XferParamsSent => "XFER_PARAMS_SENT",
            JobState::JobAccepted => "JOB_ACCEPTED",
            JobState::Readout => "READOUT",
            JobState::HeaderReady => "HEADER_READY",
            JobState::ReadoutComplete => "READOUT_COMPLETE",
            JobState::Complete => "COMPLETE",
            JobState::Scrubbed => "SCRUBBED",
            JobState::JobRefused => "JOB_REFUSED",
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Complete | JobState::Scrubbed | JobState::JobRefused
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse activity flag kept alongside the lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Active,
    Complete,
    Inactive,
}

/// Filenames and receipts reported back for a completed readout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ResultSet {
    pub filename_list: Vec<String>,
    pub receipt_list: Vec<String>,
}

impl ResultSet {
    pub fn is_empty(&self) -> bool {
        self.filename_list.is_empty() && self.receipt_list.is_empty()
    }
}

/// One exposure job as persisted in the job scoreboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub num: JobNum,
    pub device: Device,
    pub image_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visit: Option<VisitId>,
    pub raft_list: Vec<String>,
    /// Per-raft ccd sub-lists, positionally matched to `raft_list`.
    pub raft_ccd_list: Vec<Vec<String>>,
    /// Forwarder work schedule, filled once forwarders are assigned.
    #[serde(default)]
    pub schedule: Vec<WorkAssignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_dir: Option<String>,
    #[serde(default)]
    pub results: ResultSet,
    pub state: JobState,
    pub status: JobStatus,
}

impl Job {
    /// Create a freshly dispatched job.
    pub fn new(
        num: JobNum,
        device: Device,
        image_id: impl Into<String>,
        raft_list: Vec<String>,
        raft_ccd_list: Vec<Vec<String>>,
    ) -> Self {
        Self {
            num,
            device,
            image_id: image_id.into(),
            visit: None,
            raft_list,
            raft_ccd_list,
            schedule: Vec::new(),
            target_dir: None,
            results: ResultSet::default(),
            state: JobState::New,
            status: JobStatus::Active,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
