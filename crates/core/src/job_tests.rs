// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::session::SessionId;

#[test]
fn job_num_composes_from_session() {
    let session = SessionId::from_seq(101);
    let num = JobNum::from_seq(&session, 1003);
    assert_eq!(num.as_str(), "Session_101_1003");
}

#[test]
fn terminal_states() {
    assert!(JobState::Complete.is_terminal());
    assert!(JobState::Scrubbed.is_terminal());
    assert!(JobState::JobRefused.is_terminal());
    assert!(!JobState::JobAccepted.is_terminal());
    assert!(!JobState::New.is_terminal());
}

#[test]
fn new_job_starts_active() {
    let job = Job::new(
        JobNum::new("Session_100_1001"),
        Device::AuxTel,
        "IMG_100",
        vec!["raft01".into()],
        vec![vec!["ccd00".into()]],
    );
    assert_eq!(job.state, JobState::New);
    assert!(matches!(job.status, JobStatus::Active));
    assert!(job.results.is_empty());
    assert!(job.schedule.is_empty());
}

#[test]
fn job_state_wire_names() {
    assert_eq!(JobState::ArNewItemQuery.as_str(), "AR_NEW_ITEM_QUERY");
    assert_eq!(JobState::XferParamsSent.as_str(), "XFER_PARAMS_SENT");
    let yaml = serde_yaml::to_string(&JobState::JobAccepted).unwrap();
    assert_eq!(yaml.trim(), "JOB_ACCEPTED");
}
