// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::backend::{MemoryBackend, StoreHandle};
use dmcs_core::Device;
use std::sync::Arc;

fn board() -> JobScoreboard {
    JobScoreboard::new(StoreHandle::new(Arc::new(MemoryBackend::new())))
}

fn job(num: &str) -> Job {
    Job::new(
        JobNum::new(num),
        Device::AuxTel,
        "IMG_100",
        vec!["raft01".into()],
        vec![vec!["ccd00".into()]],
    )
}

#[test]
fn put_and_get_round_trip() {
    let board = board();
    let j = job("Session_101_1004");
    board.put_job(&j).unwrap();

    let back = board.job(&j.num).unwrap().unwrap();
    assert_eq!(back.image_id, "IMG_100");
    assert_eq!(back.state, JobState::New);
    assert!(board.job(&JobNum::new("absent")).unwrap().is_none());
}

#[test]
fn state_updates_are_visible() {
    let board = board();
    let j = job("Session_101_1004");
    board.put_job(&j).unwrap();

    board.set_job_state(&j.num, JobState::JobAccepted).unwrap();
    assert_eq!(
        board.job_state(&j.num).unwrap(),
        Some(JobState::JobAccepted)
    );
}

#[test]
fn terminal_states_settle_status() {
    let board = board();
    let j = job("Session_101_1004");
    board.put_job(&j).unwrap();

    board.set_job_state(&j.num, JobState::Complete).unwrap();
    let back = board.job(&j.num).unwrap().unwrap();
    assert!(matches!(back.status, JobStatus::Complete));

    let j2 = job("Session_101_1005");
    board.put_job(&j2).unwrap();
    board.set_job_state(&j2.num, JobState::Scrubbed).unwrap();
    let back = board.job(&j2.num).unwrap().unwrap();
    assert!(matches!(back.status, JobStatus::Inactive));
}

#[test]
fn target_dir_and_results() {
    let board = board();
    let j = job("Session_101_1004");
    board.put_job(&j).unwrap();

    board
        .set_target_dir(&j.num, "/archive/2025-01-02/")
        .unwrap();
    board
        .set_results(
            &j.num,
            &ResultSet {
                filename_list: vec!["a.fits".into()],
                receipt_list: vec!["Receipt_101".into()],
            },
        )
        .unwrap();

    let back = board.job(&j.num).unwrap().unwrap();
    assert_eq!(back.target_dir.as_deref(), Some("/archive/2025-01-02/"));
    assert_eq!(back.results.filename_list, vec!["a.fits".to_string()]);
}

#[test]
fn updates_to_unknown_jobs_are_ignored() {
    let board = board();
    board
        .set_job_state(&JobNum::new("nope"), JobState::Complete)
        .unwrap();
    board.set_target_dir(&JobNum::new("nope"), "/x").unwrap();
}
