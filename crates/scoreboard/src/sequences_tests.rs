// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::backend::MemoryBackend;
use chrono::TimeZone;
use std::sync::Arc;

fn open(weekday: u64) -> (Arc<MemoryBackend>, SequenceScoreboard) {
    let backend = Arc::new(MemoryBackend::new());
    let board = SequenceScoreboard::open(StoreHandle::new(backend.clone()), weekday).unwrap();
    (backend, board)
}

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 2, 12, 0, 0).single().unwrap()
}

#[test]
fn seeds_on_first_open() {
    let (_, board) = open(4);
    assert_eq!(board.next_session_id().unwrap().as_str(), "Session_101");
    let session = SessionId::new("Session_101");
    assert_eq!(board.next_job_num(&session).unwrap().as_str(), "Session_101_1005");
    assert_eq!(board.next_receipt_id().unwrap(), "Receipt_101");
    let ack = board.next_ack_id("K", now()).unwrap();
    assert_eq!(ack.seq(), Some(2));
}

#[test]
fn counters_survive_reopen_without_reseeding() {
    let (backend, board) = open(1);
    board.next_session_id().unwrap();
    board.next_session_id().unwrap();

    let board2 =
        SequenceScoreboard::open(StoreHandle::new(backend), 1).unwrap();
    assert_eq!(board2.next_session_id().unwrap().as_str(), "Session_103");
}

#[test]
fn restart_bump_skips_ahead() {
    let (_, board) = open(1);
    board.next_session_id().unwrap(); // 101
    board.bump_for_restart().unwrap(); // 111
    assert_eq!(board.next_session_id().unwrap().as_str(), "Session_112");
}

#[test]
fn ack_ids_are_unique_and_ordered() {
    let (_, board) = open(1);
    let a = board.next_ack_id("HEALTH", now()).unwrap();
    let b = board.next_ack_id("HEALTH", now()).unwrap();
    assert_ne!(a, b);
    assert!(a.seq().unwrap() < b.seq().unwrap());
}
