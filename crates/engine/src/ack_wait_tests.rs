// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dmcs_core::message::AckBody;
use dmcs_core::FakeClock;
use dmcs_scoreboard::{AckScoreboard, MemoryBackend, StoreHandle};
use std::sync::Arc;
use std::time::Duration;

fn coordinator() -> AckCoordinator<FakeClock> {
    let acks = AckScoreboard::new(StoreHandle::new(Arc::new(MemoryBackend::new())));
    AckCoordinator::new(acks, FakeClock::new(1_000_000))
}

fn reply(component: &str, ack_id: &AckId) -> AckBody {
    AckBody::new("X_ACK", component, ack_id.clone(), true)
}

#[tokio::test(start_paused = true)]
async fn quorum_returns_early() {
    let coord = coordinator();
    let ack_id = AckId::new("a1");

    // Reply lands well before the 10s window closes
    {
        let acks = coord.acks().clone();
        let ack_id = ack_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(700)).await;
            acks.add_timed_ack(&reply("f1", &ack_id)).unwrap();
        });
    }

    let started = tokio::time::Instant::now();
    let replies = coord
        .progressive_ack_timer(&ack_id, 1, Duration::from_secs(10))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(replies.len(), 1);
    // Early return: one poll period past the arrival, not the full window
    let waited = started.elapsed();
    assert!(waited < Duration::from_secs(2), "waited {waited:?}");
}

#[tokio::test(start_paused = true)]
async fn expiry_with_no_replies_is_none() {
    let coord = coordinator();
    let started = tokio::time::Instant::now();
    let replies = coord
        .progressive_ack_timer(&AckId::new("a2"), 1, Duration::from_secs(2))
        .await
        .unwrap();
    assert!(replies.is_none());
    assert!(started.elapsed() >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn partial_quorum_at_expiry_is_none() {
    let coord = coordinator();
    let ack_id = AckId::new("a3");
    coord.acks().add_timed_ack(&reply("f1", &ack_id)).unwrap();

    let replies = coord
        .progressive_ack_timer(&ack_id, 2, Duration::from_secs(2))
        .await
        .unwrap();
    assert!(replies.is_none());
}

#[tokio::test(start_paused = true)]
async fn two_of_two_returns_both() {
    let coord = coordinator();
    let ack_id = AckId::new("a4");
    coord.acks().add_timed_ack(&reply("f1", &ack_id)).unwrap();
    coord.acks().add_timed_ack(&reply("f2", &ack_id)).unwrap();

    let replies = coord
        .progressive_ack_timer(&ack_id, 2, Duration::from_secs(2))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(replies.len(), 2);
    assert!(replies.contains_key("f1") && replies.contains_key("f2"));
}

#[tokio::test(start_paused = true)]
async fn pending_deadline_uses_the_clock() {
    let acks = AckScoreboard::new(StoreHandle::new(Arc::new(MemoryBackend::new())));
    let clock = FakeClock::new(1_000_000);
    let coord = AckCoordinator::new(acks.clone(), clock.clone());

    let ack_id = AckId::new("p1");
    coord
        .add_pending(&ack_id, Duration::from_secs(5))
        .unwrap();

    // Not yet expired
    let outcome = acks.resolve_pending(clock.epoch_ms()).unwrap();
    assert!(outcome.missing.is_empty());

    // Past the deadline it lands on the missing list
    clock.advance(5_001);
    let outcome = acks.resolve_pending(clock.epoch_ms()).unwrap();
    assert_eq!(outcome.missing, vec![ack_id]);
}
