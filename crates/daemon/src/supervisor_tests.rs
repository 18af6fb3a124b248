// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

fn forever() -> JoinHandle<()> {
    tokio::spawn(async {
        loop {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
    })
}

#[tokio::test(start_paused = true)]
async fn dead_tasks_are_respawned() {
    let mut supervisor = Supervisor::new();
    let spawns = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&spawns);
    supervisor.register(
        "short-lived",
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            // Dies immediately; the watcher should bring it back
            vec![tokio::spawn(async {})]
        }),
    );
    assert_eq!(spawns.load(Ordering::SeqCst), 1);

    tokio::select! {
        _ = supervisor.watch() => {}
        _ = tokio::time::sleep(Duration::from_millis(3500)) => {}
    }
    assert!(spawns.load(Ordering::SeqCst) >= 2, "task was not respawned");
}

#[tokio::test(start_paused = true)]
async fn a_dead_member_respawns_the_whole_group() {
    let mut supervisor = Supervisor::new();
    let spawns = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&spawns);
    supervisor.register(
        "pair",
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            // One member dies at once, its partner would run forever; the
            // watcher must replace both together
            vec![tokio::spawn(async {}), forever()]
        }),
    );

    tokio::select! {
        _ = supervisor.watch() => {}
        _ = tokio::time::sleep(Duration::from_millis(2500)) => {}
    }
    assert!(spawns.load(Ordering::SeqCst) >= 2, "group was not respawned");

    supervisor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_respawning_and_joins() {
    let mut supervisor = Supervisor::new();
    let spawns = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&spawns);
    supervisor.register(
        "looping",
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            vec![forever()]
        }),
    );

    supervisor.shutdown().await;
    let after = spawns.load(Ordering::SeqCst);

    // Nothing left running and nothing new was spawned
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(spawns.load(Ordering::SeqCst), after);
}

#[tokio::test(start_paused = true)]
async fn one_shot_tasks_are_not_respawned() {
    let mut supervisor = Supervisor::new();
    supervisor.register_once("one-shot", tokio::spawn(async {}));

    tokio::select! {
        _ = supervisor.watch() => {}
        _ = tokio::time::sleep(Duration::from_millis(2500)) => {}
    }
    // The watcher kept running without panicking; shutdown joins cleanly
    supervisor.shutdown().await;
}
