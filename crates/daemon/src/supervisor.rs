// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Consumer task supervision.
//!
//! The supervisor owns every long-lived task (consumers, pumps, the
//! pending-ack sweeper, the snapshot flusher). Tasks register as groups: a
//! factory spawns all of a group's members together (a queue's broker
//! consumer plus its pump), so a group can be aborted and respawned as a
//! unit. If any member ends while the shutdown flag is clear, the rest of
//! its group is aborted and the factory is invoked again with the same
//! parameters; shutdown sets the flag, aborts every member, and joins.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// How often task liveness is checked.
const WATCH_PERIOD: Duration = Duration::from_secs(1);

type TaskFactory = Box<dyn Fn() -> Vec<JoinHandle<()>> + Send + Sync>;

struct Watched {
    name: String,
    factory: TaskFactory,
    handles: Vec<JoinHandle<()>>,
    /// One-shot tasks are joined but never respawned.
    respawn: bool,
}

#[derive(Default)]
pub struct Supervisor {
    shutdown: Arc<AtomicBool>,
    tasks: Vec<Watched>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared shutdown flag.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Register a supervised task group; the factory is invoked immediately
    /// and again on every unexpected death of a member.
    pub fn register(&mut self, name: impl Into<String>, factory: TaskFactory) {
        let handles = factory();
        self.tasks.push(Watched {
            name: name.into(),
            factory,
            handles,
            respawn: true,
        });
    }

    /// Register a task that is joined at shutdown but never respawned.
    pub fn register_once(&mut self, name: impl Into<String>, handle: JoinHandle<()>) {
        self.tasks.push(Watched {
            name: name.into(),
            factory: Box::new(|| Vec::new()),
            handles: vec![handle],
            respawn: false,
        });
    }

    /// Watch liveness forever. Intended to run inside the main select loop;
    /// it only returns if the shutdown flag is set by someone else.
    pub async fn watch(&mut self) {
        loop {
            tokio::time::sleep(WATCH_PERIOD).await;
            if self.shutdown.load(Ordering::SeqCst) {
                return;
            }
            for task in &mut self.tasks {
                if task.respawn && task.handles.iter().any(JoinHandle::is_finished) {
                    warn!(task = %task.name, "consumer task died, respawning");
                    // Take the survivors down too so the respawned group
                    // never competes with orphans on the same queue
                    for handle in &task.handles {
                        handle.abort();
                    }
                    task.handles = (task.factory)();
                }
            }
        }
    }

    /// Set the shutdown flag, abort every task, and join them.
    pub async fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        info!("stopping {} supervised task groups", self.tasks.len());
        for task in &self.tasks {
            for handle in &task.handles {
                handle.abort();
            }
        }
        for task in self.tasks.drain(..) {
            for handle in task.handles {
                // Cancelled tasks resolve with a JoinError; that is the point
                let _ = handle.await;
            }
        }
        info!("supervised tasks stopped");
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
