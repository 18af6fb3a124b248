// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory bus for tests.
//!
//! Publishes are recorded per queue and forwarded to any subscribers, so a
//! test can both assert on outbound traffic and play the other side of a
//! conversation (forwarder, archive controller, OCS bridge).

use crate::{MessageBus, TransportError};
use async_trait::async_trait;
use dmcs_core::message::Message;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::mpsc;

#[derive(Default)]
struct QueueState {
    log: Vec<Message>,
    subs: Vec<mpsc::UnboundedSender<Message>>,
}

/// Recording in-memory bus.
#[derive(Default)]
pub struct FakeBus {
    queues: Mutex<HashMap<String, QueueState>>,
}

impl FakeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published to `queue`, in order.
    pub fn sent(&self, queue: &str) -> Vec<Message> {
        self.queues
            .lock()
            .get(queue)
            .map(|q| q.log.clone())
            .unwrap_or_default()
    }

    /// Messages of `queue` whose wire tag equals `msg_type`.
    pub fn sent_of_type(&self, queue: &str, msg_type: &str) -> Vec<Message> {
        self.sent(queue)
            .into_iter()
            .filter(|m| m.msg_type() == msg_type)
            .collect()
    }

    /// Subscribe to future publishes on `queue`.
    pub fn subscribe(&self, queue: &str) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.queues
            .lock()
            .entry(queue.to_string())
            .or_default()
            .subs
            .push(tx);
        rx
    }

    /// Drop the recorded log for `queue`.
    pub fn clear(&self, queue: &str) {
        if let Some(q) = self.queues.lock().get_mut(queue) {
            q.log.clear();
        }
    }
}

#[async_trait]
impl MessageBus for FakeBus {
    async fn publish(&self, queue: &str, msg: &Message) -> Result<(), TransportError> {
        let mut queues = self.queues.lock();
        let state = queues.entry(queue.to_string()).or_default();
        state.log.push(msg.clone());
        state.subs.retain(|tx| tx.send(msg.clone()).is_ok());
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
