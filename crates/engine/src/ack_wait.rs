// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ack coordination: progressive timers and the pending-ack sweeper.
//!
//! Both primitives are cooperative. A progressive wait sleeps in poll-period
//! slices on the tokio timer, so the consumer task that called it keeps
//! yielding; the sweeper is its own task reading the shared ack store.

use crate::error::EngineError;
use dmcs_core::ack::AckId;
use dmcs_core::clock::Clock;
use dmcs_core::message::AckBody;
use dmcs_scoreboard::AckScoreboard;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::warn;

/// Poll cadence for progressive waits.
pub const POLL_PERIOD: Duration = Duration::from_millis(500);

/// Sweep cadence for pending (non-blocking) acks.
pub const SWEEP_PERIOD: Duration = Duration::from_secs(1);

/// Correlates outgoing request ids with incoming replies.
#[derive(Clone)]
pub struct AckCoordinator<C: Clock> {
    acks: AckScoreboard,
    clock: C,
}

impl<C: Clock> AckCoordinator<C> {
    pub fn new(acks: AckScoreboard, clock: C) -> Self {
        Self { acks, clock }
    }

    pub fn acks(&self) -> &AckScoreboard {
        &self.acks
    }

    /// Wait up to `window` for `expected` replies to `ack_id`.
    ///
    /// Polls the ack store every [`POLL_PERIOD`] and returns the reply map as
    /// soon as the quorum is in, so a full house beats the window. At expiry
    /// one final read decides: a complete map is returned, anything else is
    /// `None`.
    pub async fn progressive_ack_timer(
        &self,
        ack_id: &AckId,
        expected: usize,
        window: Duration,
    ) -> Result<Option<BTreeMap<String, AckBody>>, EngineError> {
        let deadline = tokio::time::Instant::now() + window;
        loop {
            tokio::time::sleep(POLL_PERIOD).await;
            if let Some(replies) = self.acks.components_for(ack_id)? {
                if replies.len() == expected {
                    return Ok(Some(replies));
                }
            }
            if tokio::time::Instant::now() >= deadline {
                break;
            }
        }

        // One final look before giving up
        match self.acks.components_for(ack_id)? {
            Some(replies) if replies.len() == expected => Ok(Some(replies)),
            _ => Ok(None),
        }
    }

    /// Register a fire-and-forget deadline; the sweeper resolves it later.
    pub fn add_pending(&self, ack_id: &AckId, wait: Duration) -> Result<(), EngineError> {
        let deadline = self.clock.epoch_ms() + wait.as_millis() as u64;
        self.acks.add_pending(ack_id, deadline)?;
        Ok(())
    }

    /// Spawn the periodic sweeper task.
    ///
    /// Every pending id either resolves (its reply arrived) or, past its
    /// deadline, moves to the missing list for fault classification. The
    /// task runs until aborted by the supervisor.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let acks = self.acks.clone();
        let clock = self.clock.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(SWEEP_PERIOD);
            loop {
                tick.tick().await;
                match acks.resolve_pending(clock.epoch_ms()) {
                    Ok(outcome) => {
                        for id in &outcome.missing {
                            warn!(ack_id = %id, "no reply before deadline, recorded as missing");
                        }
                    }
                    Err(e) => warn!(error = %e, "pending-ack sweep failed"),
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "ack_wait_tests.rs"]
mod tests;
