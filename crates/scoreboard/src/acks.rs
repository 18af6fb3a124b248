// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ack scoreboard: fan-in reply collection and pending-ack deadlines.
//!
//! Each ack id is a hash row; fields are component names, values the
//! serialized reply bodies. A row's lifetime runs from the first reply until
//! the waiting step times out and clears it, or the sweeper resolves it.

use crate::backend::{StoreError, StoreHandle};
use dmcs_core::ack::AckId;
use dmcs_core::message::{AckBody, Message};
use dmcs_core::wire;
use std::collections::BTreeMap;

const PENDING_ACKS: &str = "PENDING_ACKS";
const MISSING_NONBLOCK_ACKS: &str = "MISSING_NONBLOCK_ACKS";

/// Outcome of one pending-ack sweep.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Pending ids whose replies arrived.
    pub resolved: Vec<AckId>,
    /// Pending ids whose deadline passed with no reply.
    pub missing: Vec<AckId>,
}

#[derive(Clone)]
pub struct AckScoreboard {
    store: StoreHandle,
}

impl AckScoreboard {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// File a reply under its ack id, keyed by the replying component.
    ///
    /// The full wire form is stored so the reply's `MSG_TYPE` survives the
    /// round trip through the store.
    pub fn add_timed_ack(&self, body: &AckBody) -> Result<(), StoreError> {
        let encoded = wire::encode(&Message::Ack(body.clone()))?;
        self.store
            .run(|b| b.hset(body.ack_id.as_str(), &body.component, &encoded))
    }

    /// Components that have replied for `ack_id`, or `None` when no reply
    /// has arrived yet.
    pub fn components_for(
        &self,
        ack_id: &AckId,
    ) -> Result<Option<BTreeMap<String, AckBody>>, StoreError> {
        let Some(raw) = self.store.run(|b| b.hgetall(ack_id.as_str()))? else {
            return Ok(None);
        };
        let mut out = BTreeMap::new();
        for (component, encoded) in raw {
            match wire::decode(encoded.as_bytes())? {
                Message::Ack(body) => {
                    out.insert(component, body);
                }
                other => {
                    tracing::warn!(
                        ack_id = %ack_id,
                        msg_type = %other.msg_type(),
                        "non-ack record in ack row, skipping"
                    );
                }
            }
        }
        Ok(Some(out))
    }

    /// Drop a fan-in row after its waiting step has consumed (or abandoned) it.
    pub fn clear(&self, ack_id: &AckId) -> Result<(), StoreError> {
        self.store.run(|b| b.del(ack_id.as_str()))
    }

    /// Register a deadline for a fire-and-forget request.
    pub fn add_pending(&self, ack_id: &AckId, deadline_epoch_ms: u64) -> Result<(), StoreError> {
        let deadline = deadline_epoch_ms.to_string();
        self.store
            .run(|b| b.hset(PENDING_ACKS, ack_id.as_str(), &deadline))
    }

    /// One sweep over the pending map.
    ///
    /// Ids with a reply row are resolved and dropped. Ids past their deadline
    /// with no reply are pushed onto the missing list and dropped. Everything
    /// else stays for the next sweep.
    pub fn resolve_pending(&self, now_epoch_ms: u64) -> Result<SweepOutcome, StoreError> {
        let mut outcome = SweepOutcome::default();
        let pending = self.store.run(|b| b.hkeys(PENDING_ACKS))?;
        for id in pending {
            if self.store.run(|b| b.exists(&id))? {
                self.store.run(|b| b.hdel(PENDING_ACKS, &id))?;
                outcome.resolved.push(AckId::new(id));
                continue;
            }
            let deadline: u64 = self
                .store
                .run(|b| b.hget(PENDING_ACKS, &id))?
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            if now_epoch_ms > deadline {
                self.store.run(|b| b.lpush(MISSING_NONBLOCK_ACKS, &id))?;
                self.store.run(|b| b.hdel(PENDING_ACKS, &id))?;
                outcome.missing.push(AckId::new(id));
            }
        }
        Ok(outcome)
    }

    /// Ack ids currently on the missing list, newest first.
    pub fn missing_acks(&self) -> Result<Vec<AckId>, StoreError> {
        Ok(self
            .store
            .run(|b| b.lrange(MISSING_NONBLOCK_ACKS))?
            .into_iter()
            .map(AckId::new)
            .collect())
    }

    /// Pop one missing ack id for fault classification.
    pub fn pop_missing_ack(&self) -> Result<Option<AckId>, StoreError> {
        Ok(self
            .store
            .run(|b| b.lpop(MISSING_NONBLOCK_ACKS))?
            .map(AckId::new))
    }

    /// Number of ids still awaiting a reply or deadline.
    pub fn pending_len(&self) -> Result<usize, StoreError> {
        Ok(self.store.run(|b| b.hkeys(PENDING_ACKS))?.len())
    }
}

#[cfg(test)]
#[path = "acks_tests.rs"]
mod tests;
