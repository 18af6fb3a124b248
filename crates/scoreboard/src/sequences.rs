// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sequence scoreboard: the monotonic generators.
//!
//! Counters persist through the snapshot; the restart bump tolerates losing
//! the last few increments when the process dies between snapshots.

use crate::backend::{StoreError, StoreHandle};
use chrono::{DateTime, Utc};
use dmcs_core::ack::AckId;
use dmcs_core::job::JobNum;
use dmcs_core::session::SessionId;

const SESSION_SEQUENCE_NUM: &str = "SESSION_SEQUENCE_NUM";
const JOB_SEQUENCE_NUM: &str = "JOB_SEQUENCE_NUM";
const ACK_SEQUENCE_NUM: &str = "ACK_SEQUENCE_NUM";
const RECEIPT_SEQUENCE_NUM: &str = "RECEIPT_SEQUENCE_NUM";

/// Margin added to every counter at startup, in case the snapshot missed
/// trailing increments.
const RESTART_SKIP: u64 = 10;

#[derive(Clone)]
pub struct SequenceScoreboard {
    store: StoreHandle,
}

impl SequenceScoreboard {
    /// Open the sequence store, seeding any absent counter.
    ///
    /// Seeds: session 100, job 1000 + `weekday` (1–7), ack 1, receipt 100.
    pub fn open(store: StoreHandle, weekday: u64) -> Result<Self, StoreError> {
        let this = Self { store };
        this.seed_if_absent(SESSION_SEQUENCE_NUM, 100)?;
        this.seed_if_absent(JOB_SEQUENCE_NUM, 1000 + weekday)?;
        this.seed_if_absent(ACK_SEQUENCE_NUM, 1)?;
        this.seed_if_absent(RECEIPT_SEQUENCE_NUM, 100)?;
        Ok(this)
    }

    fn seed_if_absent(&self, key: &str, seed: u64) -> Result<(), StoreError> {
        if !self.store.run(|b| b.exists(key))? {
            let v = seed.to_string();
            self.store.run(|b| b.set(key, &v))?;
        }
        Ok(())
    }

    /// Bump every counter by the restart margin. Called once per startup.
    pub fn bump_for_restart(&self) -> Result<(), StoreError> {
        for key in [
            SESSION_SEQUENCE_NUM,
            JOB_SEQUENCE_NUM,
            ACK_SEQUENCE_NUM,
            RECEIPT_SEQUENCE_NUM,
        ] {
            let current = self.read(key)?;
            let bumped = (current + RESTART_SKIP).to_string();
            self.store.run(|b| b.set(key, &bumped))?;
        }
        Ok(())
    }

    fn read(&self, key: &str) -> Result<u64, StoreError> {
        Ok(self
            .store
            .run(|b| b.get(key))?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0))
    }

    pub fn next_session_id(&self) -> Result<SessionId, StoreError> {
        let n = self.store.run(|b| b.incr(SESSION_SEQUENCE_NUM))?;
        Ok(SessionId::from_seq(n))
    }

    pub fn next_job_num(&self, session: &SessionId) -> Result<JobNum, StoreError> {
        let n = self.store.run(|b| b.incr(JOB_SEQUENCE_NUM))?;
        Ok(JobNum::from_seq(session, n))
    }

    /// Draw the next ack id with a human-readable `kind` prefix.
    pub fn next_ack_id(&self, kind: &str, now: DateTime<Utc>) -> Result<AckId, StoreError> {
        let n = self.store.run(|b| b.incr(ACK_SEQUENCE_NUM))?;
        Ok(AckId::compose(kind, now, n))
    }

    pub fn next_receipt_id(&self) -> Result<String, StoreError> {
        let n = self.store.run(|b| b.incr(RECEIPT_SEQUENCE_NUM))?;
        Ok(format!("Receipt_{n}"))
    }
}

#[cfg(test)]
#[path = "sequences_tests.rs"]
mod tests;
