// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backlog scoreboard: failed CCDs parked for later recovery.

use crate::backend::{StoreError, StoreHandle};
use dmcs_core::job::JobNum;
use serde::{Deserialize, Serialize};

const BACKLOG_JOBS: &str = "BACKLOG_JOBS";
const CCDS: &str = "CCDS";

/// One backlog entry: the CCDs a job failed to transfer, plus enough context
/// to retry them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct BacklogEntry {
    pub job_num: JobNum,
    pub ccds: Vec<String>,
    pub image_id: String,
}

#[derive(Clone)]
pub struct BacklogScoreboard {
    store: StoreHandle,
}

impl BacklogScoreboard {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// Park the failed CCDs of a job.
    pub fn add_ccds_by_job(
        &self,
        job_num: &JobNum,
        ccds: Vec<String>,
        image_id: &str,
    ) -> Result<(), StoreError> {
        let entry = BacklogEntry {
            job_num: job_num.clone(),
            ccds,
            image_id: image_id.to_string(),
        };
        let encoded = serde_yaml::to_string(&entry)?;
        let key = backlog_key(job_num);
        self.store.run(|b| b.hset(&key, CCDS, &encoded))?;
        self.store.run(|b| b.rpush(BACKLOG_JOBS, job_num.as_str()))
    }

    /// Jobs with parked CCDs, oldest first.
    pub fn jobs(&self) -> Result<Vec<JobNum>, StoreError> {
        Ok(self
            .store
            .run(|b| b.lrange(BACKLOG_JOBS))?
            .into_iter()
            .map(JobNum::new)
            .collect())
    }

    pub fn entry(&self, job_num: &JobNum) -> Result<Option<BacklogEntry>, StoreError> {
        match self.store.run(|b| b.hget(&backlog_key(job_num), CCDS))? {
            None => Ok(None),
            Some(raw) => Ok(Some(serde_yaml::from_str(&raw)?)),
        }
    }

    /// Number of jobs with parked work.
    pub fn len(&self) -> Result<usize, StoreError> {
        self.store.run(|b| b.llen(BACKLOG_JOBS))
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Hand out the next backlog item to drain.
    ///
    /// The draining policy belongs to operator tooling; the core only records
    /// entries, so this always yields `None`.
    pub fn next_backlog_item(&self) -> Result<Option<BacklogEntry>, StoreError> {
        Ok(None)
    }
}

fn backlog_key(job_num: &JobNum) -> String {
    format!("BACKLOG_{job_num}")
}

#[cfg(test)]
#[path = "backlog_tests.rs"]
mod tests;
