// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job scoreboard: one hash row per job.
//!
//! The full record rides in one serialized field; `STATE` and `STATUS` are
//! mirrored as plain fields for cheap queries. Multi-step updates are
//! read-modify-write and not transactional; all writers funnel through the
//! owning consumer task.

use crate::backend::{StoreError, StoreHandle};
use dmcs_core::job::{Job, JobNum, JobState, JobStatus, ResultSet};

const RECORD: &str = "RECORD";
const STATE: &str = "STATE";
const STATUS: &str = "STATUS";

#[derive(Clone)]
pub struct JobScoreboard {
    store: StoreHandle,
}

impl JobScoreboard {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// Insert or replace a job record.
    pub fn put_job(&self, job: &Job) -> Result<(), StoreError> {
        let encoded = serde_yaml::to_string(job)?;
        let key = job.num.as_str();
        self.store.run(|b| b.hset(key, RECORD, &encoded))?;
        self.store
            .run(|b| b.hset(key, STATE, job.state.as_str()))?;
        let status = serde_yaml::to_string(&job.status)?;
        self.store
            .run(|b| b.hset(key, STATUS, status.trim()))
    }

    pub fn job(&self, num: &JobNum) -> Result<Option<Job>, StoreError> {
        match self.store.run(|b| b.hget(num.as_str(), RECORD))? {
            None => Ok(None),
            Some(raw) => Ok(Some(serde_yaml::from_str(&raw)?)),
        }
    }

    /// Update the lifecycle state of a job. Unknown jobs are ignored.
    pub fn set_job_state(&self, num: &JobNum, state: JobState) -> Result<(), StoreError> {
        let Some(mut job) = self.job(num)? else {
            return Ok(());
        };
        job.state = state;
        if state.is_terminal() {
            job.status = match state {
                JobState::Complete => JobStatus::Complete,
                _ => JobStatus::Inactive,
            };
        }
        self.put_job(&job)
    }

    pub fn job_state(&self, num: &JobNum) -> Result<Option<JobState>, StoreError> {
        Ok(self.job(num)?.map(|j| j.state))
    }

    pub fn set_target_dir(&self, num: &JobNum, dir: &str) -> Result<(), StoreError> {
        let Some(mut job) = self.job(num)? else {
            return Ok(());
        };
        job.target_dir = Some(dir.to_string());
        self.put_job(&job)
    }

    /// Record the per-forwarder work schedule chosen for this job.
    pub fn set_schedule(
        &self,
        num: &JobNum,
        schedule: Vec<dmcs_core::work::WorkAssignment>,
    ) -> Result<(), StoreError> {
        let Some(mut job) = self.job(num)? else {
            return Ok(());
        };
        job.schedule = schedule;
        self.put_job(&job)
    }

    pub fn set_results(&self, num: &JobNum, results: &ResultSet) -> Result<(), StoreError> {
        let Some(mut job) = self.job(num)? else {
            return Ok(());
        };
        job.results = results.clone();
        self.put_job(&job)
    }
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
