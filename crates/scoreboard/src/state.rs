// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State scoreboard: device state, consume queues, cfg keys, fault history,
//! sessions and visits.

use crate::backend::{StoreError, StoreHandle};
use dmcs_core::fault::FaultRecord;
use dmcs_core::job::JobNum;
use dmcs_core::session::SessionId;
use dmcs_core::visit::{Visit, VisitId};
use dmcs_core::{Device, DeviceState};

const STATE: &str = "STATE";
const CONSUME_QUEUE: &str = "CONSUME_QUEUE";
const CFG_KEY: &str = "CFG_KEY";
const CURRENT_JOB: &str = "CURRENT_JOB";
const CURRENT_SESSION_ID: &str = "CURRENT_SESSION_ID";
const VISIT_LIST: &str = "VISIT_LIST";

#[derive(Clone)]
pub struct StateScoreboard {
    store: StoreHandle,
}

impl StateScoreboard {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// Register a device's consume queue and park it OFFLINE.
    ///
    /// All devices wake up OFFLINE; the OCS walks them up from there.
    pub fn init_device(&self, device: Device, consume_queue: &str) -> Result<(), StoreError> {
        self.store
            .run(|b| b.hset(device.code(), CONSUME_QUEUE, consume_queue))?;
        self.set_device_state(device, DeviceState::Offline)
    }

    pub fn set_device_state(&self, device: Device, state: DeviceState) -> Result<(), StoreError> {
        self.store
            .run(|b| b.hset(device.code(), STATE, state.as_str()))
    }

    pub fn device_state(&self, device: Device) -> Result<Option<DeviceState>, StoreError> {
        let raw = self.store.run(|b| b.hget(device.code(), STATE))?;
        Ok(raw.as_deref().and_then(DeviceState::parse))
    }

    pub fn device_consume_queue(&self, device: Device) -> Result<Option<String>, StoreError> {
        self.store.run(|b| b.hget(device.code(), CONSUME_QUEUE))
    }

    /// Devices currently in `state`, with their consume queues.
    pub fn devices_by_state(
        &self,
        state: DeviceState,
    ) -> Result<Vec<(Device, String)>, StoreError> {
        let mut out = Vec::new();
        for device in Device::ALL {
            if self.device_state(device)? == Some(state) {
                if let Some(queue) = self.device_consume_queue(device)? {
                    out.push((device, queue));
                }
            }
        }
        Ok(out)
    }

    pub fn set_device_cfg_key(&self, device: Device, key: &str) -> Result<(), StoreError> {
        self.store.run(|b| b.hset(device.code(), CFG_KEY, key))
    }

    pub fn device_cfg_key(&self, device: Device) -> Result<Option<String>, StoreError> {
        self.store.run(|b| b.hget(device.code(), CFG_KEY))
    }

    /// Append the ordered allowed cfg keys for a device. Index 0 is the
    /// default key.
    pub fn add_device_cfg_keys(&self, device: Device, keys: &[String]) -> Result<(), StoreError> {
        let list = cfg_list_key(device);
        for key in keys {
            self.store.run(|b| b.rpush(&list, key))?;
        }
        Ok(())
    }

    pub fn cfg_key_at(&self, device: Device, index: usize) -> Result<Option<String>, StoreError> {
        self.store.run(|b| b.lindex(&cfg_list_key(device), index))
    }

    /// True when `key` appears in the device's allowed cfg-key list.
    pub fn cfg_keys_contain(&self, device: Device, key: &str) -> Result<bool, StoreError> {
        let keys = self.store.run(|b| b.lrange(&cfg_list_key(device)))?;
        Ok(keys.iter().any(|k| k == key))
    }

    /// Append a fault record to the device's append-only history.
    pub fn append_fault_history(
        &self,
        device: Device,
        record: &FaultRecord,
    ) -> Result<(), StoreError> {
        let encoded = serde_yaml::to_string(record)?;
        self.store
            .run(|b| b.rpush(&fault_history_key(device), &encoded))
    }

    pub fn fault_history(&self, device: Device) -> Result<Vec<FaultRecord>, StoreError> {
        let raw = self.store.run(|b| b.lrange(&fault_history_key(device)))?;
        let mut out = Vec::with_capacity(raw.len());
        for entry in raw {
            out.push(serde_yaml::from_str(&entry)?);
        }
        Ok(out)
    }

    pub fn set_current_session(&self, session: &SessionId) -> Result<(), StoreError> {
        self.store
            .run(|b| b.set(CURRENT_SESSION_ID, session.as_str()))
    }

    pub fn current_session(&self) -> Result<Option<SessionId>, StoreError> {
        Ok(self
            .store
            .run(|b| b.get(CURRENT_SESSION_ID))?
            .map(SessionId::new))
    }

    /// Bind the configured raft set to a session.
    pub fn set_rafts_for_session(
        &self,
        session: &SessionId,
        rafts: &[String],
    ) -> Result<(), StoreError> {
        let key = format!("{session}_RAFTS");
        let encoded = serde_yaml::to_string(rafts)?;
        self.store.run(|b| b.set(&key, &encoded))
    }

    pub fn rafts_for_session(&self, session: &SessionId) -> Result<Vec<String>, StoreError> {
        let key = format!("{session}_RAFTS");
        match self.store.run(|b| b.get(&key))? {
            None => Ok(Vec::new()),
            Some(raw) => Ok(serde_yaml::from_str(&raw)?),
        }
    }

    /// Push a visit to the head of the visit list; the head is current.
    pub fn push_visit(&self, visit: &Visit) -> Result<(), StoreError> {
        let encoded = serde_yaml::to_string(visit)?;
        self.store.run(|b| b.lpush(VISIT_LIST, &encoded))
    }

    pub fn current_visit(&self) -> Result<Option<Visit>, StoreError> {
        match self.store.run(|b| b.lindex(VISIT_LIST, 0))? {
            None => Ok(None),
            Some(raw) => Ok(Some(serde_yaml::from_str(&raw)?)),
        }
    }

    pub fn current_visit_id(&self) -> Result<Option<VisitId>, StoreError> {
        Ok(self.current_visit()?.map(|v| v.id))
    }

    pub fn set_current_device_job(
        &self,
        device: Device,
        job: &JobNum,
    ) -> Result<(), StoreError> {
        self.store
            .run(|b| b.hset(device.code(), CURRENT_JOB, job.as_str()))
    }

    pub fn current_device_job(&self, device: Device) -> Result<Option<JobNum>, StoreError> {
        Ok(self
            .store
            .run(|b| b.hget(device.code(), CURRENT_JOB))?
            .map(JobNum::new))
    }
}

fn cfg_list_key(device: Device) -> String {
    format!("{}_CFG_KEYS", device.code())
}

fn fault_history_key(device: Device) -> String {
    format!("{}_FAULT_HISTORY", device.code())
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
