// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-level orchestrator instance guard.
//!
//! Two orchestrators of the same type must not coexist in one process. The
//! registry is explicit rather than an import side effect; the guard frees
//! its slot on drop.

use crate::error::EngineError;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::OnceLock;

static REGISTRY: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();

fn registry() -> &'static Mutex<HashSet<String>> {
    REGISTRY.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Holds one orchestrator type's slot for the life of the orchestrator.
#[derive(Debug)]
pub struct InstanceGuard {
    kind: String,
}

impl InstanceGuard {
    /// Claim the slot for `kind`, failing if it is already held.
    pub fn acquire(kind: &str) -> Result<Self, EngineError> {
        let mut held = registry().lock();
        if !held.insert(kind.to_string()) {
            return Err(EngineError::DuplicateOrchestrator(kind.to_string()));
        }
        Ok(Self {
            kind: kind.to_string(),
        })
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        registry().lock().remove(&self.kind);
    }
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
