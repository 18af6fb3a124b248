// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The single-key store contract and the embedded backend.
//!
//! The contract is Redis-shaped: string scalars, hashes, lists, and atomic
//! counters, all keyed by string, each operation atomic on its key. The
//! scoreboards never depend on anything beyond this trait, so a networked KV
//! store can replace [`MemoryBackend`] without touching them.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// A single failed backend operation.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("store unreachable")]
    Unreachable,

    #[error("key {key} holds a {found} value, {wanted} operation refused")]
    WrongType {
        key: String,
        found: &'static str,
        wanted: &'static str,
    },

    #[error("counter {key} does not hold an integer")]
    NotACounter { key: String },
}

/// Store-level failure surfaced to callers.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Three consecutive connection checks failed.
    #[error("scoreboard unavailable after {attempts} connection attempts")]
    Unavailable { attempts: u32 },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("value encoding error: {0}")]
    Encode(#[from] serde_yaml::Error),

    #[error("stored wire record error: {0}")]
    Protocol(#[from] dmcs_core::wire::ProtocolError),
}

/// One value cell. Matches the Redis type families the scoreboards use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Cell {
    Scalar(String),
    Hash(BTreeMap<String, String>),
    List(Vec<String>),
}

impl Cell {
    fn type_name(&self) -> &'static str {
        match self {
            Cell::Scalar(_) => "scalar",
            Cell::Hash(_) => "hash",
            Cell::List(_) => "list",
        }
    }
}

/// Atomic single-key operations. Every method is one store command.
pub trait Backend: Send + Sync + 'static {
    /// Liveness probe. Mutating calls go through a connection check first.
    fn ping(&self) -> bool;

    fn set(&self, key: &str, value: &str) -> Result<(), BackendError>;
    fn get(&self, key: &str) -> Result<Option<String>, BackendError>;
    /// Increment an integer scalar, initializing absent keys to 0 first.
    fn incr(&self, key: &str) -> Result<u64, BackendError>;
    fn exists(&self, key: &str) -> Result<bool, BackendError>;
    fn del(&self, key: &str) -> Result<(), BackendError>;

    fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), BackendError>;
    fn hget(&self, key: &str, field: &str) -> Result<Option<String>, BackendError>;
    /// The full hash, or `None` when the key is absent.
    fn hgetall(&self, key: &str) -> Result<Option<BTreeMap<String, String>>, BackendError>;
    fn hkeys(&self, key: &str) -> Result<Vec<String>, BackendError>;
    fn hdel(&self, key: &str, field: &str) -> Result<(), BackendError>;

    fn rpush(&self, key: &str, value: &str) -> Result<(), BackendError>;
    fn lpush(&self, key: &str, value: &str) -> Result<(), BackendError>;
    fn lpop(&self, key: &str) -> Result<Option<String>, BackendError>;
    fn lindex(&self, key: &str, index: usize) -> Result<Option<String>, BackendError>;
    fn lrange(&self, key: &str) -> Result<Vec<String>, BackendError>;
    fn llen(&self, key: &str) -> Result<usize, BackendError>;
}

/// Shared backend handle with the three-attempt connection check every
/// scoreboard applies before touching the store.
#[derive(Clone)]
pub struct StoreHandle {
    backend: Arc<dyn Backend>,
}

/// Connection attempts made before declaring the store unavailable.
const CONNECT_ATTEMPTS: u32 = 3;

impl StoreHandle {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Ping, retrying up to [`CONNECT_ATTEMPTS`] times.
    pub fn check_connection(&self) -> Result<(), StoreError> {
        for attempt in 1..=CONNECT_ATTEMPTS {
            if self.backend.ping() {
                if attempt > 1 {
                    tracing::info!(attempt, "scoreboard reconnected");
                }
                return Ok(());
            }
        }
        Err(StoreError::Unavailable {
            attempts: CONNECT_ATTEMPTS,
        })
    }

    /// Run `op` after a connection check.
    pub fn run<T>(
        &self,
        op: impl FnOnce(&dyn Backend) -> Result<T, BackendError>,
    ) -> Result<T, StoreError> {
        self.check_connection()?;
        Ok(op(self.backend.as_ref())?)
    }

    /// Direct backend access for read paths that tolerate staleness.
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }
}

#[derive(Default, Serialize, Deserialize)]
struct Cells(BTreeMap<String, Cell>);

/// Embedded in-memory backend.
///
/// All cells live under one mutex; operations are single-command and never
/// suspend, so the lock is held only for the map access. A dirty flag lets
/// the snapshot task skip idle intervals.
pub struct MemoryBackend {
    cells: Mutex<Cells>,
    dirty: AtomicBool,
    /// Test hook: when false, `ping` reports the store as down.
    reachable: AtomicBool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            cells: Mutex::new(Cells::default()),
            dirty: AtomicBool::new(false),
            reachable: AtomicBool::new(true),
        }
    }

    /// Restore from previously snapshotted cells.
    pub fn from_cells(cells: BTreeMap<String, Cell>) -> Self {
        Self {
            cells: Mutex::new(Cells(cells)),
            dirty: AtomicBool::new(false),
            reachable: AtomicBool::new(true),
        }
    }

    /// Clone the cell map for snapshotting and clear the dirty flag.
    pub fn export_cells(&self) -> BTreeMap<String, Cell> {
        let cells = self.cells.lock();
        self.dirty.store(false, Ordering::SeqCst);
        cells.0.clone()
    }

    /// True when a mutation happened since the last export.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Simulate loss/restoration of the store connection (tests).
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    fn wrong_type(key: &str, found: &Cell, wanted: &'static str) -> BackendError {
        BackendError::WrongType {
            key: key.to_string(),
            found: found.type_name(),
            wanted,
        }
    }
}

impl Backend for MemoryBackend {
    fn ping(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
        let mut cells = self.cells.lock();
        cells
            .0
            .insert(key.to_string(), Cell::Scalar(value.to_string()));
        self.mark_dirty();
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        let cells = self.cells.lock();
        match cells.0.get(key) {
            None => Ok(None),
            Some(Cell::Scalar(v)) => Ok(Some(v.clone())),
            Some(other) => Err(Self::wrong_type(key, other, "get")),
        }
    }

    fn incr(&self, key: &str) -> Result<u64, BackendError> {
        let mut cells = self.cells.lock();
        let next = match cells.0.get(key) {
            None => 1,
            Some(Cell::Scalar(v)) => v
                .parse::<u64>()
                .map_err(|_| BackendError::NotACounter {
                    key: key.to_string(),
                })?
                .saturating_add(1),
            Some(other) => return Err(Self::wrong_type(key, other, "incr")),
        };
        cells
            .0
            .insert(key.to_string(), Cell::Scalar(next.to_string()));
        self.mark_dirty();
        Ok(next)
    }

    fn exists(&self, key: &str) -> Result<bool, BackendError> {
        Ok(self.cells.lock().0.contains_key(key))
    }

    fn del(&self, key: &str) -> Result<(), BackendError> {
        self.cells.lock().0.remove(key);
        self.mark_dirty();
        Ok(())
    }

    fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), BackendError> {
        let mut cells = self.cells.lock();
        match cells
            .0
            .entry(key.to_string())
            .or_insert_with(|| Cell::Hash(BTreeMap::new()))
        {
            Cell::Hash(map) => {
                map.insert(field.to_string(), value.to_string());
                self.mark_dirty();
                Ok(())
            }
            other => Err(Self::wrong_type(key, other, "hset")),
        }
    }

    fn hget(&self, key: &str, field: &str) -> Result<Option<String>, BackendError> {
        let cells = self.cells.lock();
        match cells.0.get(key) {
            None => Ok(None),
            Some(Cell::Hash(map)) => Ok(map.get(field).cloned()),
            Some(other) => Err(Self::wrong_type(key, other, "hget")),
        }
    }

    fn hgetall(&self, key: &str) -> Result<Option<BTreeMap<String, String>>, BackendError> {
        let cells = self.cells.lock();
        match cells.0.get(key) {
            None => Ok(None),
            Some(Cell::Hash(map)) => Ok(Some(map.clone())),
            Some(other) => Err(Self::wrong_type(key, other, "hgetall")),
        }
    }

    fn hkeys(&self, key: &str) -> Result<Vec<String>, BackendError> {
        let cells = self.cells.lock();
        match cells.0.get(key) {
            None => Ok(Vec::new()),
            Some(Cell::Hash(map)) => Ok(map.keys().cloned().collect()),
            Some(other) => Err(Self::wrong_type(key, other, "hkeys")),
        }
    }

    fn hdel(&self, key: &str, field: &str) -> Result<(), BackendError> {
        let mut cells = self.cells.lock();
        match cells.0.get_mut(key) {
            None => Ok(()),
            Some(Cell::Hash(map)) => {
                map.remove(field);
                self.mark_dirty();
                Ok(())
            }
            Some(other) => Err(Self::wrong_type(key, other, "hdel")),
        }
    }

    fn rpush(&self, key: &str, value: &str) -> Result<(), BackendError> {
        let mut cells = self.cells.lock();
        match cells
            .0
            .entry(key.to_string())
            .or_insert_with(|| Cell::List(Vec::new()))
        {
            Cell::List(list) => {
                list.push(value.to_string());
                self.mark_dirty();
                Ok(())
            }
            other => Err(Self::wrong_type(key, other, "rpush")),
        }
    }

    fn lpush(&self, key: &str, value: &str) -> Result<(), BackendError> {
        let mut cells = self.cells.lock();
        match cells
            .0
            .entry(key.to_string())
            .or_insert_with(|| Cell::List(Vec::new()))
        {
            Cell::List(list) => {
                list.insert(0, value.to_string());
                self.mark_dirty();
                Ok(())
            }
            other => Err(Self::wrong_type(key, other, "lpush")),
        }
    }

    fn lpop(&self, key: &str) -> Result<Option<String>, BackendError> {
        let mut cells = self.cells.lock();
        match cells.0.get_mut(key) {
            None => Ok(None),
            Some(Cell::List(list)) => {
                if list.is_empty() {
                    Ok(None)
                } else {
                    self.mark_dirty();
                    Ok(Some(list.remove(0)))
                }
            }
            Some(other) => Err(Self::wrong_type(key, other, "lpop")),
        }
    }

    fn lindex(&self, key: &str, index: usize) -> Result<Option<String>, BackendError> {
        let cells = self.cells.lock();
        match cells.0.get(key) {
            None => Ok(None),
            Some(Cell::List(list)) => Ok(list.get(index).cloned()),
            Some(other) => Err(Self::wrong_type(key, other, "lindex")),
        }
    }

    fn lrange(&self, key: &str) -> Result<Vec<String>, BackendError> {
        let cells = self.cells.lock();
        match cells.0.get(key) {
            None => Ok(Vec::new()),
            Some(Cell::List(list)) => Ok(list.clone()),
            Some(other) => Err(Self::wrong_type(key, other, "lrange")),
        }
    }

    fn llen(&self, key: &str) -> Result<usize, BackendError> {
        let cells = self.cells.lock();
        match cells.0.get(key) {
            None => Ok(0),
            Some(Cell::List(list)) => Ok(list.len()),
            Some(other) => Err(Self::wrong_type(key, other, "llen")),
        }
    }
}

#[cfg(test)]
#[path = "backend_tests.rs"]
mod tests;
