// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot persistence for the embedded backend.
//!
//! Snapshots carry the complete cell map. Saves are atomic (write to `.tmp`,
//! fsync, rename) so a crash mid-save never corrupts the previous snapshot;
//! a corrupt file found at load time is rotated to `.bak` and the store
//! starts fresh (the sequence skip margin absorbs the lost increments).

use crate::backend::Cell;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Errors that can occur in snapshot operations
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A point-in-time copy of the backend's cells.
#[derive(Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub cells: BTreeMap<String, Cell>,
    pub created_at: DateTime<Utc>,
}

impl StoreSnapshot {
    pub fn new(cells: BTreeMap<String, Cell>) -> Self {
        Self {
            cells,
            created_at: Utc::now(),
        }
    }

    /// Save atomically (write to `.tmp`, fsync, then rename).
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = path.with_extension("tmp");

        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, self)?;
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }

        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Load a snapshot if one exists.
    ///
    /// Returns `Ok(None)` when the file is absent. A corrupt snapshot is
    /// moved aside to `.bak` and treated as absent.
    pub fn load(path: &Path) -> Result<Option<Self>, SnapshotError> {
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        match serde_json::from_reader(reader) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                let bak_path = bak_path(path);
                warn!(
                    error = %e,
                    path = %path.display(),
                    bak = %bak_path.display(),
                    "Corrupt scoreboard snapshot, moving to .bak and starting fresh",
                );
                fs::rename(path, &bak_path)?;
                Ok(None)
            }
        }
    }
}

fn bak_path(path: &Path) -> PathBuf {
    path.with_extension("bak")
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod tests;
