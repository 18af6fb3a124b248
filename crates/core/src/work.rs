// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raft/ccd work decomposition across forwarders.
//!
//! Each raft is assigned whole to one forwarder and assignments are
//! contiguous. With one forwarder it owns all rafts; with at least as many
//! forwarders as rafts the first `R` forwarders take one each; otherwise
//! every forwarder takes `R / F` rafts and the first forwarder also takes
//! the `R mod F` remainder.

use serde::{Deserialize, Serialize};

/// One forwarder's slice of an exposure job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct WorkAssignment {
    /// Fully-qualified forwarder name.
    pub forwarder: String,
    pub raft_list: Vec<String>,
    /// Per-raft ccd sub-lists, positionally matched to `raft_list`.
    pub raft_ccd_list: Vec<Vec<String>>,
}

/// Divide `rafts` (with their positional `ccds` sub-lists) across
/// `forwarders`. Returns one assignment per forwarder that received work;
/// empty when either input list is empty.
pub fn divide_work(
    forwarders: &[String],
    rafts: &[String],
    ccds: &[Vec<String>],
) -> Vec<WorkAssignment> {
    if forwarders.is_empty() || rafts.is_empty() {
        return Vec::new();
    }

    let f = forwarders.len();
    let r = rafts.len();

    let mut out = Vec::new();
    let mut next = 0usize;
    for (i, fwdr) in forwarders.iter().enumerate() {
        let share = if r <= f {
            if i < r {
                1
            } else {
                0
            }
        } else {
            // First forwarder absorbs the remainder
            r / f + if i == 0 { r % f } else { 0 }
        };
        if share == 0 {
            break;
        }
        let end = next + share;
        out.push(WorkAssignment {
            forwarder: fwdr.clone(),
            raft_list: rafts[next..end].to_vec(),
            raft_ccd_list: ccds[next..end.min(ccds.len())].to_vec(),
        });
        next = end;
    }
    out
}

#[cfg(test)]
#[path = "work_tests.rs"]
mod tests;
