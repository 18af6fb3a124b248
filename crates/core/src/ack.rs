// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ack correlation identifiers.
//!
//! An ack id ties a request to its reply (or its N-reply fan-in). Ids encode
//! a human-readable kind prefix, a timestamp, and a zero-padded sequence, and
//! are unique and ordered within a process run because the sequence comes
//! from the monotonic sequence store.

use chrono::{DateTime, Utc};

crate::define_id! {
    /// Ack correlation token, rendered as `<KIND>_<timestamp>_<seq:06>`,
    /// e.g. `AT_FWDR_HEALTH_CHECK_ACK_2025-01-02T14:30:05_000042`.
    pub struct AckId;
}

/// Timestamp layout inside an ack id.
const ACK_TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

impl AckId {
    /// Compose an ack id from its kind, issue time, and sequence number.
    pub fn compose(kind: &str, at: DateTime<Utc>, seq: u64) -> Self {
        Self(format!("{kind}_{}_{seq:06}", at.format(ACK_TS_FORMAT)))
    }

    /// The kind prefix, if the id carries the standard layout.
    pub fn kind(&self) -> Option<&str> {
        // kind is everything before "_<timestamp>_<seq>"
        let mut parts = self.0.rsplitn(3, '_');
        let _seq = parts.next()?;
        let _ts = parts.next()?;
        parts.next()
    }

    /// The sequence suffix, if the id carries the standard layout.
    pub fn seq(&self) -> Option<u64> {
        self.0.rsplit('_').next()?.parse().ok()
    }
}

#[cfg(test)]
#[path = "ack_tests.rs"]
mod tests;
