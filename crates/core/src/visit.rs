// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Visit identifiers and boresight pointing.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// One pointing of the telescope; many exposures share a visit id.
    pub struct VisitId;
}

/// A visit with its boresight pointing. The head of the visit list is the
/// current visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub id: VisitId,
    pub bore_sight: crate::message::BoreSight,
}
