// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine errors.
//!
//! Handlers never crash the process: the consumer pumps catch these, log
//! them with the device/job correlation, and move to the next delivery.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] dmcs_scoreboard::StoreError),

    #[error(transparent)]
    Transport(#[from] dmcs_transport::TransportError),

    #[error("no session is current")]
    NoCurrentSession,

    #[error("device {0} is not registered in the state scoreboard")]
    UnknownDevice(dmcs_core::Device),

    #[error("an orchestrator of type {0} already exists in this process")]
    DuplicateOrchestrator(String),
}
