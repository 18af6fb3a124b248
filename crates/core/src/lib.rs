// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dmcs-core: domain types for the Data-Management Control System
//!
//! Everything here is pure: devices and their state machine, the bus message
//! model and its YAML wire codec, jobs, sessions, ack ids, fault records, and
//! the raft/ccd work decomposition. I/O lives in the transport, scoreboard,
//! and daemon crates.

pub mod ack;
pub mod authority;
pub mod clock;
pub mod codes;
pub mod command;
pub mod device;
pub mod fault;
pub mod ids;
pub mod job;
pub mod message;
pub mod session;
pub mod transitions;
pub mod visit;
pub mod wire;
pub mod work;

pub use ack::AckId;
pub use authority::MessageAuthority;
pub use clock::{Clock, SystemClock};
pub use command::OcsCommand;
pub use device::{Device, DeviceState};
pub use fault::{FaultRecord, FaultType};
pub use job::{Job, JobNum, JobState, JobStatus, ResultSet};
pub use message::{
    AckBody, BoreSight, CommandAck, CommandBody, ExposureEvent, Message, StateEvent, XferParams,
};
pub use session::SessionId;
pub use transitions::{transition_events, validate_transition, TransitionEvent, TransitionRefusal};
pub use visit::{Visit, VisitId};
pub use wire::ProtocolError;
pub use work::{divide_work, WorkAssignment};

#[cfg(any(test, feature = "test-support"))]
pub use clock::FakeClock;
