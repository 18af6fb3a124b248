// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dmcs-daemon library: configuration, credentials, lifecycle, supervision.
//!
//! The `dmcsd` binary wires these together: load config and credentials,
//! take the instance lock, open the scoreboards, connect the bus, and hand
//! the consumer set to the supervisor.

pub mod config;
pub mod credentials;
pub mod lifecycle;
pub mod supervisor;

pub use config::{Config, ConfigError};
pub use credentials::{Credentials, CredentialsError};
pub use lifecycle::{LifecycleError, Runtime, RuntimePaths};
pub use supervisor::Supervisor;
