// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dmcs-transport: message I/O over the broker.
//!
//! One process holds one broker connection; publishers share it on their own
//! channels and every subscribed queue gets exactly one consumer task.
//! Consumers validate and decode deliveries, then hand typed messages to the
//! owning component over an mpsc channel, so no component ever holds a
//! reference back into the transport.

pub mod amqp;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeBus;

pub use amqp::{AmqpBus, ConsumerSpec};

use async_trait::async_trait;
use dmcs_core::message::Message;
use dmcs_core::wire::ProtocolError;
use thiserror::Error;

/// Errors from bus operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Broker unreachable after exhausting the retry budget.
    #[error("broker unavailable: {0}")]
    Unavailable(#[source] lapin::Error),

    #[error("publish to {queue} failed: {source}")]
    PublishFailed {
        queue: String,
        #[source]
        source: lapin::Error,
    },

    #[error("queue declare for {queue} failed: {source}")]
    DeclareFailed {
        queue: String,
        #[source]
        source: lapin::Error,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The receiving side of a consumer channel went away.
    #[error("consumer channel for {queue} closed")]
    ChannelClosed { queue: String },
}

/// Publish side of the bus.
///
/// `publish` is asynchronous and at-most-once on transient failure: on a
/// connection loss it reconnects and retries before surfacing
/// [`TransportError::Unavailable`].
#[async_trait]
pub trait MessageBus: Send + Sync + 'static {
    async fn publish(&self, queue: &str, msg: &Message) -> Result<(), TransportError>;
}
