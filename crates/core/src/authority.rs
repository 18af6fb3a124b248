// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The message authority: shape validation against a message dictionary.
//!
//! Validation is shape-only: a message passes when its `MSG_TYPE` is known
//! and every required key for that type is present. Content is never
//! inspected. Rejected messages are dropped by the consumer after logging;
//! the authority keeps a running rejection count.

use crate::command::OcsCommand;
use crate::device::Device;
use crate::wire::{self, ProtocolError};
use serde_yaml::Value;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shape dictionary plus rejection counter.
#[derive(Debug, Default)]
pub struct MessageAuthority {
    rejected: AtomicU64,
}

impl MessageAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a raw wire value. On failure the rejection counter is bumped
    /// and the caller is expected to drop the message.
    pub fn check(&self, value: &Value) -> Result<(), ProtocolError> {
        match self.check_inner(value) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Number of messages rejected so far.
    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    fn check_inner(&self, value: &Value) -> Result<(), ProtocolError> {
        let tag = wire::msg_type_of_value(value)?;
        let required = required_keys(tag)
            .ok_or_else(|| ProtocolError::UnknownMsgType(tag.to_string()))?;

        let map = value.as_mapping().ok_or(ProtocolError::NotAMap)?;
        let missing: Vec<&'static str> = required
            .iter()
            .copied()
            .filter(|k| !map.contains_key(&Value::from(*k)))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::Shape {
                msg_type: tag.to_string(),
                missing,
            })
        }
    }
}

/// Required keys for a wire tag, with the device-prefixed and `<CMD>_ACK`
/// families normalized the same way the codec dispatches them. `None` means
/// the tag is unknown to the dictionary.
fn required_keys(tag: &str) -> Option<&'static [&'static str]> {
    // Fixed tags
    match tag {
        "SUMMARY_STATE_EVENT" => return Some(&["DEVICE", "CURRENT_STATE"]),
        "SETTINGS_APPLIED_EVENT" => return Some(&["DEVICE", "APPLIED"]),
        "APPLIED_SETTINGS_MATCH_START_EVENT" => return Some(&["DEVICE", "APPLIED"]),
        "RECOMMENDED_SETTINGS_VERSION_EVENT" => return Some(&["DEVICE", "CFG_KEY"]),
        "ERROR_CODE_EVENT" => return Some(&["DEVICE", "ERROR_CODE"]),
        "START_INTEGRATION" | "END_READOUT" => return Some(&["IMAGE_ID"]),
        "HEADER_READY" => return Some(&["FILENAME", "IMAGE_ID"]),
        "NEXT_VISIT" => return Some(&["VISIT_ID", "BORE_SIGHT"]),
        "FAULT" => {
            return Some(&[
                "COMPONENT",
                "DEVICE",
                "FAULT_TYPE",
                "ERROR_CODE",
                "DESCRIPTION",
            ])
        }
        "TELEMETRY" => return Some(&["DEVICE", "STATUS_CODE", "DESCRIPTION"]),
        "PENDING_ACK" => return Some(&["ACK_ID", "EXPIRY_TIME"]),
        "REQUEST_ACK_ID" => return Some(&[]),
        "RESPONSE_ACK_ID" => return Some(&["ACK_ID_VALUE"]),
        _ => {}
    }

    if OcsCommand::parse(tag).is_some() {
        return Some(&["DEVICE", "ACK_ID", "CMD_ID"]);
    }

    if tag
        .strip_prefix("NEW_")
        .and_then(|rest| rest.strip_suffix("_ARCHIVE_ITEM"))
        .and_then(Device::parse)
        .is_some()
    {
        return Some(&["ACK_ID", "JOB_NUM", "SESSION_ID", "IMAGE_ID", "REPLY_QUEUE"]);
    }

    if let Some(prefix) = tag.strip_suffix("_ACK") {
        if OcsCommand::parse(prefix).is_some() {
            return Some(&["DEVICE", "ACK_ID", "CMD_ID", "ACK_BOOL", "ACK_STATEMENT"]);
        }
        // Generic fan-in reply
        return Some(&["COMPONENT", "ACK_ID", "ACK_BOOL"]);
    }

    if let Some((code, rest)) = tag.split_once('_') {
        if Device::parse(code).is_some() {
            return match rest {
                "NEW_SESSION" => Some(&["SESSION_ID", "ACK_ID", "REPLY_QUEUE"]),
                "START_INTEGRATION" => Some(&[
                    "IMAGE_ID",
                    "SESSION_ID",
                    "JOB_NUM",
                    "ACK_ID",
                    "REPLY_QUEUE",
                    "RAFT_LIST",
                    "RAFT_CCD_LIST",
                ]),
                "END_READOUT" => Some(&[
                    "IMAGE_ID",
                    "SESSION_ID",
                    "JOB_NUM",
                    "ACK_ID",
                    "REPLY_QUEUE",
                ]),
                "HEADER_READY" => Some(&["FILENAME", "IMAGE_ID", "ACK_ID", "REPLY_QUEUE"]),
                "ITEMS_XFERD" => Some(&["ACK_ID", "REPLY_QUEUE", "RESULT_SET"]),
                "FWDR_HEALTH_CHECK" => Some(&["ACK_ID", "REPLY_QUEUE"]),
                "FWDR_XFER_PARAMS" => Some(&[
                    "SESSION_ID",
                    "IMAGE_ID",
                    "DEVICE",
                    "JOB_NUM",
                    "ACK_ID",
                    "REPLY_QUEUE",
                    "TARGET_LOCATION",
                    "XFER_PARAMS",
                ]),
                "FWDR_END_READOUT" => Some(&[
                    "IMAGE_ID",
                    "SESSION_ID",
                    "JOB_NUM",
                    "ACK_ID",
                    "REPLY_QUEUE",
                ]),
                "FWDR_HEADER_READY" => Some(&["FILENAME", "IMAGE_ID", "ACK_ID", "REPLY_QUEUE"]),
                _ => None,
            };
        }
    }

    None
}

#[cfg(test)]
#[path = "authority_tests.rs"]
mod tests;
