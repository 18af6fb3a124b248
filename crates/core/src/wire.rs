// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! YAML wire codec.
//!
//! Maps the typed [`Message`] model onto the YAML documents the bus carries.
//! The `MSG_TYPE` tag is dynamic for three families: command acks
//! (`<CMD>_ACK`), device-prefixed traffic (`AT_START_INTEGRATION`,
//! `AT_FWDR_HEALTH_CHECK`, …) and archive-item queries
//! (`NEW_<DEV>_ARCHIVE_ITEM`); everything else is a fixed tag.

use crate::ack::AckId;
use crate::command::OcsCommand;
use crate::device::Device;
use crate::fault::FaultRecord;
use crate::job::{JobNum, ResultSet};
use crate::message::{
    AckBody, CommandAck, CommandBody, ExposureEvent, HeaderReadyBody, Message, ReadoutBody,
    StartIntegrationBody, StateEvent, XferParamsBody,
};
use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use thiserror::Error;

/// Key carrying the message tag.
pub const MSG_TYPE: &str = "MSG_TYPE";

/// Errors raised while encoding, decoding, or validating bus messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("message body is not a map")]
    NotAMap,

    #[error("message carries no MSG_TYPE")]
    MissingMsgType,

    #[error("unknown MSG_TYPE: {0}")]
    UnknownMsgType(String),

    #[error("message {msg_type} is missing required keys: {missing:?}")]
    Shape {
        msg_type: String,
        missing: Vec<&'static str>,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct NewSessionWire {
    session_id: SessionId,
    ack_id: AckId,
    reply_queue: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct HealthCheckWire {
    ack_id: AckId,
    reply_queue: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct NewArchiveItemWire {
    ack_id: AckId,
    job_num: JobNum,
    session_id: SessionId,
    image_id: String,
    reply_queue: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct ItemsXferdWire {
    ack_id: AckId,
    reply_queue: String,
    result_set: ResultSet,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct PendingAckWire {
    ack_id: AckId,
    /// Absolute deadline, milliseconds since the Unix epoch.
    expiry_time: u64,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct ResponseAckIdWire {
    ack_id_value: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct TelemetryWire {
    device: Device,
    status_code: u32,
    description: String,
}

/// The wire `MSG_TYPE` for a message.
pub fn msg_type_of(msg: &Message) -> String {
    match msg {
        Message::Command(cmd, _) => cmd.as_str().to_string(),
        Message::CommandAck(cmd, _) => format!("{cmd}_ACK"),
        Message::StateEvent(e) => state_event_tag(e).to_string(),
        Message::ExposureEvent(e) => exposure_event_tag(e).to_string(),
        Message::NewSession { device, .. } => format!("{device}_NEW_SESSION"),
        Message::DeviceStartIntegration(d, _) => format!("{d}_START_INTEGRATION"),
        Message::DeviceEndReadout(d, _) => format!("{d}_END_READOUT"),
        Message::DeviceHeaderReady(d, _) => format!("{d}_HEADER_READY"),
        Message::FwdrHealthCheck { device, .. } => format!("{device}_FWDR_HEALTH_CHECK"),
        Message::FwdrXferParams(d, _) => format!("{d}_FWDR_XFER_PARAMS"),
        Message::FwdrEndReadout(d, _) => format!("{d}_FWDR_END_READOUT"),
        Message::FwdrHeaderReady(d, _) => format!("{d}_FWDR_HEADER_READY"),
        Message::NewArchiveItem { device, .. } => format!("NEW_{device}_ARCHIVE_ITEM"),
        Message::ItemsXferd { device, .. } => format!("{device}_ITEMS_XFERD"),
        Message::Ack(b) => b.kind.clone(),
        Message::PendingAck { .. } => "PENDING_ACK".to_string(),
        Message::RequestAckId => "REQUEST_ACK_ID".to_string(),
        Message::ResponseAckId { .. } => "RESPONSE_ACK_ID".to_string(),
        Message::Fault(_) => "FAULT".to_string(),
        Message::Telemetry { .. } => "TELEMETRY".to_string(),
    }
}

fn state_event_tag(e: &StateEvent) -> &'static str {
    match e {
        StateEvent::SummaryState { .. } => "SUMMARY_STATE_EVENT",
        StateEvent::SettingsApplied { .. } => "SETTINGS_APPLIED_EVENT",
        StateEvent::AppliedSettingsMatchStart { .. } => "APPLIED_SETTINGS_MATCH_START_EVENT",
        StateEvent::RecommendedSettingsVersion { .. } => "RECOMMENDED_SETTINGS_VERSION_EVENT",
        StateEvent::ErrorCode { .. } => "ERROR_CODE_EVENT",
    }
}

fn exposure_event_tag(e: &ExposureEvent) -> &'static str {
    match e {
        ExposureEvent::StartIntegration { .. } => "START_INTEGRATION",
        ExposureEvent::EndReadout { .. } => "END_READOUT",
        ExposureEvent::HeaderReady { .. } => "HEADER_READY",
        ExposureEvent::NextVisit { .. } => "NEXT_VISIT",
    }
}

/// Serialize `body` and prepend the `MSG_TYPE` tag.
fn tagged<T: Serialize>(tag: String, body: &T) -> Result<Value, ProtocolError> {
    let mut map = Mapping::new();
    map.insert(Value::from(MSG_TYPE), Value::from(tag));
    match serde_yaml::to_value(body)? {
        Value::Mapping(m) => {
            for (k, v) in m {
                map.insert(k, v);
            }
        }
        Value::Null => {}
        _ => return Err(ProtocolError::NotAMap),
    }
    Ok(Value::Mapping(map))
}

/// Encode a message as a YAML value (a map with a `MSG_TYPE` key).
pub fn to_value(msg: &Message) -> Result<Value, ProtocolError> {
    let tag = msg_type_of(msg);
    match msg {
        Message::Command(_, body) => tagged(tag, body),
        Message::CommandAck(_, body) => tagged(tag, body),
        // Internally tagged already
        Message::StateEvent(e) => Ok(serde_yaml::to_value(e)?),
        Message::ExposureEvent(e) => Ok(serde_yaml::to_value(e)?),
        Message::NewSession {
            session_id,
            ack_id,
            reply_queue,
            ..
        } => tagged(
            tag,
            &NewSessionWire {
                session_id: session_id.clone(),
                ack_id: ack_id.clone(),
                reply_queue: reply_queue.clone(),
            },
        ),
        Message::DeviceStartIntegration(_, body) => tagged(tag, body),
        Message::DeviceEndReadout(_, body) | Message::FwdrEndReadout(_, body) => tagged(tag, body),
        Message::DeviceHeaderReady(_, body) | Message::FwdrHeaderReady(_, body) => {
            tagged(tag, body)
        }
        Message::FwdrHealthCheck {
            ack_id,
            reply_queue,
            ..
        } => tagged(
            tag,
            &HealthCheckWire {
                ack_id: ack_id.clone(),
                reply_queue: reply_queue.clone(),
            },
        ),
        Message::FwdrXferParams(_, body) => tagged(tag, body),
        Message::NewArchiveItem {
            ack_id,
            job_num,
            session_id,
            image_id,
            reply_queue,
            ..
        } => tagged(
            tag,
            &NewArchiveItemWire {
                ack_id: ack_id.clone(),
                job_num: job_num.clone(),
                session_id: session_id.clone(),
                image_id: image_id.clone(),
                reply_queue: reply_queue.clone(),
            },
        ),
        Message::ItemsXferd {
            ack_id,
            reply_queue,
            result_set,
            ..
        } => tagged(
            tag,
            &ItemsXferdWire {
                ack_id: ack_id.clone(),
                reply_queue: reply_queue.clone(),
                result_set: result_set.clone(),
            },
        ),
        Message::Ack(body) => tagged(tag, body),
        Message::PendingAck {
            ack_id,
            expiry_epoch_ms,
        } => tagged(
            tag,
            &PendingAckWire {
                ack_id: ack_id.clone(),
                expiry_time: *expiry_epoch_ms,
            },
        ),
        Message::RequestAckId => {
            let mut map = Mapping::new();
            map.insert(Value::from(MSG_TYPE), Value::from(tag));
            Ok(Value::Mapping(map))
        }
        Message::ResponseAckId { ack_id_value } => tagged(
            tag,
            &ResponseAckIdWire {
                ack_id_value: ack_id_value.clone(),
            },
        ),
        Message::Fault(record) => tagged(tag, record),
        Message::Telemetry {
            device,
            status_code,
            description,
        } => tagged(
            tag,
            &TelemetryWire {
                device: *device,
                status_code: *status_code,
                description: description.clone(),
            },
        ),
    }
}

/// Encode a message as a YAML document.
pub fn encode(msg: &Message) -> Result<String, ProtocolError> {
    Ok(serde_yaml::to_string(&to_value(msg)?)?)
}

/// The `MSG_TYPE` of a raw wire value.
pub fn msg_type_of_value(value: &Value) -> Result<&str, ProtocolError> {
    let map = value.as_mapping().ok_or(ProtocolError::NotAMap)?;
    map.get(MSG_TYPE)
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingMsgType)
}

/// Decode a wire value into a typed message.
pub fn from_value(value: Value) -> Result<Message, ProtocolError> {
    let tag = msg_type_of_value(&value)?.to_string();

    // Fixed tags first
    match tag.as_str() {
        "SUMMARY_STATE_EVENT"
        | "SETTINGS_APPLIED_EVENT"
        | "APPLIED_SETTINGS_MATCH_START_EVENT"
        | "RECOMMENDED_SETTINGS_VERSION_EVENT"
        | "ERROR_CODE_EVENT" => {
            return Ok(Message::StateEvent(serde_yaml::from_value(value)?));
        }
        "START_INTEGRATION" | "END_READOUT" | "HEADER_READY" | "NEXT_VISIT" => {
            return Ok(Message::ExposureEvent(serde_yaml::from_value(value)?));
        }
        "FAULT" => {
            let record: FaultRecord = serde_yaml::from_value(value)?;
            return Ok(Message::Fault(record));
        }
        "TELEMETRY" => {
            let w: TelemetryWire = serde_yaml::from_value(value)?;
            return Ok(Message::Telemetry {
                device: w.device,
                status_code: w.status_code,
                description: w.description,
            });
        }
        "PENDING_ACK" => {
            let w: PendingAckWire = serde_yaml::from_value(value)?;
            return Ok(Message::PendingAck {
                ack_id: w.ack_id,
                expiry_epoch_ms: w.expiry_time,
            });
        }
        "REQUEST_ACK_ID" => return Ok(Message::RequestAckId),
        "RESPONSE_ACK_ID" => {
            let w: ResponseAckIdWire = serde_yaml::from_value(value)?;
            return Ok(Message::ResponseAckId {
                ack_id_value: w.ack_id_value,
            });
        }
        _ => {}
    }

    // OCS commands carry their own name as the tag
    if let Some(cmd) = OcsCommand::parse(&tag) {
        return Ok(Message::Command(cmd, serde_yaml::from_value(value)?));
    }

    // NEW_<DEV>_ARCHIVE_ITEM
    if let Some(dev) = tag
        .strip_prefix("NEW_")
        .and_then(|rest| rest.strip_suffix("_ARCHIVE_ITEM"))
        .and_then(Device::parse)
    {
        let w: NewArchiveItemWire = serde_yaml::from_value(value)?;
        return Ok(Message::NewArchiveItem {
            device: dev,
            ack_id: w.ack_id,
            job_num: w.job_num,
            session_id: w.session_id,
            image_id: w.image_id,
            reply_queue: w.reply_queue,
        });
    }

    // <CMD>_ACK, then every other *_ACK as a generic reply
    if let Some(prefix) = tag.strip_suffix("_ACK") {
        if let Some(cmd) = OcsCommand::parse(prefix) {
            return Ok(Message::CommandAck(cmd, serde_yaml::from_value(value)?));
        }
        let mut body: AckBody = serde_yaml::from_value(value)?;
        body.kind = tag;
        return Ok(Message::Ack(body));
    }

    // <DEV>_… traffic
    if let Some((code, rest)) = tag.split_once('_') {
        if let Some(device) = Device::parse(code) {
            return decode_device_tagged(device, rest, value, &tag);
        }
    }

    Err(ProtocolError::UnknownMsgType(tag))
}

fn decode_device_tagged(
    device: Device,
    rest: &str,
    value: Value,
    tag: &str,
) -> Result<Message, ProtocolError> {
    match rest {
        "NEW_SESSION" => {
            let w: NewSessionWire = serde_yaml::from_value(value)?;
            Ok(Message::NewSession {
                device,
                session_id: w.session_id,
                ack_id: w.ack_id,
                reply_queue: w.reply_queue,
            })
        }
        "START_INTEGRATION" => {
            let body: StartIntegrationBody = serde_yaml::from_value(value)?;
            Ok(Message::DeviceStartIntegration(device, body))
        }
        "END_READOUT" => {
            let body: ReadoutBody = serde_yaml::from_value(value)?;
            Ok(Message::DeviceEndReadout(device, body))
        }
        "HEADER_READY" => {
            let body: HeaderReadyBody = serde_yaml::from_value(value)?;
            Ok(Message::DeviceHeaderReady(device, body))
        }
        "ITEMS_XFERD" => {
            let w: ItemsXferdWire = serde_yaml::from_value(value)?;
            Ok(Message::ItemsXferd {
                device,
                ack_id: w.ack_id,
                reply_queue: w.reply_queue,
                result_set: w.result_set,
            })
        }
        "FWDR_HEALTH_CHECK" => {
            let w: HealthCheckWire = serde_yaml::from_value(value)?;
            Ok(Message::FwdrHealthCheck {
                device,
                ack_id: w.ack_id,
                reply_queue: w.reply_queue,
            })
        }
        "FWDR_XFER_PARAMS" => {
            let body: XferParamsBody = serde_yaml::from_value(value)?;
            Ok(Message::FwdrXferParams(device, body))
        }
        "FWDR_END_READOUT" => {
            let body: ReadoutBody = serde_yaml::from_value(value)?;
            Ok(Message::FwdrEndReadout(device, body))
        }
        "FWDR_HEADER_READY" => {
            let body: HeaderReadyBody = serde_yaml::from_value(value)?;
            Ok(Message::FwdrHeaderReady(device, body))
        }
        _ => Err(ProtocolError::UnknownMsgType(tag.to_string())),
    }
}

/// Decode a YAML document into a typed message.
pub fn decode(bytes: &[u8]) -> Result<Message, ProtocolError> {
    let value: Value = serde_yaml::from_slice(bytes)?;
    from_value(value)
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
