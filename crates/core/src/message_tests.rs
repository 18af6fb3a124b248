// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn ack_id_accessor_covers_correlated_messages() {
    let ack_id = AckId::new("X_2025-01-02T10:00:00_000001");

    let msg = Message::FwdrHealthCheck {
        device: Device::AuxTel,
        ack_id: ack_id.clone(),
        reply_queue: "at_foreman_ack_publish".into(),
    };
    assert_eq!(msg.ack_id(), Some(&ack_id));

    let msg = Message::Ack(AckBody::new("AT_FWDR_HEALTH_CHECK_ACK", "f1", ack_id.clone(), true));
    assert_eq!(msg.ack_id(), Some(&ack_id));

    let msg = Message::RequestAckId;
    assert_eq!(msg.ack_id(), None);

    let msg = Message::Telemetry {
        device: Device::AuxTel,
        status_code: 4451,
        description: "using default archive dir".into(),
    };
    assert_eq!(msg.ack_id(), None);
}

#[test]
fn msg_type_prefixes_device_traffic() {
    let ack_id = AckId::new("a");
    let msg = Message::FwdrHealthCheck {
        device: Device::AuxTel,
        ack_id,
        reply_queue: "q".into(),
    };
    assert_eq!(msg.msg_type(), "AT_FWDR_HEALTH_CHECK");

    let msg = Message::NewArchiveItem {
        device: Device::AuxTel,
        ack_id: AckId::new("a"),
        job_num: crate::job::JobNum::new("Session_100_1001"),
        session_id: SessionId::from_seq(100),
        image_id: "IMG1".into(),
        reply_queue: "q".into(),
    };
    assert_eq!(msg.msg_type(), "NEW_AT_ARCHIVE_ITEM");
}
