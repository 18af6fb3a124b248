// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dmcs_core::ack::AckId;
use dmcs_core::message::AckBody;
use dmcs_core::Device;

fn health_check() -> Message {
    Message::FwdrHealthCheck {
        device: Device::AuxTel,
        ack_id: AckId::new("h1"),
        reply_queue: "at_foreman_ack_publish".into(),
    }
}

#[tokio::test]
async fn publishes_are_recorded_in_order() {
    let bus = FakeBus::new();
    bus.publish("q", &health_check()).await.unwrap();
    bus.publish("q", &Message::RequestAckId).await.unwrap();

    let sent = bus.sent("q");
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].msg_type(), "AT_FWDR_HEALTH_CHECK");
    assert_eq!(sent[1].msg_type(), "REQUEST_ACK_ID");
    assert!(bus.sent("other").is_empty());
}

#[tokio::test]
async fn subscribers_see_future_publishes() {
    let bus = FakeBus::new();
    let mut rx = bus.subscribe("q");

    bus.publish("q", &health_check()).await.unwrap();
    let got = rx.recv().await.unwrap();
    assert_eq!(got.msg_type(), "AT_FWDR_HEALTH_CHECK");
}

#[tokio::test]
async fn sent_of_type_filters() {
    let bus = FakeBus::new();
    bus.publish("q", &health_check()).await.unwrap();
    bus.publish(
        "q",
        &Message::Ack(AckBody::new(
            "AT_FWDR_HEALTH_CHECK_ACK",
            "f1",
            AckId::new("h1"),
            true,
        )),
    )
    .await
    .unwrap();

    assert_eq!(bus.sent_of_type("q", "AT_FWDR_HEALTH_CHECK").len(), 1);
    assert_eq!(bus.sent_of_type("q", "AT_FWDR_HEALTH_CHECK_ACK").len(), 1);
    assert!(bus.sent_of_type("q", "FAULT").is_empty());
}

#[tokio::test]
async fn clear_drops_the_log_but_not_subscribers() {
    let bus = FakeBus::new();
    let mut rx = bus.subscribe("q");
    bus.publish("q", &health_check()).await.unwrap();
    bus.clear("q");
    assert!(bus.sent("q").is_empty());

    bus.publish("q", &health_check()).await.unwrap();
    assert!(rx.recv().await.is_some());
}
