// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end foreman choreography, driven through the fake bus with
//! simulated forwarder and archive-controller peers. Paused tokio time makes
//! the 2/4/30-second windows run instantly and deterministically.

use super::*;
use dmcs_core::message::ImageMeta;
use dmcs_core::session::SessionId;
use dmcs_core::FakeClock;
use dmcs_scoreboard::{AckScoreboard, MemoryBackend, StoreHandle};
use dmcs_transport::FakeBus;
use std::time::Duration;

const DMCS_ACK: &str = "dmcs_ack_consume";
const FAULT_Q: &str = "dmcs_fault_consume";
const TELEMETRY_Q: &str = "telemetry_queue";
const ARCHIVE_Q: &str = "archive_ctrl_consume";
const FOREMAN_ACK: &str = "at_foreman_ack_publish";

struct Harness {
    bus: Arc<FakeBus>,
    foreman: Arc<AuxForeman<FakeBus, FakeClock>>,
    jobs: JobScoreboard,
}

fn fwdr(fqn: &str) -> ForwarderInfo {
    ForwarderInfo {
        fqn: fqn.to_string(),
        consume_queue: format!("{fqn}_consume"),
    }
}

fn harness(name: &str, use_archive_ctrl: bool, forwarders: Vec<ForwarderInfo>) -> Harness {
    let backend = Arc::new(MemoryBackend::new());
    let store = StoreHandle::new(backend);
    let jobs = JobScoreboard::new(store.clone());
    let acks = AckScoreboard::new(store.clone());
    let sequences = SequenceScoreboard::open(store, 1).unwrap();
    let clock = FakeClock::new(1_700_000_000_000);
    let coordinator = AckCoordinator::new(acks, clock.clone());
    let bus = Arc::new(FakeBus::new());

    let cfg = ForemanConfig {
        device: Device::AuxTel,
        // Unique per test: the instance registry is process-global
        component: format!("AUX_FOREMAN_{name}"),
        forwarders,
        ack_queue: FOREMAN_ACK.to_string(),
        dmcs_ack_queue: DMCS_ACK.to_string(),
        fault_queue: FAULT_Q.to_string(),
        telemetry_queue: TELEMETRY_Q.to_string(),
        archive_ctrl_queue: ARCHIVE_Q.to_string(),
        use_archive_ctrl,
        archive_login: "user".to_string(),
        archive_ip: "host".to_string(),
        archive_xfer_root: "/archive".to_string(),
    };
    let foreman = AuxForeman::new(
        cfg,
        Arc::clone(&bus),
        jobs.clone(),
        sequences,
        coordinator,
        clock,
    )
    .unwrap();

    Harness { bus, foreman, jobs }
}

/// A forwarder that answers health checks and (optionally) the rest of the
/// exchange, feeding its replies back through the foreman's ack handler the
/// way the ack consumer would.
fn spawn_forwarder(h: &Harness, fqn: &str, respond_xfer: bool, accept_xfer: bool) {
    let mut rx = h.bus.subscribe(&format!("{fqn}_consume"));
    let foreman = Arc::clone(&h.foreman);
    let fqn = fqn.to_string();
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let reply = match msg {
                Message::FwdrHealthCheck { ack_id, .. } => Some(AckBody::new(
                    "AT_FWDR_HEALTH_CHECK_ACK",
                    fqn.clone(),
                    ack_id,
                    true,
                )),
                Message::FwdrXferParams(_, body) if respond_xfer => Some(AckBody::new(
                    "AT_FWDR_XFER_PARAMS_ACK",
                    fqn.clone(),
                    body.ack_id,
                    accept_xfer,
                )),
                Message::FwdrEndReadout(_, body) => {
                    let mut ack = AckBody::new(
                        "AT_FWDR_END_READOUT_ACK",
                        fqn.clone(),
                        body.ack_id,
                        true,
                    );
                    ack.result_set = Some(ResultSet {
                        filename_list: vec!["a.fits".to_string()],
                        receipt_list: Vec::new(),
                    });
                    Some(ack)
                }
                Message::FwdrHeaderReady(_, body) => Some(AckBody::new(
                    "AT_FWDR_HEADER_READY_ACK",
                    fqn.clone(),
                    body.ack_id,
                    true,
                )),
                _ => None,
            };
            if let Some(reply) = reply {
                foreman.handle_ack(Message::Ack(reply)).await.unwrap();
            }
        }
    });
}

/// An archive controller that allocates the daily directory and issues
/// receipts for transferred items.
fn spawn_archive_ctrl(h: &Harness, target_dir: &str) {
    let mut rx = h.bus.subscribe(ARCHIVE_Q);
    let foreman = Arc::clone(&h.foreman);
    let target_dir = target_dir.to_string();
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let reply = match msg {
                Message::NewArchiveItem { ack_id, .. } => {
                    let mut ack = AckBody::new(
                        "NEW_AT_ARCHIVE_ITEM_ACK",
                        "ARCHIVE_CTRL",
                        ack_id,
                        true,
                    );
                    ack.target_dir = Some(target_dir.clone());
                    Some(ack)
                }
                Message::ItemsXferd {
                    ack_id, result_set, ..
                } => {
                    let mut ack =
                        AckBody::new("AT_ITEMS_XFERD_ACK", "ARCHIVE_CTRL", ack_id, true);
                    ack.result_set = Some(ResultSet {
                        filename_list: result_set.filename_list,
                        receipt_list: vec!["Receipt_111".to_string()],
                    });
                    Some(ack)
                }
                _ => None,
            };
            if let Some(reply) = reply {
                foreman.handle_ack(Message::Ack(reply)).await.unwrap();
            }
        }
    });
}

fn start_integration(h: &Harness) -> StartIntegrationBody {
    let session = SessionId::from_seq(101);
    let job_num = JobNum::new("Session_101_1002");
    let job = dmcs_core::Job::new(
        job_num.clone(),
        Device::AuxTel,
        "IMG1",
        vec!["raft01".to_string()],
        vec![vec!["ccd00".to_string()]],
    );
    h.jobs.put_job(&job).unwrap();

    StartIntegrationBody {
        image_id: "IMG1".to_string(),
        session_id: session,
        job_num,
        ack_id: AckId::new("AT_START_INT_ACK_2025-01-02T10:00:00_000001"),
        reply_queue: DMCS_ACK.to_string(),
        raft_list: vec!["raft01".to_string()],
        raft_ccd_list: vec![vec!["ccd00".to_string()]],
        meta: ImageMeta::default(),
    }
}

/// Wait (in paused time) until `queue` has seen `n` messages of `msg_type`.
async fn wait_for(h: &Harness, queue: &str, msg_type: &str, n: usize) {
    for _ in 0..200 {
        if h.bus.sent_of_type(queue, msg_type).len() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("never saw {n} {msg_type} on {queue}");
}

#[tokio::test(start_paused = true)]
async fn happy_path_single_forwarder() {
    let h = harness("happy", true, vec![fwdr("f1")]);
    spawn_forwarder(&h, "f1", true, true);
    spawn_archive_ctrl(&h, "/archive/2025-01-02/");

    let body = start_integration(&h);
    let job_num = body.job_num.clone();
    let start_ack_id = body.ack_id.clone();
    h.foreman
        .handle(Message::DeviceStartIntegration(Device::AuxTel, body))
        .await
        .unwrap();

    // Exactly one xfer-params, pointed at the controller's directory
    let xfers = h.bus.sent_of_type("f1_consume", "AT_FWDR_XFER_PARAMS");
    assert_eq!(xfers.len(), 1);
    let Message::FwdrXferParams(_, xfer) = &xfers[0] else {
        panic!("wrong variant");
    };
    assert_eq!(xfer.target_location, "user@host:/archive/2025-01-02/");
    assert_eq!(xfer.xfer_params.raft_list, vec!["raft01".to_string()]);
    assert_eq!(xfer.xfer_params.at_fwdr, "f1");

    // One positive start-integration ack back to the DMCS
    let acks = h.bus.sent_of_type(DMCS_ACK, "AT_START_INTEGRATION_ACK");
    assert_eq!(acks.len(), 1);
    let Message::Ack(ack) = &acks[0] else {
        panic!("wrong variant");
    };
    assert!(ack.ack_bool);
    assert_eq!(ack.ack_id, start_ack_id);

    // Job accepted, with the schedule covering the declared raft set
    let job = h.jobs.job(&job_num).unwrap().unwrap();
    assert_eq!(job.state, JobState::JobAccepted);
    let assigned: Vec<String> = job
        .schedule
        .iter()
        .flat_map(|a| a.raft_list.clone())
        .collect();
    assert_eq!(assigned, job.raft_list);

    // End readout: exactly one relay, then the collated readout ack
    h.foreman
        .handle(Message::DeviceEndReadout(
            Device::AuxTel,
            ReadoutBody {
                image_id: "IMG1".to_string(),
                session_id: SessionId::from_seq(101),
                job_num: job_num.clone(),
                ack_id: AckId::new("AT_END_READOUT_ACK_2025-01-02T10:00:10_000009"),
                reply_queue: DMCS_ACK.to_string(),
                meta: ImageMeta::default(),
            },
        ))
        .await
        .unwrap();
    wait_for(&h, DMCS_ACK, "AT_READOUT_ACK", 1).await;

    assert_eq!(
        h.bus.sent_of_type("f1_consume", "AT_FWDR_END_READOUT").len(),
        1
    );
    let readout_acks = h.bus.sent_of_type(DMCS_ACK, "AT_READOUT_ACK");
    let Message::Ack(readout) = &readout_acks[0] else {
        panic!("wrong variant");
    };
    assert!(readout.ack_bool);
    let results = readout.result_list.clone().unwrap();
    assert_eq!(results.filename_list, vec!["a.fits".to_string()]);
    assert_eq!(results.receipt_list, vec!["Receipt_111".to_string()]);

    // Header ready: exactly one relay carrying the header filename
    h.foreman
        .handle(Message::DeviceHeaderReady(
            Device::AuxTel,
            HeaderReadyBody {
                filename: "h.fits".to_string(),
                image_id: "IMG1".to_string(),
                ack_id: AckId::new("AT_HEADER_READY_ACK_2025-01-02T10:00:11_000010"),
                reply_queue: FOREMAN_ACK.to_string(),
            },
        ))
        .await
        .unwrap();
    let headers = h.bus.sent_of_type("f1_consume", "AT_FWDR_HEADER_READY");
    assert_eq!(headers.len(), 1);
    let Message::FwdrHeaderReady(_, hr) = &headers[0] else {
        panic!("wrong variant");
    };
    assert_eq!(hr.filename, "h.fits");

    // No faults anywhere along the way
    assert!(h.bus.sent(FAULT_Q).is_empty());
}

#[tokio::test(start_paused = true)]
async fn no_forwarder_faults_5751() {
    let h = harness("nofwdr", true, vec![fwdr("f1")]);
    // Nobody answers the health check

    let body = start_integration(&h);
    let job_num = body.job_num.clone();
    h.foreman
        .handle(Message::DeviceStartIntegration(Device::AuxTel, body))
        .await
        .unwrap();

    let faults = h.bus.sent_of_type(FAULT_Q, "FAULT");
    assert_eq!(faults.len(), 1);
    let Message::Fault(fault) = &faults[0] else {
        panic!("wrong variant");
    };
    assert_eq!(fault.error_code, 5751);

    assert!(h.bus.sent_of_type("f1_consume", "AT_FWDR_XFER_PARAMS").is_empty());
    assert_eq!(
        h.jobs.job_state(&job_num).unwrap(),
        Some(JobState::Scrubbed)
    );
}

#[tokio::test(start_paused = true)]
async fn silent_archive_controller_falls_back_to_configured_root() {
    let h = harness("slowar", true, vec![fwdr("f1")]);
    spawn_forwarder(&h, "f1", true, true);
    // No archive controller is listening

    let body = start_integration(&h);
    let job_num = body.job_num.clone();
    h.foreman
        .handle(Message::DeviceStartIntegration(Device::AuxTel, body))
        .await
        .unwrap();

    // Non-fatal: telemetry 4451, then the exchange proceeds on the default root
    let telemetry = h.bus.sent_of_type(TELEMETRY_Q, "TELEMETRY");
    assert_eq!(telemetry.len(), 1);
    let Message::Telemetry { status_code, .. } = &telemetry[0] else {
        panic!("wrong variant");
    };
    assert_eq!(*status_code, 4451);

    let xfers = h.bus.sent_of_type("f1_consume", "AT_FWDR_XFER_PARAMS");
    assert_eq!(xfers.len(), 1);
    let Message::FwdrXferParams(_, xfer) = &xfers[0] else {
        panic!("wrong variant");
    };
    assert_eq!(xfer.target_location, "user@host:/archive");

    assert_eq!(
        h.jobs.job_state(&job_num).unwrap(),
        Some(JobState::JobAccepted)
    );
    assert!(h.bus.sent(FAULT_Q).is_empty());
}

#[tokio::test(start_paused = true)]
async fn xfer_params_timeout_faults_5752_and_scrubs() {
    let h = harness("xfertimeout", true, vec![fwdr("f1")]);
    spawn_forwarder(&h, "f1", false, true); // healthy but mute on xfer params
    spawn_archive_ctrl(&h, "/archive/2025-01-02/");

    let body = start_integration(&h);
    let job_num = body.job_num.clone();
    h.foreman
        .handle(Message::DeviceStartIntegration(Device::AuxTel, body))
        .await
        .unwrap();

    let faults = h.bus.sent_of_type(FAULT_Q, "FAULT");
    assert_eq!(faults.len(), 1);
    let Message::Fault(fault) = &faults[0] else {
        panic!("wrong variant");
    };
    assert_eq!(fault.error_code, 5752);

    assert!(h.bus.sent_of_type(DMCS_ACK, "AT_START_INTEGRATION_ACK").is_empty());
    assert_eq!(
        h.jobs.job_state(&job_num).unwrap(),
        Some(JobState::Scrubbed)
    );
}

#[tokio::test(start_paused = true)]
async fn declined_xfer_params_refuses_the_job() {
    let h = harness("declined", true, vec![fwdr("f1")]);
    spawn_forwarder(&h, "f1", true, false); // answers with ACK_BOOL=false
    spawn_archive_ctrl(&h, "/archive/2025-01-02/");

    let body = start_integration(&h);
    let job_num = body.job_num.clone();
    h.foreman
        .handle(Message::DeviceStartIntegration(Device::AuxTel, body))
        .await
        .unwrap();

    let acks = h.bus.sent_of_type(DMCS_ACK, "AT_START_INTEGRATION_ACK");
    assert_eq!(acks.len(), 1);
    let Message::Ack(ack) = &acks[0] else {
        panic!("wrong variant");
    };
    assert!(!ack.ack_bool);
    assert_eq!(
        h.jobs.job_state(&job_num).unwrap(),
        Some(JobState::JobRefused)
    );
}

#[tokio::test(start_paused = true)]
async fn spare_forwarder_takes_over_when_primary_is_silent() {
    let h = harness("spare", true, vec![fwdr("f1"), fwdr("f2")]);
    // Only the spare answers
    spawn_forwarder(&h, "f2", true, true);
    spawn_archive_ctrl(&h, "/archive/2025-01-02/");

    let body = start_integration(&h);
    h.foreman
        .handle(Message::DeviceStartIntegration(Device::AuxTel, body))
        .await
        .unwrap();

    assert!(h.bus.sent_of_type("f1_consume", "AT_FWDR_XFER_PARAMS").is_empty());
    assert_eq!(
        h.bus.sent_of_type("f2_consume", "AT_FWDR_XFER_PARAMS").len(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn new_session_is_acked() {
    let h = harness("newsession", true, vec![fwdr("f1")]);
    h.foreman
        .handle(Message::NewSession {
            device: Device::AuxTel,
            session_id: SessionId::from_seq(101),
            ack_id: AckId::new("AT_NEW_SESSION_ACK_2025-01-02T10:00:00_000004"),
            reply_queue: DMCS_ACK.to_string(),
        })
        .await
        .unwrap();

    let acks = h.bus.sent_of_type(DMCS_ACK, "AT_NEW_SESSION_ACK");
    assert_eq!(acks.len(), 1);
}
