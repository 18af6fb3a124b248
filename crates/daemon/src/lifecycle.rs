// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup, wiring, shutdown.
//!
//! Startup order matters: lock file first, then scoreboards (sequence
//! counters bumped past any snapshot loss), then the broker, then the
//! foreman's ack consumer so forwarder acquisition can hear replies, and
//! only then the remaining consumers.

use crate::config::Config;
use crate::supervisor::Supervisor;
use chrono::Datelike;
use dmcs_core::authority::MessageAuthority;
use dmcs_core::codes::exit;
use dmcs_core::message::Message;
use dmcs_core::{Device, SystemClock};
use dmcs_engine::dmcs::foreman_ack_queue;
use dmcs_engine::{
    AckCoordinator, AuxForeman, Dmcs, DmcsConfig, EngineError, FaultRouter, ForemanConfig,
    ForwarderInfo,
};
use dmcs_engine::{DeviceStateManager, GeneralSettings};
use dmcs_scoreboard::{
    AckScoreboard, BacklogScoreboard, JobScoreboard, MemoryBackend, SequenceScoreboard,
    SnapshotError, StateScoreboard, StoreError, StoreHandle, StoreSnapshot,
};
use dmcs_transport::{AmqpBus, ConsumerSpec, TransportError};
use fs2::FileExt;
use std::fs::File;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const OCS_DMCS_CONSUME: &str = "ocs_dmcs_consume";
const DMCS_OCS_PUBLISH: &str = "dmcs_ocs_publish";
const DMCS_ACK_CONSUME: &str = "dmcs_ack_consume";
const DMCS_FAULT_CONSUME: &str = "dmcs_fault_consume";
const GEN_DMCS_CONSUME: &str = "gen_dmcs_consume";
const TELEMETRY_QUEUE: &str = "telemetry_queue";
const ARCHIVE_CTRL_CONSUME: &str = "archive_ctrl_consume";
const ARCHIVE_CTRL_PUBLISH: &str = "archive_ctrl_publish";

/// Snapshot save cadence for the persistent scoreboards.
const SNAPSHOT_PERIOD: Duration = Duration::from_secs(60);

/// Depth of each consumer→pump channel.
const PUMP_DEPTH: usize = 64;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine state directory")]
    NoStateDir,

    #[error("failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Broker(#[from] TransportError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LifecycleError {
    /// The process exit code this startup failure maps to.
    pub fn exit_code(&self) -> i32 {
        match self {
            LifecycleError::Store(_) | LifecycleError::Snapshot(_) => exit::STORE_CONNECT_FAILED,
            LifecycleError::Broker(_) => exit::BROKER_UNAVAILABLE,
            _ => 1,
        }
    }
}

/// Filesystem locations for daemon state.
#[derive(Debug, Clone)]
pub struct RuntimePaths {
    pub state_dir: PathBuf,
    pub lock_path: PathBuf,
    pub log_path: PathBuf,
    /// Sequence-counter snapshot (survives restarts).
    pub incr_snapshot: PathBuf,
    /// Backlog snapshot (survives restarts).
    pub backlog_snapshot: PathBuf,
}

impl RuntimePaths {
    /// Resolve under `$XDG_STATE_HOME/dmcs` (or `~/.local/state/dmcs`),
    /// with the log in `logging_dir` when the config names one.
    pub fn resolve(config: &Config) -> Result<Self, LifecycleError> {
        let state_dir = state_dir().ok_or(LifecycleError::NoStateDir)?;
        let log_dir = config
            .logging_dir
            .clone()
            .unwrap_or_else(|| state_dir.clone());
        Ok(Self {
            lock_path: state_dir.join("dmcsd.pid"),
            log_path: log_dir.join("dmcsd.log"),
            incr_snapshot: state_dir.join(format!(
                "scoreboard_{}.json",
                config.scoreboards.incr
            )),
            backlog_snapshot: state_dir.join(format!(
                "scoreboard_{}.json",
                config.scoreboards.backlog
            )),
            state_dir,
        })
    }
}

fn state_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("XDG_STATE_HOME") {
        return Some(PathBuf::from(dir).join("dmcs"));
    }
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".local").join("state").join("dmcs"))
}

/// The running daemon.
pub struct Runtime {
    pub paths: RuntimePaths,
    // NOTE(lifetime): held to maintain the exclusive pid-file lock
    #[allow(dead_code)]
    lock_file: File,
    incr_backend: Arc<MemoryBackend>,
    backlog_backend: Arc<MemoryBackend>,
}

impl Runtime {
    /// Save final snapshots and release the lock artifacts.
    pub fn shutdown(&self) {
        info!("shutting down daemon");
        for (backend, path) in [
            (&self.incr_backend, &self.paths.incr_snapshot),
            (&self.backlog_backend, &self.paths.backlog_snapshot),
        ] {
            if let Err(e) = StoreSnapshot::new(backend.export_cells()).save(path) {
                warn!(path = %path.display(), error = %e, "failed to save shutdown snapshot");
            }
        }
        if self.paths.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.paths.lock_path) {
                warn!(error = %e, "failed to remove pid file");
            }
        }
        info!("daemon shutdown complete");
    }
}

/// Bring the daemon up and hand every long-lived task to the supervisor.
pub async fn startup(
    config: Config,
    broker_user: &str,
    broker_passwd: &str,
) -> Result<(Runtime, Supervisor), LifecycleError> {
    let paths = RuntimePaths::resolve(&config)?;
    std::fs::create_dir_all(&paths.state_dir)?;

    // Single-instance lock
    let lock_file = File::create(&paths.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;
    use std::io::Write;
    let mut pid_writer = &lock_file;
    let _ = writeln!(pid_writer, "{}", std::process::id());

    // Scoreboard backends. State and acks start clean every run; sequences
    // and backlog restore from their snapshots.
    let state_backend = Arc::new(MemoryBackend::new());
    let incr_backend = Arc::new(load_backend(&paths.incr_snapshot)?);
    let backlog_backend = Arc::new(load_backend(&paths.backlog_snapshot)?);
    let ack_backend = Arc::new(MemoryBackend::new());

    let state_handle = StoreHandle::new(state_backend.clone());
    let state = StateScoreboard::new(state_handle.clone());
    let jobs = JobScoreboard::new(state_handle);
    let acks = AckScoreboard::new(StoreHandle::new(ack_backend.clone()));
    let backlog = BacklogScoreboard::new(StoreHandle::new(backlog_backend.clone()));

    let clock = SystemClock;
    let weekday = chrono::Utc::now().weekday().number_from_monday() as u64;
    let sequences =
        SequenceScoreboard::open(StoreHandle::new(incr_backend.clone()), weekday)?;
    sequences.bump_for_restart()?;

    // All devices wake up OFFLINE with their consume queues and cfg keys
    for device in Device::ALL {
        state.init_device(device, config.foreman_queue(device))?;
        let keys = config.cfg_keys(device);
        if !keys.is_empty() {
            state.add_device_cfg_keys(device, keys)?;
            state.set_device_cfg_key(device, &keys[0])?;
        }
    }

    // Broker
    let authority = Arc::new(MessageAuthority::new());
    let url = format!(
        "amqp://{broker_user}:{broker_passwd}@{}",
        config.base_broker_addr
    );
    let bus = Arc::new(AmqpBus::new(url, authority));
    bus.connect().await?;

    let coordinator = AckCoordinator::new(acks.clone(), clock);

    let state_manager = DeviceStateManager::new(
        Arc::clone(&bus),
        state.clone(),
        sequences.clone(),
        coordinator.clone(),
        clock,
        DMCS_OCS_PUBLISH,
        DMCS_ACK_CONSUME,
        GeneralSettings {
            ts_xml_version: config.general_settings.ts_xml_version.clone(),
            ts_sal_version: config.general_settings.ts_sal_version.clone(),
            l1_dm_repo_tag: config.general_settings.l1_dm_repo_tag.clone(),
        },
        config.default_raft_configuration.clone(),
    );
    let fault_router = FaultRouter::new(
        Arc::clone(&bus),
        state.clone(),
        DMCS_OCS_PUBLISH,
        TELEMETRY_QUEUE,
    );
    let dmcs = Arc::new(Dmcs::new(
        Arc::clone(&bus),
        DmcsConfig {
            ocs_publish: DMCS_OCS_PUBLISH.to_string(),
            dmcs_ack_queue: DMCS_ACK_CONSUME.to_string(),
            ccd_list: config.ccd_list.clone(),
            wfs_raft: config.ats.wfs_raft.clone(),
            wfs_ccd: config.ats.wfs_ccd.clone(),
        },
        state_manager,
        fault_router,
        coordinator.clone(),
        state.clone(),
        jobs.clone(),
        sequences.clone(),
        backlog,
        clock,
    ));

    let forwarders: Vec<ForwarderInfo> = config
        .xfer_components
        .aux_forwarders
        .iter()
        .map(|(fqn, entry)| ForwarderInfo {
            fqn: fqn.clone(),
            consume_queue: entry.consume_queue.clone(),
        })
        .collect();
    let foreman = AuxForeman::new(
        ForemanConfig {
            device: Device::AuxTel,
            component: "AUX_FOREMAN".to_string(),
            forwarders,
            ack_queue: foreman_ack_queue(Device::AuxTel),
            dmcs_ack_queue: DMCS_ACK_CONSUME.to_string(),
            fault_queue: DMCS_FAULT_CONSUME.to_string(),
            telemetry_queue: TELEMETRY_QUEUE.to_string(),
            archive_ctrl_queue: ARCHIVE_CTRL_CONSUME.to_string(),
            use_archive_ctrl: config.archive.use_archive_ctrl,
            archive_login: config.archive.archive_login.clone(),
            archive_ip: config.archive.archive_ip.clone(),
            archive_xfer_root: config.archive.archive_xfer_root.clone(),
        },
        Arc::clone(&bus),
        jobs,
        sequences,
        coordinator.clone(),
        clock,
    )?;

    let mut supervisor = Supervisor::new();

    // The foreman's ack consumer must be live before forwarder acquisition
    // can hear health-check replies.
    register_pipeline(
        &mut supervisor,
        &bus,
        &foreman_ack_queue(Device::AuxTel),
        handler({
            let foreman = Arc::clone(&foreman);
            move |msg| {
                let foreman = Arc::clone(&foreman);
                async move { foreman.handle_ack(msg).await }
            }
        }),
    );
    register_pipeline(
        &mut supervisor,
        &bus,
        ARCHIVE_CTRL_PUBLISH,
        handler({
            let foreman = Arc::clone(&foreman);
            move |msg| {
                let foreman = Arc::clone(&foreman);
                async move { foreman.handle_ack(msg).await }
            }
        }),
    );

    info!("acquiring forwarder");
    foreman.acquire_forwarder().await?;

    register_pipeline(
        &mut supervisor,
        &bus,
        OCS_DMCS_CONSUME,
        handler({
            let dmcs = Arc::clone(&dmcs);
            move |msg| {
                let dmcs = Arc::clone(&dmcs);
                async move { dmcs.handle_ocs(msg).await }
            }
        }),
    );
    register_pipeline(
        &mut supervisor,
        &bus,
        DMCS_ACK_CONSUME,
        handler({
            let dmcs = Arc::clone(&dmcs);
            move |msg| {
                let dmcs = Arc::clone(&dmcs);
                async move { dmcs.handle_ack(msg).await }
            }
        }),
    );
    register_pipeline(
        &mut supervisor,
        &bus,
        DMCS_FAULT_CONSUME,
        handler({
            let dmcs = Arc::clone(&dmcs);
            move |msg| {
                let dmcs = Arc::clone(&dmcs);
                async move { dmcs.handle_fault(msg).await }
            }
        }),
    );
    register_pipeline(
        &mut supervisor,
        &bus,
        GEN_DMCS_CONSUME,
        handler({
            let dmcs = Arc::clone(&dmcs);
            move |msg| {
                let dmcs = Arc::clone(&dmcs);
                async move { dmcs.handle_general(msg).await }
            }
        }),
    );
    register_pipeline(
        &mut supervisor,
        &bus,
        config.foreman_queue(Device::AuxTel),
        handler({
            let foreman = Arc::clone(&foreman);
            move |msg| {
                let foreman = Arc::clone(&foreman);
                async move { foreman.handle(msg).await }
            }
        }),
    );

    supervisor.register_once("pending_ack_sweeper", coordinator.spawn_sweeper());
    supervisor.register_once(
        "scoreboard_snapshots",
        spawn_snapshot_task(vec![
            (incr_backend.clone(), paths.incr_snapshot.clone()),
            (backlog_backend.clone(), paths.backlog_snapshot.clone()),
        ]),
    );

    info!("daemon startup complete");
    Ok((
        Runtime {
            paths,
            lock_file,
            incr_backend,
            backlog_backend,
        },
        supervisor,
    ))
}

fn load_backend(snapshot_path: &std::path::Path) -> Result<MemoryBackend, LifecycleError> {
    Ok(match StoreSnapshot::load(snapshot_path)? {
        Some(snapshot) => MemoryBackend::from_cells(snapshot.cells),
        None => MemoryBackend::new(),
    })
}

type PumpHandler =
    Arc<dyn Fn(Message) -> Pin<Box<dyn Future<Output = Result<(), EngineError>> + Send>> + Send + Sync>;

fn handler<F, Fut>(f: F) -> PumpHandler
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), EngineError>> + Send + 'static,
{
    Arc::new(move |msg| Box::pin(f(msg)))
}

/// Wire one queue: a broker consumer feeding a channel, and a pump draining
/// the channel into the handler. Both handles go to the supervisor as one
/// group, so shutdown and respawn abort the consumer explicitly rather than
/// leaving it orphaned behind a cancelled pump.
fn register_pipeline(supervisor: &mut Supervisor, bus: &Arc<AmqpBus>, queue: &str, h: PumpHandler) {
    let bus = Arc::clone(bus);
    let queue_name = queue.to_string();
    supervisor.register(
        queue,
        Box::new(move || {
            let (tx, mut rx) = mpsc::channel(PUMP_DEPTH);
            let consumer = bus.consume(ConsumerSpec {
                queue: queue_name.clone(),
                sink: tx,
            });
            let h = Arc::clone(&h);
            let queue = queue_name.clone();
            let pump = tokio::spawn(async move {
                while let Some(msg) = rx.recv().await {
                    if let Err(e) = h(msg).await {
                        error!(queue = %queue, error = %e, "handler failed");
                    }
                }
            });
            vec![consumer, pump]
        }),
    );
}

/// Save dirty persistent backends on a fixed cadence.
fn spawn_snapshot_task(backends: Vec<(Arc<MemoryBackend>, PathBuf)>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SNAPSHOT_PERIOD);
        loop {
            tick.tick().await;
            for (backend, path) in &backends {
                if backend.is_dirty() {
                    if let Err(e) = StoreSnapshot::new(backend.export_cells()).save(path) {
                        warn!(path = %path.display(), error = %e, "scoreboard snapshot failed");
                    }
                }
            }
        }
    })
}
