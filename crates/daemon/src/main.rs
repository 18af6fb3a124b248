// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DMCS daemon (dmcsd)
//!
//! Background process that fronts the observatory control system for the
//! image-handling devices.
//!
//! Architecture:
//! - Consumer tasks: one per subscribed queue, feeding typed messages to
//!   the DMCS coordinator and the auxtel foreman
//! - Supervisor: respawns dead consumers, coordinates clean shutdown

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use dmcs_daemon::config::Config;
use dmcs_daemon::credentials::Credentials;
use dmcs_daemon::lifecycle;
use std::path::Path;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("dmcsd {}", env!("CARGO_PKG_VERSION"));
                return;
            }
            "--help" | "-h" | "help" => {
                println!("dmcsd {}", env!("CARGO_PKG_VERSION"));
                println!("DMCS daemon - coordinates image-handling devices for the OCS");
                println!();
                println!("USAGE:");
                println!("    dmcsd");
                println!();
                println!("Configuration is read from $IIP_CONFIG_DIR (or");
                println!("$CTRL_IIP_DIR/etc/config), credentials from ~/.lsst/iip_cred.yaml.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return;
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: dmcsd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("dmcsd: {e}");
            std::process::exit(e.exit_code());
        }
    };

    let credentials = match Credentials::load() {
        Ok(credentials) => credentials,
        Err(e) => {
            eprintln!("dmcsd: {e}");
            std::process::exit(dmcs_core::codes::exit::STORE_CONNECT_FAILED);
        }
    };
    let (broker_user, broker_passwd) = match (
        credentials.get("service_user"),
        credentials.get("service_passwd"),
    ) {
        (Ok(user), Ok(passwd)) => (user.to_string(), passwd.to_string()),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("dmcsd: {e}");
            std::process::exit(dmcs_core::codes::exit::STORE_CONNECT_FAILED);
        }
    };

    let paths = match lifecycle::RuntimePaths::resolve(&config) {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("dmcsd: {e}");
            std::process::exit(1);
        }
    };

    rotate_log_if_needed(&paths.log_path);
    let _log_guard = match setup_logging(&paths.log_path) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("dmcsd: failed to set up logging: {e}");
            std::process::exit(1);
        }
    };

    info!("starting dmcsd {}", env!("CARGO_PKG_VERSION"));

    let (runtime, mut supervisor) =
        match lifecycle::startup(config, &broker_user, &broker_passwd).await {
            Ok(r) => r,
            Err(e) => {
                error!("failed to start daemon: {e}");
                eprintln!("dmcsd: {e}");
                std::process::exit(e.exit_code());
            }
        };

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!("failed to install SIGTERM handler: {e}");
            std::process::exit(1);
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            error!("failed to install SIGINT handler: {e}");
            std::process::exit(1);
        }
    };

    info!("daemon ready");
    println!("READY");

    tokio::select! {
        _ = supervisor.watch() => {
            info!("supervisor stopped watching");
        }
        _ = sigterm.recv() => {
            info!("received SIGTERM, shutting down");
        }
        _ = sigint.recv() => {
            info!("received SIGINT, shutting down");
        }
    }

    supervisor.shutdown().await;
    runtime.shutdown();
    info!("daemon stopped");
}

/// Maximum log file size before rotation (2 MB).
const MAX_LOG_SIZE: u64 = 2 * 1024 * 1024;

/// Number of rotated log files to keep.
const MAX_ROTATED_LOGS: u32 = 10;

/// Rotate the daemon log if it exceeds [`MAX_LOG_SIZE`].
///
/// Shifts `dmcsd.log` → `dmcsd.log.1` → … → `dmcsd.log.10`, deleting the
/// oldest. Best-effort: rotation failures do not stop the daemon.
fn rotate_log_if_needed(log_path: &Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

fn setup_logging(
    log_path: &Path,
) -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let dir = log_path
        .parent()
        .ok_or_else(|| std::io::Error::other("log path has no parent"))?;
    let file = log_path
        .file_name()
        .ok_or_else(|| std::io::Error::other("log path has no file name"))?;
    let file_appender = tracing_appender::rolling::never(dir, file);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
