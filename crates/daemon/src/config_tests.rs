// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dmcs_core::codes::exit;
use dmcs_core::Device;

const FULL_CONFIG: &str = r#"
ROOT:
  BASE_BROKER_ADDR: 141.142.238.10:5672/%2Fbunny
  FOREMAN_CONSUME_QUEUES:
    AR: ar_foreman_consume
    PP: pp_foreman_consume
    CU: cu_foreman_consume
    AT: at_foreman_consume
  SCOREBOARDS:
    DMCS_STATE_SCBD: 1
    DMCS_ACK_SCBD: 3
    DMCS_INCR_SCBD: 4
    DMCS_BACKLOG_SCBD: 5
  AT_CFG_KEYS:
    - normal
    - alternate
  ATS:
    WFS_RAFT: raft01
    WFS_CCD: ccd00
  ARCHIVE:
    ARCHIVE_LOGIN: user
    ARCHIVE_IP: 141.142.238.30
    ARCHIVE_XFER_ROOT: /data/export
  CCD_LIST:
    - "00"
    - "01"
  DEFAULT_RAFT_CONFIGURATION:
    - raft01
  GENERAL_SETTINGS:
    TsXmlVersion: "3.9"
    TsSALVersion: "3.10"
    L1DMRepoTag: v1.2
  XFER_COMPONENTS:
    AUX_FORWARDERS:
      FWDR_1:
        CONSUME_QUEUE: f1_consume
  LOGGING_DIR: /var/log/dmcs
"#;

fn write_config(text: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("L1SystemCfg.yaml");
    std::fs::write(&path, text).unwrap();
    (dir, path)
}

#[test]
fn full_config_parses() {
    let (_dir, path) = write_config(FULL_CONFIG);
    let config = Config::load_from(&path).unwrap();

    assert_eq!(config.base_broker_addr, "141.142.238.10:5672/%2Fbunny");
    assert_eq!(config.foreman_queue(Device::AuxTel), "at_foreman_consume");
    assert_eq!(config.cfg_keys(Device::AuxTel), &["normal", "alternate"]);
    assert!(config.cfg_keys(Device::Archiver).is_empty());
    assert_eq!(config.ats.wfs_raft, "raft01");
    assert_eq!(config.archive.archive_xfer_root, "/data/export");
    assert!(config.archive.use_archive_ctrl);
    assert_eq!(config.scoreboards.incr, 4);
    assert_eq!(
        config.xfer_components.aux_forwarders["FWDR_1"].consume_queue,
        "f1_consume"
    );
    assert_eq!(
        config.logging_dir.as_deref(),
        Some(std::path::Path::new("/var/log/dmcs"))
    );
}

#[test]
fn missing_file_maps_to_101() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load_from(&dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::FileMissing { .. }));
    assert_eq!(err.exit_code(), exit::CONFIG_FILE_MISSING);
}

#[test]
fn missing_key_maps_to_102() {
    let (_dir, path) = write_config("ROOT:\n  BASE_BROKER_ADDR: somewhere\n");
    let err = Config::load_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::KeyMissing(_)));
    assert_eq!(err.exit_code(), exit::CONFIG_KEY_MISSING);
}

#[test]
fn malformed_yaml_maps_to_99() {
    let (_dir, path) = write_config("ROOT: [not, a, map");
    let err = Config::load_from(&path).unwrap_err();
    assert_eq!(err.exit_code(), exit::BAD_CONFIG_KEY);
}
