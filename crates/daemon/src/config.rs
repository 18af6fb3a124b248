// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! System configuration.
//!
//! A YAML file under `$IIP_CONFIG_DIR` (or `$CTRL_IIP_DIR/etc/config`), with
//! everything under a `ROOT` map. Startup failures map to the documented
//! exit codes: 99 bad key, 101 file missing, 102 key missing.

use dmcs_core::codes::exit;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration file name inside the config directory.
const CONFIG_FILE: &str = "L1SystemCfg.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("neither IIP_CONFIG_DIR nor CTRL_IIP_DIR is set")]
    NoConfigDir,

    #[error("config file {path} missing: {source}")]
    FileMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config key missing: {0}")]
    KeyMissing(String),

    #[error("config did not parse: {0}")]
    Parse(#[from] serde_yaml::Error),
}

impl ConfigError {
    /// The process exit code this failure maps to.
    pub fn exit_code(&self) -> i32 {
        match self {
            ConfigError::NoConfigDir | ConfigError::FileMissing { .. } => {
                exit::CONFIG_FILE_MISSING
            }
            ConfigError::KeyMissing(_) => exit::CONFIG_KEY_MISSING,
            ConfigError::Parse(_) => exit::BAD_CONFIG_KEY,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    #[serde(rename = "ROOT")]
    root: Config,
}

/// Per-device foreman consume queues.
#[derive(Debug, Clone, Deserialize)]
pub struct ForemanQueues {
    #[serde(rename = "AR")]
    pub ar: String,
    #[serde(rename = "PP")]
    pub pp: String,
    #[serde(rename = "CU")]
    pub cu: String,
    #[serde(rename = "AT")]
    pub at: String,
}

/// Scoreboard instance ids (used to name the snapshot files).
#[derive(Debug, Clone, Deserialize)]
pub struct ScoreboardIds {
    #[serde(rename = "DMCS_STATE_SCBD")]
    pub state: u32,
    #[serde(rename = "DMCS_ACK_SCBD")]
    pub ack: u32,
    #[serde(rename = "DMCS_INCR_SCBD")]
    pub incr: u32,
    #[serde(rename = "DMCS_BACKLOG_SCBD")]
    pub backlog: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AtsSettings {
    #[serde(rename = "WFS_RAFT")]
    pub wfs_raft: String,
    #[serde(rename = "WFS_CCD")]
    pub wfs_ccd: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveSettings {
    #[serde(rename = "ARCHIVE_LOGIN")]
    pub archive_login: String,
    #[serde(rename = "ARCHIVE_IP")]
    pub archive_ip: String,
    #[serde(rename = "ARCHIVE_XFER_ROOT")]
    pub archive_xfer_root: String,
    #[serde(rename = "USE_ARCHIVE_CTRL", default = "default_true")]
    pub use_archive_ctrl: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralSettings {
    #[serde(rename = "TsXmlVersion")]
    pub ts_xml_version: String,
    #[serde(rename = "TsSALVersion")]
    pub ts_sal_version: String,
    #[serde(rename = "L1DMRepoTag")]
    pub l1_dm_repo_tag: String,
}

/// One registered forwarder worker in the transfer-component table.
#[derive(Debug, Clone, Deserialize)]
pub struct ForwarderEntry {
    #[serde(rename = "CONSUME_QUEUE")]
    pub consume_queue: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct XferComponents {
    #[serde(rename = "AUX_FORWARDERS", default)]
    pub aux_forwarders: BTreeMap<String, ForwarderEntry>,
}

/// The `ROOT` configuration map.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "BASE_BROKER_ADDR")]
    pub base_broker_addr: String,
    #[serde(rename = "FOREMAN_CONSUME_QUEUES")]
    pub foreman_consume_queues: ForemanQueues,
    #[serde(rename = "SCOREBOARDS")]
    pub scoreboards: ScoreboardIds,
    #[serde(rename = "AR_CFG_KEYS", default)]
    pub ar_cfg_keys: Vec<String>,
    #[serde(rename = "PP_CFG_KEYS", default)]
    pub pp_cfg_keys: Vec<String>,
    #[serde(rename = "CU_CFG_KEYS", default)]
    pub cu_cfg_keys: Vec<String>,
    #[serde(rename = "AT_CFG_KEYS", default)]
    pub at_cfg_keys: Vec<String>,
    #[serde(rename = "ATS")]
    pub ats: AtsSettings,
    #[serde(rename = "ARCHIVE")]
    pub archive: ArchiveSettings,
    #[serde(rename = "CCD_LIST", default)]
    pub ccd_list: Vec<String>,
    #[serde(rename = "DEFAULT_RAFT_CONFIGURATION", default)]
    pub default_raft_configuration: Vec<String>,
    #[serde(rename = "GENERAL_SETTINGS")]
    pub general_settings: GeneralSettings,
    #[serde(rename = "XFER_COMPONENTS", default)]
    pub xfer_components: XferComponents,
    #[serde(rename = "LOGGING_DIR", default)]
    pub logging_dir: Option<PathBuf>,
}

impl Config {
    /// Resolve the config directory from the environment and load.
    pub fn load() -> Result<Self, ConfigError> {
        let dir = config_dir().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&dir.join(CONFIG_FILE))
    }

    /// Load a specific config file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::FileMissing {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed: ConfigFile = serde_yaml::from_str(&text).map_err(classify_parse_error)?;
        Ok(parsed.root)
    }

    /// The ordered cfg-key list for a device (index 0 is the default).
    pub fn cfg_keys(&self, device: dmcs_core::Device) -> &[String] {
        match device {
            dmcs_core::Device::Archiver => &self.ar_cfg_keys,
            dmcs_core::Device::PromptProcess => &self.pp_cfg_keys,
            dmcs_core::Device::Catchup => &self.cu_cfg_keys,
            dmcs_core::Device::AuxTel => &self.at_cfg_keys,
        }
    }

    /// The consume queue for a device's foreman.
    pub fn foreman_queue(&self, device: dmcs_core::Device) -> &str {
        match device {
            dmcs_core::Device::Archiver => &self.foreman_consume_queues.ar,
            dmcs_core::Device::PromptProcess => &self.foreman_consume_queues.pp,
            dmcs_core::Device::Catchup => &self.foreman_consume_queues.cu,
            dmcs_core::Device::AuxTel => &self.foreman_consume_queues.at,
        }
    }
}

/// Missing-field parse failures get the dedicated key-missing exit code.
fn classify_parse_error(e: serde_yaml::Error) -> ConfigError {
    let text = e.to_string();
    if let Some(field) = text
        .strip_prefix("missing field `")
        .and_then(|rest| rest.split('`').next())
    {
        return ConfigError::KeyMissing(field.to_string());
    }
    if text.contains("missing field") {
        return ConfigError::KeyMissing(text);
    }
    ConfigError::Parse(e)
}

/// `$IIP_CONFIG_DIR`, else `$CTRL_IIP_DIR/etc/config`.
fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("IIP_CONFIG_DIR") {
        return Some(PathBuf::from(dir));
    }
    std::env::var("CTRL_IIP_DIR")
        .ok()
        .map(|dir| PathBuf::from(dir).join("etc").join("config"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
