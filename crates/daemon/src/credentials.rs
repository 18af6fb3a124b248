// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker credentials.
//!
//! Loaded from `iip_cred.yaml` inside a user-private directory. The
//! directory must be `0700` and the file `0600`; anything group- or
//! world-accessible is refused outright.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Credentials file name inside the secure directory.
const CRED_FILE: &str = "iip_cred.yaml";

/// Permission bits that must be clear on the directory and the file.
const GROUP_OTHER_BITS: u32 = 0o077;

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("cannot determine home directory")]
    NoHome,

    #[error("credentials directory {0} does not exist")]
    MissingDir(PathBuf),

    #[error("credentials path {path} is unsecure; run 'chmod {wanted}' to fix this")]
    Unsecure { path: PathBuf, wanted: &'static str },

    #[error("cannot read credentials file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("credentials file did not parse: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("credential alias {0} is not defined")]
    UnknownAlias(String),
}

#[derive(Debug, Deserialize)]
struct CredFile {
    rabbitmq_users: BTreeMap<String, String>,
}

/// Broker users and passwords, keyed by alias.
#[derive(Debug)]
pub struct Credentials {
    users: BTreeMap<String, String>,
}

impl Credentials {
    /// Load from `~/.lsst/iip_cred.yaml`.
    pub fn load() -> Result<Self, CredentialsError> {
        let home = std::env::var_os("HOME").ok_or(CredentialsError::NoHome)?;
        Self::load_from_dir(&PathBuf::from(home).join(".lsst"))
    }

    /// Load from a specific secure directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self, CredentialsError> {
        if !dir.is_dir() {
            return Err(CredentialsError::MissingDir(dir.to_path_buf()));
        }
        check_private(dir, "700")?;

        let path = dir.join(CRED_FILE);
        check_private(&path, "600")?;

        let text =
            std::fs::read_to_string(&path).map_err(|source| CredentialsError::Unreadable {
                path: path.clone(),
                source,
            })?;
        let parsed: CredFile = serde_yaml::from_str(&text)?;
        Ok(Self {
            users: parsed.rabbitmq_users,
        })
    }

    /// Resolve a credential alias (`service_user`, `service_passwd`, …).
    pub fn get(&self, alias: &str) -> Result<&str, CredentialsError> {
        self.users
            .get(alias)
            .map(String::as_str)
            .ok_or_else(|| CredentialsError::UnknownAlias(alias.to_string()))
    }
}

fn check_private(path: &Path, wanted: &'static str) -> Result<(), CredentialsError> {
    let meta = std::fs::metadata(path).map_err(|source| CredentialsError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    if meta.permissions().mode() & GROUP_OTHER_BITS != 0 {
        return Err(CredentialsError::Unsecure {
            path: path.to_path_buf(),
            wanted,
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod tests;
