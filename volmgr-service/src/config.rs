// SPDX-License-Identifier: GPL-3.0-only

//! Daemon configuration.
//!
//! One TOML file describes the storage layout, the primary external-storage
//! mount point and the managed volumes. Volumes are created once from this
//! at startup and persist for the controller's lifetime.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use volmgr_types::StorageLayout;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Mount point of the default external storage. The volume mounted
    /// there is the primary volume.
    pub primary_mount_point: Option<PathBuf>,

    /// Properties file carrying the decrypt/encrypt/crypto-state flags.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    #[serde(default)]
    pub layout: StorageLayout,

    #[serde(default, rename = "volume")]
    pub volumes: Vec<VolumeEntry>,
}

/// One managed mount point.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VolumeEntry {
    pub label: String,
    pub mount_point: PathBuf,

    /// Sysfs path prefix whose block events belong to this volume.
    pub sys_path: String,

    /// Partition to mount and format; absent means "whole device".
    #[serde(default)]
    pub partition: Option<u32>,

    #[serde(default)]
    pub encryptable: bool,

    #[serde(default)]
    pub nonremovable: bool,

    #[serde(default)]
    pub debug: bool,
}

fn default_state_file() -> PathBuf {
    PathBuf::from("/run/volmgr/state")
}

impl ServiceConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }
}
